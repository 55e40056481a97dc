// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use cirrus_core::{Error, ErrorKind};
use http::StatusCode;
use rand::Rng;
use std::time::Duration;

/// Error codes AWS uses for throttling and transient faults.
const RETRYABLE_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottledException",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "TransactionInProgressException",
    "RequestLimitExceeded",
    "BandwidthLimitExceeded",
    "LimitExceededException",
    "RequestThrottled",
    "SlowDown",
    "PriorRequestNotComplete",
    "EC2ThrottledException",
    "RequestTimeout",
    "RequestTimeoutException",
];

/// RetryStrategy decides how a transfer is retried before its outcome is handed out.
///
/// Network failures, server errors (except `501 Not Implemented`), `429 Too Many Requests`
/// and the well known throttling codes are retried with exponential backoff and jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryStrategy {
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(20),
        }
    }
}

impl RetryStrategy {
    /// Retry up to `max_retries` times with the default delays.
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Never retry: the first outcome is final.
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Set the delay before the first retry.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the upper bound of a single backoff.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Maximum number of retries after the first attempt.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Backoff before retry number `attempt` (starting at 0).
    ///
    /// Doubles on every attempt, capped by `max_delay`, then scaled by a random factor in
    /// `[0.5, 1.0]`.
    pub(crate) fn backoff(&self, attempt: usize) -> Duration {
        let exp = 2u32.saturating_pow(attempt.min(31) as u32);
        let delay = self.base_delay.saturating_mul(exp).min(self.max_delay);

        let jitter: f64 = rand::thread_rng().gen_range(0.5..=1.0);
        delay.mul_f64(jitter)
    }
}

/// Check if a failed exchange is worth another attempt.
pub(crate) fn is_retryable(err: &Error) -> bool {
    if err.kind() == ErrorKind::Network {
        return true;
    }
    if let Some(code) = err.code() {
        if RETRYABLE_CODES.contains(&code) {
            return true;
        }
    }

    match err.status() {
        Some(StatusCode::TOO_MANY_REQUESTS) => true,
        Some(StatusCode::NOT_IMPLEMENTED) => false,
        Some(status) => status.is_server_error(),
        None => false,
    }
}
