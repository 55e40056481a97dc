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

//! Polling until a resource settles.

use crate::common::{client, response, table_status};
use crate::common::{DescribeTable, DescribeTableOutput, MockHttpSend};
use anyhow::Result;
use cirrus_aws::{Output, RequestContext, Response, ResponseState, WaiterDefinition, WaiterState};
use cirrus_core::{Error, ErrorKind};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Waits for a table to become `ACTIVE`.
struct TableExists;

impl WaiterDefinition for TableExists {
    type Input = DescribeTable;

    fn extract_state(&self, response: &Response, error: Option<&Error>) -> WaiterState {
        if let Some(err) = error {
            return match err.code() {
                Some("ResourceNotFoundException") => WaiterState::Pending,
                _ => WaiterState::Failure,
            };
        }

        match DescribeTableOutput::populate(response) {
            Ok(output) if output.table.table_status == "ACTIVE" => WaiterState::Success,
            Ok(output) if output.table.table_status == "CREATING" => WaiterState::Pending,
            _ => WaiterState::Failure,
        }
    }

    fn wait_timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    fn wait_delay(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// Waits for a table to disappear.
struct TableNotExists;

impl WaiterDefinition for TableNotExists {
    type Input = DescribeTable;

    fn extract_state(&self, _: &Response, error: Option<&Error>) -> WaiterState {
        match error.and_then(|e| e.code()) {
            Some("ResourceNotFoundException") => WaiterState::Success,
            _ => WaiterState::Pending,
        }
    }
}

fn input() -> DescribeTable {
    DescribeTable {
        table_name: Some("users".to_string()),
    }
}

/// Answer with each status in turn, then repeat the last one.
fn scripted(statuses: &'static [&'static str]) -> MockHttpSend {
    let calls = Arc::new(AtomicUsize::new(0));
    MockHttpSend::new(move |_| {
        let idx = calls.fetch_add(1, Ordering::SeqCst).min(statuses.len() - 1);
        match statuses[idx] {
            "NOT_FOUND" => response(
                400,
                r#"{"__type":"com.amazonaws.dynamodb.v20120810#ResourceNotFoundException","message":"Requested resource not found"}"#,
            ),
            status => response(200, &table_status(status)),
        }
    })
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_success() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = scripted(&["CREATING", "CREATING", "ACTIVE"]);
    let client = client(&http, &[], false);
    let mut waiter = client
        .waiter(input(), TableExists, RequestContext::new())
        .await?;

    let reached = waiter
        .wait(Some(Duration::from_secs(60)), Some(Duration::from_secs(1)))
        .await?;
    assert!(reached);
    assert_eq!(http.received().len(), 3);

    // Sticky: no more polls once a final state is known.
    assert_eq!(waiter.state().await?, WaiterState::Success);
    assert!(waiter.is_success().await?);
    assert_eq!(http.received().len(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_wait_gives_up_after_timeout() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = scripted(&["CREATING"]);
    let client = client(&http, &[], false);
    let mut waiter = client
        .waiter(input(), TableExists, RequestContext::new())
        .await?;

    let reached = waiter
        .wait(Some(Duration::from_secs(10)), Some(Duration::from_secs(3)))
        .await?;
    assert!(!reached);
    // Polls at 0s, 3s, 6s and 9s; 1s left is less than the delay.
    assert_eq!(http.received().len(), 4);
    assert!(waiter.is_pending().await?);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_wait_with_definition_defaults() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = scripted(&["NOT_FOUND", "CREATING", "ACTIVE"]);
    let client = client(&http, &[], false);
    let mut waiter = client
        .waiter(input(), TableExists, RequestContext::new())
        .await?;

    assert!(waiter.wait(None, None).await?);
    assert_eq!(http.received().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_http_error_is_a_state() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = scripted(&["ACTIVE", "NOT_FOUND"]);
    let client = client(&http, &[], false);
    let mut waiter = client
        .waiter(input(), TableNotExists, RequestContext::new())
        .await?;

    assert_eq!(waiter.state().await?, WaiterState::Pending);
    assert_eq!(waiter.state().await?, WaiterState::Success);
    assert_eq!(waiter.state().await?, WaiterState::Success);
    assert_eq!(http.received().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_failure_is_terminal() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = scripted(&["DELETING"]);
    let client = client(&http, &[], false);
    let mut waiter = client
        .waiter(input(), TableExists, RequestContext::new())
        .await?;

    assert!(waiter.wait(None, None).await?);
    assert!(waiter.is_failure().await?);
    assert_eq!(http.received().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_network_error_is_returned() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = MockHttpSend::new(|_| Err(Error::network("connection reset by peer")));
    let client = client(&http, &[], false);
    let mut waiter = client
        .waiter(input(), TableExists, RequestContext::new())
        .await?;

    let err = waiter.state().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancel_forces_refresh() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = scripted(&["ACTIVE"]).with_latency(Duration::from_secs(5));
    let client = client(&http, &[], false);
    let mut waiter = client
        .waiter(input(), TableExists, RequestContext::new())
        .await?;

    waiter.cancel();
    assert_eq!(waiter.info().state, ResponseState::Cancelled);

    assert_eq!(waiter.state().await?, WaiterState::Success);
    assert_eq!(http.answered().len(), 1);
    Ok(())
}
