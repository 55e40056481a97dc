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

use crate::{ApiClient, Input, RequestContext, Response, ResponseInfo, ResponseState};
use cirrus_core::{Error, Result};
use log::debug;
use std::fmt::{self, Debug};
use std::time::Duration;
use tokio::time::Instant;

/// State of the resource a [`Waiter`] polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaiterState {
    /// Not there yet, poll again.
    Pending,
    /// The resource reached the expected state.
    Success,
    /// The resource can no longer reach the expected state.
    Failure,
}

impl WaiterState {
    /// Check if the state is final.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WaiterState::Pending)
    }
}

/// WaiterDefinition describes how to read the state of a resource from one poll.
pub trait WaiterDefinition: Send + Sync + 'static {
    /// Input of the describe-style call issued on every poll.
    type Input: Input;

    /// Classify one poll.
    ///
    /// `error` carries the HTTP error of a failed poll, e.g. a `404` that means the resource
    /// is gone.
    fn extract_state(&self, response: &Response, error: Option<&Error>) -> WaiterState;

    /// Overall budget of [`Waiter::wait`].
    fn wait_timeout(&self) -> Duration {
        Duration::from_secs(300)
    }

    /// Pause between two polls.
    fn wait_delay(&self) -> Duration {
        Duration::from_secs(5)
    }
}

/// Waiter polls a resource until it reaches a final state.
///
/// Once [`WaiterState::Success`] or [`WaiterState::Failure`] has been observed, the state is
/// sticky and no more calls are issued.
pub struct Waiter<W: WaiterDefinition> {
    client: ApiClient,
    input: W::Input,
    context: RequestContext,
    definition: W,

    response: Response,
    final_state: Option<WaiterState>,
    needs_refresh: bool,
}

impl<W: WaiterDefinition> Debug for Waiter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter")
            .field("input", &self.input)
            .field("response", &self.response)
            .field("final_state", &self.final_state)
            .field("needs_refresh", &self.needs_refresh)
            .finish()
    }
}

impl<W: WaiterDefinition> Waiter<W> {
    pub(crate) fn new(
        client: ApiClient,
        input: W::Input,
        context: RequestContext,
        definition: W,
        response: Response,
    ) -> Self {
        Self {
            client,
            input,
            context,
            definition,

            response,
            final_state: None,
            needs_refresh: false,
        }
    }

    /// Current state of the resource.
    ///
    /// Every call after the first one polls again, until a final state is reached.
    /// HTTP errors are handed to [`WaiterDefinition::extract_state`], other errors are
    /// returned.
    pub async fn state(&mut self) -> Result<WaiterState> {
        if let Some(state) = self.final_state {
            return Ok(state);
        }
        if self.needs_refresh {
            self.refresh().await?;
        }

        let error = match self.response.resolve(None).await {
            Ok(_) => None,
            Err(err) if err.is_http() => Some(err),
            Err(err) => return Err(err),
        };
        let state = self.definition.extract_state(&self.response, error.as_ref());
        debug!("waiter polled state: {state:?}");

        self.needs_refresh = true;
        if state.is_terminal() {
            self.final_state = Some(state);
        }
        Ok(state)
    }

    /// Check if the resource reached the expected state.
    pub async fn is_success(&mut self) -> Result<bool> {
        Ok(self.state().await? == WaiterState::Success)
    }

    /// Check if the resource can no longer reach the expected state.
    pub async fn is_failure(&mut self) -> Result<bool> {
        Ok(self.state().await? == WaiterState::Failure)
    }

    /// Check if the resource is still on its way.
    pub async fn is_pending(&mut self) -> Result<bool> {
        Ok(self.state().await? == WaiterState::Pending)
    }

    /// Poll until a final state, or until `timeout` runs out.
    ///
    /// `timeout` and `delay` default to the values of the definition. Returns `true` once a
    /// final state is reached, and `false` when the time budget runs out, which is not an
    /// error. The budget is checked before every pause, so the last exchange may end past
    /// `timeout`.
    pub async fn wait(
        &mut self,
        timeout: Option<Duration>,
        delay: Option<Duration>,
    ) -> Result<bool> {
        let timeout = timeout.unwrap_or_else(|| self.definition.wait_timeout());
        let delay = delay.unwrap_or_else(|| self.definition.wait_delay());
        let deadline = Instant::now() + timeout;

        loop {
            if self.final_state.is_none() {
                if self.needs_refresh {
                    self.refresh().await?;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if let Ok(ResponseState::Pending) = self.response.resolve(Some(remaining)).await {
                    debug!("waiter ran out of time while polling");
                    return Ok(false);
                }
            }

            if self.state().await?.is_terminal() {
                return Ok(true);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if delay > remaining {
                debug!("waiter gives up, {remaining:?} left is less than delay {delay:?}");
                return Ok(false);
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// Abort the current poll. The next check polls again.
    pub fn cancel(&mut self) {
        self.response.cancel();
        self.needs_refresh = true;
    }

    /// State of the current poll. Never waits.
    pub fn info(&self) -> ResponseInfo {
        self.response.info()
    }

    async fn refresh(&mut self) -> Result<()> {
        let response = self.client.response(&self.input, &self.context).await?;
        // The previous poll is resolved or cancelled by now.
        self.response = response;
        self.needs_refresh = false;
        Ok(())
    }
}
