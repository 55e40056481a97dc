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

use crate::constants::X_AMZN_ERRORTYPE;
use crate::retry::{is_retryable, RetryStrategy};
use bytes::Bytes;
use cirrus_core::{Context, Error, Result};
use http::{HeaderMap, Method, StatusCode, Uri};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt::{self, Debug};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Observable resolution state of a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    /// The exchange is still in flight.
    Pending,
    /// The exchange completed, successfully or not.
    Resolved,
    /// The exchange was cancelled before it completed.
    Cancelled,
}

/// Snapshot of a [`Response`] taken without forcing resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseInfo {
    /// Resolution state.
    pub state: ResponseState,
    /// Status code, once the service answered.
    pub status: Option<StatusCode>,
}

enum Outcome {
    InFlight(JoinHandle<Result<http::Response<Bytes>>>),
    Succeeded(http::Response<Bytes>),
    Failed {
        error: Error,
        response: Option<http::Response<Bytes>>,
    },
    Cancelled,
}

/// Response wraps one HTTP exchange and resolves it exactly once.
///
/// The transfer starts as soon as the response is created. The first successful call to
/// [`Response::resolve`] classifies the outcome and memoizes it: later calls never touch the
/// network again and hand out the same outcome, including a clone of the same error.
///
/// The caller is expected to resolve or [`cancel`](Response::cancel) a response. A response
/// dropped while still in flight lets the transfer run to completion in the background.
pub struct Response {
    method: Method,
    uri: Uri,
    outcome: Outcome,
}

impl Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("info", &self.info())
            .finish()
    }
}

impl Response {
    /// Start sending `req` through the http client of `ctx`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn dispatch(ctx: &Context, req: http::Request<Bytes>, retry: RetryStrategy) -> Self {
        let (parts, body) = req.into_parts();
        let method = parts.method.clone();
        let uri = parts.uri.clone();
        debug!("dispatching request: {method} {uri}");

        let ctx = ctx.clone();
        let handle = tokio::spawn(async move {
            transfer(&ctx, parts.method, parts.uri, parts.headers, body, retry).await
        });

        Self {
            method,
            uri,
            outcome: Outcome::InFlight(handle),
        }
    }

    /// Resolve the exchange.
    ///
    /// - Returns `Ok(ResponseState::Pending)` if `timeout` elapsed first. Nothing is memoized
    ///   and the transfer keeps going.
    /// - Returns `Ok(ResponseState::Resolved)` on a successful exchange.
    /// - Returns `Ok(ResponseState::Cancelled)` once the response has been cancelled.
    /// - Returns the classified error on a failed exchange, and the same error on every later
    ///   call.
    pub async fn resolve(&mut self, timeout: Option<Duration>) -> Result<ResponseState> {
        if let Outcome::InFlight(handle) = &mut self.outcome {
            let joined = match timeout {
                Some(timeout) => match tokio::time::timeout(timeout, &mut *handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        debug!(
                            "response of {} {} not ready after {timeout:?}",
                            self.method, self.uri
                        );
                        return Ok(ResponseState::Pending);
                    }
                },
                None => handle.await,
            };

            self.outcome = match joined {
                Ok(Ok(resp)) => match classify(resp.status(), resp.headers(), resp.body()) {
                    Some(error) => Outcome::Failed {
                        error,
                        response: Some(resp),
                    },
                    None => Outcome::Succeeded(resp),
                },
                Ok(Err(error)) => Outcome::Failed {
                    error,
                    response: None,
                },
                Err(err) if err.is_cancelled() => Outcome::Cancelled,
                Err(err) => Outcome::Failed {
                    error: Error::unexpected("transfer task failed").with_source(err),
                    response: None,
                },
            };
        }

        match &self.outcome {
            Outcome::InFlight(_) => Ok(ResponseState::Pending),
            Outcome::Succeeded(_) => Ok(ResponseState::Resolved),
            Outcome::Failed { error, .. } => Err(error.clone()),
            Outcome::Cancelled => Ok(ResponseState::Cancelled),
        }
    }

    /// Abort the exchange if it is still in flight.
    ///
    /// A response that already resolved keeps its outcome.
    pub fn cancel(&mut self) {
        if let Outcome::InFlight(handle) = &self.outcome {
            debug!("cancelling request: {} {}", self.method, self.uri);
            handle.abort();
            self.outcome = Outcome::Cancelled;
        }
    }

    /// State and status of the exchange. Never waits.
    pub fn info(&self) -> ResponseInfo {
        match &self.outcome {
            Outcome::InFlight(_) => ResponseInfo {
                state: ResponseState::Pending,
                status: None,
            },
            Outcome::Succeeded(resp) => ResponseInfo {
                state: ResponseState::Resolved,
                status: Some(resp.status()),
            },
            Outcome::Failed { error, response } => ResponseInfo {
                state: ResponseState::Resolved,
                status: response.as_ref().map(|r| r.status()).or(error.status()),
            },
            Outcome::Cancelled => ResponseInfo {
                state: ResponseState::Cancelled,
                status: None,
            },
        }
    }

    /// The memoized error, if the exchange failed.
    pub fn error(&self) -> Option<&Error> {
        match &self.outcome {
            Outcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The raw http response, for a successful or a failed exchange alike.
    pub fn raw(&self) -> Option<&http::Response<Bytes>> {
        match &self.outcome {
            Outcome::Succeeded(resp) => Some(resp),
            Outcome::Failed { response, .. } => response.as_ref(),
            _ => None,
        }
    }

    fn succeeded(&self) -> Result<&http::Response<Bytes>> {
        match &self.outcome {
            Outcome::Succeeded(resp) => Ok(resp),
            Outcome::Failed { error, .. } => Err(error.clone()),
            Outcome::InFlight(_) => Err(Error::logic(
                "response is not resolved yet, call resolve first",
            )),
            Outcome::Cancelled => Err(Error::logic("response has been cancelled")),
        }
    }

    /// Status code of a successful exchange.
    pub fn status(&self) -> Result<StatusCode> {
        Ok(self.succeeded()?.status())
    }

    /// Headers of a successful exchange.
    pub fn headers(&self) -> Result<&HeaderMap> {
        Ok(self.succeeded()?.headers())
    }

    /// Body of a successful exchange.
    pub fn body(&self) -> Result<&Bytes> {
        Ok(self.succeeded()?.body())
    }

    /// Body of a successful exchange as text.
    pub fn text(&self) -> Result<String> {
        let body = self.body()?;
        Ok(String::from_utf8_lossy(body).to_string())
    }

    /// Deserialize the JSON body of a successful exchange.
    pub fn to_json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(self.body()?).map_err(|e| {
            Error::unexpected("failed to parse response body as json").with_source(e)
        })
    }

    /// Deserialize the XML body of a successful exchange.
    pub fn to_xml<T: DeserializeOwned>(&self) -> Result<T> {
        quick_xml::de::from_reader(self.body()?.as_ref()).map_err(|e| {
            Error::unexpected("failed to parse response body as xml").with_source(e)
        })
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        if let Outcome::InFlight(_) = self.outcome {
            debug!(
                "response of {} {} dropped unresolved, transfer continues in background",
                self.method, self.uri
            );
        }
    }
}

async fn transfer(
    ctx: &Context,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    retry: RetryStrategy,
) -> Result<http::Response<Bytes>> {
    let mut attempt = 0;
    loop {
        let mut req = http::Request::builder()
            .method(method.clone())
            .uri(uri.clone())
            .body(body.clone())?;
        *req.headers_mut() = headers.clone();

        let outcome = ctx.http_send(req).await;
        let error = match &outcome {
            Ok(resp) => classify(resp.status(), resp.headers(), resp.body()),
            Err(err) => Some(err.clone()),
        };

        match error {
            Some(err) if attempt < retry.max_retries() && is_retryable(&err) => {
                let delay = retry.backoff(attempt);
                attempt += 1;
                warn!(
                    "request {method} {uri} failed: {err}, retrying ({attempt}/{}) in {delay:?}",
                    retry.max_retries()
                );
                tokio::time::sleep(delay).await;
            }
            _ => return outcome,
        }
    }
}

/// Turn a failed exchange into the matching HTTP error.
///
/// Returns `None` for statuses below 300.
pub(crate) fn classify(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Option<Error> {
    if status.as_u16() < 300 {
        return None;
    }

    let (code, message) = parse_service_error(headers, body);
    let description = match (&code, &message) {
        (Some(code), Some(message)) => format!("service responded {status}: {code}: {message}"),
        (Some(code), None) => format!("service responded {status}: {code}"),
        (None, Some(message)) => format!("service responded {status}: {message}"),
        (None, None) => format!("service responded {status}"),
    };

    Error::from_status(status, description).map(|err| err.with_service_error(code, message))
}

#[derive(Deserialize)]
struct JsonError {
    #[serde(rename = "__type")]
    type_: Option<String>,
    #[serde(alias = "Code")]
    code: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlErrorResponse {
    error: XmlError,
}

fn parse_service_error(headers: &HeaderMap, body: &[u8]) -> (Option<String>, Option<String>) {
    let header_code = headers
        .get(X_AMZN_ERRORTYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(':').next())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string());

    let text = String::from_utf8_lossy(body);
    let text = text.trim_start();
    let (code, message) = if text.starts_with('{') {
        match serde_json::from_str::<JsonError>(text) {
            Ok(err) => {
                // `__type` may be namespaced: `com.amazonaws.dynamodb#ResourceNotFoundException`
                let code = err
                    .code
                    .or(err.type_)
                    .map(|v| v.rsplit('#').next().unwrap_or_default().to_string());
                (code, err.message)
            }
            Err(_) => (None, None),
        }
    } else if text.starts_with('<') {
        match quick_xml::de::from_str::<XmlErrorResponse>(text) {
            Ok(resp) => (resp.error.code, resp.error.message),
            Err(_) => match quick_xml::de::from_str::<XmlError>(text) {
                Ok(err) => (err.code, err.message),
                Err(_) => (None, None),
            },
        }
    } else {
        (None, None)
    };

    (code.or(header_code), message)
}
