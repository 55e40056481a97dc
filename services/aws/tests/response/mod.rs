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

//! Resolve-once lifecycle of dispatched responses.

use crate::common::{response, MockHttpSend};
use anyhow::Result;
use bytes::Bytes;
use cirrus_aws::{Response, ResponseState, RetryStrategy};
use cirrus_core::{Context, Error, ErrorKind};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use test_case::test_case;

fn dispatch(http: &MockHttpSend, retry: RetryStrategy) -> Response {
    let ctx = Context::new().with_http_send(http.clone());
    let req = http::Request::get("https://dynamodb.us-east-1.amazonaws.com/")
        .body(Bytes::new())
        .unwrap();
    Response::dispatch(&ctx, req, retry)
}

#[test_case(301, ErrorKind::Redirection; "redirection")]
#[test_case(403, ErrorKind::Client; "client")]
#[test_case(404, ErrorKind::Client; "not found")]
#[test_case(500, ErrorKind::Server; "server")]
#[test_case(503, ErrorKind::Server; "unavailable")]
#[tokio::test]
async fn test_failure_is_memoized(status: u16, kind: ErrorKind) -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = MockHttpSend::new(move |_| response(status, ""));
    let mut resp = dispatch(&http, RetryStrategy::none());

    let first = resp.resolve(None).await.unwrap_err();
    let second = resp.resolve(None).await.unwrap_err();
    let third = resp.resolve(Some(Duration::from_secs(1))).await.unwrap_err();

    for err in [&first, &second, &third] {
        assert_eq!(err.kind(), kind);
        assert_eq!(err.status().map(|v| v.as_u16()), Some(status));
        assert_eq!(err.to_string(), first.to_string());
    }
    assert_eq!(http.received().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_network_failure_is_memoized() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = MockHttpSend::new(|_| Err(Error::network("connection refused")));
    let mut resp = dispatch(&http, RetryStrategy::none());

    for _ in 0..3 {
        let err = resp.resolve(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.status(), None);
    }
    assert_eq!(http.received().len(), 1);
    Ok(())
}

#[test_case(Error::request_invalid("bad uri"), ErrorKind::RequestInvalid; "request invalid")]
#[test_case(Error::unexpected("truncated body"), ErrorKind::Unexpected; "body read")]
#[tokio::test(start_paused = true)]
async fn test_sender_error_kind_is_kept(error: Error, kind: ErrorKind) -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = MockHttpSend::new(move |_| Err(error.clone()));
    let mut resp = dispatch(&http, RetryStrategy::new(3));

    let err = resp.resolve(None).await.unwrap_err();
    assert_eq!(err.kind(), kind);
    assert_eq!(err.status(), None);
    assert_eq!(http.received().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_network_failure_is_retried() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = MockHttpSend::new(|_| Err(Error::network("connection refused")));
    let mut resp = dispatch(&http, RetryStrategy::new(2));

    let err = resp.resolve(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(http.received().len(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_throttling_is_retried() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let http = MockHttpSend::new(move |_| match counter.fetch_add(1, Ordering::SeqCst) {
        0 => response(
            400,
            r#"{"__type":"com.amazonaws.dynamodb.v20120810#ThrottlingException","message":"Rate exceeded"}"#,
        ),
        1 => response(503, ""),
        _ => response(200, "{}"),
    });
    let mut resp = dispatch(&http, RetryStrategy::new(3));

    assert_eq!(resp.resolve(None).await?, ResponseState::Resolved);
    assert_eq!(resp.text()?, "{}");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_retries_are_bounded() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = MockHttpSend::new(|_| response(500, ""));
    let mut resp = dispatch(&http, RetryStrategy::new(2));

    let err = resp.resolve(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(http.received().len(), 3);

    resp.resolve(None).await.unwrap_err();
    assert_eq!(http.received().len(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_resolve_timeout_is_not_memoized() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = MockHttpSend::new(|_| response(200, "done")).with_latency(Duration::from_secs(10));
    let mut resp = dispatch(&http, RetryStrategy::none());

    assert_eq!(
        resp.resolve(Some(Duration::from_secs(1))).await?,
        ResponseState::Pending
    );
    assert_eq!(resp.info().state, ResponseState::Pending);
    assert_eq!(resp.info().status, None);

    assert_eq!(resp.resolve(None).await?, ResponseState::Resolved);
    assert_eq!(resp.text()?, "done");
    assert_eq!(resp.info().status, Some(http::StatusCode::OK));
    assert_eq!(http.received().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_transfer() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = MockHttpSend::new(|_| response(200, "done")).with_latency(Duration::from_secs(10));
    let mut resp = dispatch(&http, RetryStrategy::none());
    // Let the transfer reach the transport.
    tokio::time::sleep(Duration::from_secs(1)).await;

    resp.cancel();
    assert_eq!(resp.resolve(None).await?, ResponseState::Cancelled);
    assert_eq!(resp.info().state, ResponseState::Cancelled);
    assert_eq!(resp.body().unwrap_err().kind(), ErrorKind::Logic);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(http.received().len(), 1);
    assert!(http.answered().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_dropped_response_completes_in_background() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = MockHttpSend::new(|_| response(200, "done")).with_latency(Duration::from_millis(10));
    drop(dispatch(&http, RetryStrategy::none()));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(http.answered().len(), 1);
    Ok(())
}
