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

//! reqwest based HTTP sending for cirrus.
//!
//! `ReqwestHttpSend` implements the `HttpSend` trait from `cirrus_core` with a
//! `reqwest::Client`. Failures before a status line is received surface as
//! `ErrorKind::Network` so that the runtime can retry them. Every answered exchange is
//! returned as is, whatever its status.
//!
//! ## Example
//!
//! ```no_run
//! use cirrus_core::Context;
//! use cirrus_http_send_reqwest::ReqwestHttpSend;
//!
//! let ctx = Context::new().with_http_send(ReqwestHttpSend::default());
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use cirrus_core::{Error, HttpSend, Result};
use reqwest::{Client, Request};

/// HttpSend implementation backed by `reqwest::Client`.
#[derive(Debug, Default, Clone)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = Request::try_from(req)
            .map_err(|e| Error::request_invalid("failed to convert http request").with_source(e))?;
        log::debug!("sending {} {}", req.method(), req.url());

        let resp = self
            .client
            .execute(req)
            .await
            .map_err(|e| Error::network("failed to send http request").with_source(e))?;

        let status = resp.status();
        let mut builder = http::Response::builder()
            .status(status)
            .version(resp.version());
        if let Some(headers) = builder.headers_mut() {
            *headers = resp.headers().clone();
        }

        // The status line is in, a broken body is no longer a transport failure.
        let body = resp.bytes().await.map_err(|e| {
            Error::unexpected(format!("failed to read http response body of {status}"))
                .with_source(e)
        })?;
        Ok(builder.body(body)?)
    }
}
