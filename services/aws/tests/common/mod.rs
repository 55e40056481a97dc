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

//! Scripted transport and a small JSON protocol shared by the tests.

use async_trait::async_trait;
use bytes::Bytes;
use cirrus_aws::{ApiClient, Configuration, Input, Output, Request, Response, RetryStrategy};
use cirrus_aws::{PaginatedInput, PaginatedOutput, ServiceMetadata};
use cirrus_core::{Context, Error, HttpSend, Result, StaticEnv};
use http::{HeaderMap, Method, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Handler = dyn Fn(&http::Request<Bytes>) -> Result<http::Response<Bytes>> + Send + Sync;

/// A request seen by [`MockHttpSend`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Recorded {
    /// `NextToken` carried by a JSON body.
    pub fn next_token(&self) -> Option<String> {
        serde_json::from_slice::<ListItems>(&self.body)
            .ok()
            .and_then(|v| v.next_token)
    }
}

/// MockHttpSend answers every request with a scripted handler.
///
/// Requests are recorded when received and again once answered, `latency` apart.
#[derive(Clone)]
pub struct MockHttpSend {
    handler: Arc<Handler>,
    latency: Duration,
    received: Arc<Mutex<Vec<Recorded>>>,
    answered: Arc<Mutex<Vec<Recorded>>>,
}

impl Debug for MockHttpSend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHttpSend")
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

impl MockHttpSend {
    pub fn new(
        handler: impl Fn(&http::Request<Bytes>) -> Result<http::Response<Bytes>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            latency: Duration::ZERO,
            received: Arc::default(),
            answered: Arc::default(),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn received(&self) -> Vec<Recorded> {
        self.received.lock().unwrap().clone()
    }

    pub fn answered(&self) -> Vec<Recorded> {
        self.answered.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpSend for MockHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let recorded = Recorded {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
            body: req.body().clone(),
        };
        self.received.lock().unwrap().push(recorded.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let resp = (self.handler)(&req);
        self.answered.lock().unwrap().push(recorded);
        resp
    }
}

pub fn response(status: u16, body: &str) -> Result<http::Response<Bytes>> {
    let mut resp = http::Response::new(Bytes::from(body.to_string()));
    *resp.status_mut() = StatusCode::from_u16(status).unwrap();
    Ok(resp)
}

pub fn env(envs: &[(&str, &str)]) -> StaticEnv {
    let mut envs: HashMap<String, String> = envs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    envs.entry("AWS_EC2_METADATA_DISABLED".to_string())
        .or_insert_with(|| "true".to_string());

    StaticEnv {
        home_dir: None,
        envs,
    }
}

/// A client for the `dynamodb` service, signing with static keys unless `anonymous`.
pub fn client(http: &MockHttpSend, options: &[(&str, &str)], anonymous: bool) -> ApiClient {
    let ctx = Context::new()
        .with_env(env(&[]))
        .with_http_send(http.clone());

    let mut options = options.to_vec();
    if !anonymous {
        options.push(("accessKeyId", "AKIDEXAMPLE"));
        options.push(("accessKeySecret", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY"));
    }
    let config = Configuration::create(&ctx, options).unwrap();

    ApiClient::new(ctx, config, ServiceMetadata::new("dynamodb"))
        .with_retry_strategy(RetryStrategy::none())
}

fn json_request(target: &str, body: Vec<u8>) -> Request {
    let mut req = Request::new(
        Method::POST,
        "/",
        BTreeMap::new(),
        HeaderMap::new(),
        body,
    );
    req.headers_mut().insert(
        "x-amz-target",
        format!("DynamoDB_20120810.{target}").parse().unwrap(),
    );
    req.headers_mut().insert(
        http::header::CONTENT_TYPE,
        "application/x-amz-json-1.0".parse().unwrap(),
    );
    req
}

/// `DescribeTable`, requires `TableName`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeTable {
    pub table_name: Option<String>,
}

impl Input for DescribeTable {
    fn request(&self) -> Result<Request> {
        if self.table_name.is_none() {
            return Err(Error::missing_parameter(
                "TableName is required for DescribeTable",
            ));
        }

        let body = serde_json::to_vec(self).map_err(|e| Error::unexpected(e.to_string()))?;
        Ok(json_request("DescribeTable", body))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDescription {
    pub table_status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeTableOutput {
    pub table: TableDescription,
}

impl Output for DescribeTableOutput {
    fn populate(response: &Response) -> Result<Self> {
        response.to_json()
    }
}

pub fn table_status(status: &str) -> String {
    format!(r#"{{"Table":{{"TableStatus":"{status}"}}}}"#)
}

/// A paginated listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListItems {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl Input for ListItems {
    fn request(&self) -> Result<Request> {
        let body = serde_json::to_vec(self).map_err(|e| Error::unexpected(e.to_string()))?;
        Ok(json_request("ListItems", body))
    }
}

impl PaginatedInput for ListItems {
    fn with_next_token(&self, token: &str) -> Self {
        Self {
            next_token: Some(token.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListItemsOutput {
    pub items: Vec<String>,
    pub next_token: Option<String>,
}

impl Output for ListItemsOutput {
    fn populate(response: &Response) -> Result<Self> {
        response.to_json()
    }
}

impl PaginatedOutput for ListItemsOutput {
    type Item = String;

    fn next_token(&self) -> Option<&str> {
        self.next_token.as_deref()
    }

    fn take_items(&mut self) -> Vec<String> {
        std::mem::take(&mut self.items)
    }
}

/// Serve `ListItems` as three pages: `[a, b]`, `[c, d]` and `[e]`.
pub fn three_pages() -> MockHttpSend {
    MockHttpSend::new(|req| {
        let input: ListItems = serde_json::from_slice(req.body()).unwrap();
        match input.next_token.as_deref() {
            None => response(200, r#"{"Items":["a","b"],"NextToken":"page2"}"#),
            Some("page2") => response(200, r#"{"Items":["c","d"],"NextToken":"page3"}"#),
            Some("page3") => response(200, r#"{"Items":["e"],"NextToken":""}"#),
            Some(token) => panic!("unexpected token {token}"),
        }
    })
}
