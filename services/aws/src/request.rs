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

use crate::encoding::rfc3986_encode;
use bytes::Bytes;
use cirrus_core::{Error, Result};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Request is the wire-ready form of an API call.
///
/// It is built by the input serializers, gets an endpoint from the client, is signed and then
/// turned into an `http::Request`.
///
/// - `uri` is the path part, already percent-encoded by the serializer.
/// - `query` holds raw, unencoded parameters. Their order does not matter.
/// - header names are case-insensitive, `http::HeaderMap` stores them lower-cased.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: String,
    query: BTreeMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
    endpoint: Option<String>,
    unsigned_payload: bool,
}

impl Request {
    /// Create a new request.
    pub fn new(
        method: Method,
        uri: impl Into<String>,
        query: BTreeMap<String, String>,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            method,
            uri: uri.into(),
            query,
            headers,
            body: body.into(),
            endpoint: None,
            unsigned_payload: false,
        }
    }

    /// Mark the payload as not hashed, the signature then covers `UNSIGNED-PAYLOAD`.
    pub fn with_unsigned_payload(mut self) -> Self {
        self.unsigned_payload = true;
        self
    }

    /// Check if the payload is left out of the signature.
    pub fn is_unsigned_payload(&self) -> bool {
        self.unsigned_payload
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Replace the HTTP method.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Percent-encoded path.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Replace the percent-encoded path.
    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    /// Query parameters.
    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// Mutable query parameters.
    pub fn query_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.query
    }

    /// Set a query parameter, replacing the previous value.
    pub fn set_query_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.insert(key.into(), value.into());
    }

    /// Headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set a header, replacing every previous value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(())
    }

    /// Body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replace the body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Base endpoint, e.g. `https://sqs.eu-west-1.amazonaws.com`.
    pub fn base_endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Set the base endpoint.
    ///
    /// The endpoint can only be set once, a second call is a logic error.
    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) -> Result<()> {
        if let Some(existing) = &self.endpoint {
            return Err(Error::logic(format!(
                "request endpoint is already set to {existing}"
            )));
        }

        let endpoint = endpoint.into();
        endpoint.parse::<Uri>()?;
        self.endpoint = Some(endpoint.trim_end_matches('/').to_string());
        Ok(())
    }

    /// `host[:port]` of the endpoint.
    pub fn host(&self) -> Result<String> {
        let endpoint = self.require_endpoint()?;
        let uri: Uri = endpoint.parse()?;
        uri.authority()
            .map(|v| v.as_str().to_string())
            .ok_or_else(|| Error::request_invalid(format!("endpoint {endpoint} has no host")))
    }

    /// Absolute path of the request: the path of the endpoint followed by `uri`.
    pub fn path(&self) -> Result<String> {
        let uri: Uri = self.require_endpoint()?.parse()?;
        let mut path = uri.path().trim_end_matches('/').to_string();
        if !self.uri.starts_with('/') {
            path.push('/');
        }
        path.push_str(&self.uri);
        Ok(path)
    }

    /// Full URL: endpoint, path and the sorted, RFC 3986 encoded query.
    pub fn endpoint(&self) -> Result<String> {
        let mut url = self.require_endpoint()?.to_string();
        if !self.uri.starts_with('/') {
            url.push('/');
        }
        url.push_str(&self.uri);

        let mut query: Vec<(String, String)> = self
            .query
            .iter()
            .map(|(k, v)| (rfc3986_encode(k), rfc3986_encode(v)))
            .collect();
        query.sort();
        for (i, (k, v)) in query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            write!(url, "{k}={v}")?;
        }

        Ok(url)
    }

    /// Build the `http::Request` to send.
    pub fn to_http(&self) -> Result<http::Request<Bytes>> {
        let mut req = http::Request::builder()
            .method(self.method.clone())
            .uri(self.endpoint()?)
            .body(self.body.clone())?;
        *req.headers_mut() = self.headers.clone();
        Ok(req)
    }

    fn require_endpoint(&self) -> Result<&str> {
        self.endpoint
            .as_deref()
            .ok_or_else(|| Error::logic("request endpoint is not set"))
    }
}
