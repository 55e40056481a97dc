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

use crate::constants::{
    AWS_EC2_METADATA_DISABLED, AWS_EC2_METADATA_SERVICE_ENDPOINT, INSTANCE_METADATA_ENDPOINT,
};
use crate::provide_credential::utils::parse_expiration;
use crate::response::classify;
use crate::Credential;
use async_trait::async_trait;
use bytes::Bytes;
use cirrus_core::time::{now, DateTime};
use cirrus_core::{Context, Error, ProvideCredential, Result};
use http::header::CONTENT_LENGTH;
use http::{Method, StatusCode};
use log::debug;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TOKEN_TTL_SECONDS: i64 = 21600;

/// InstanceCredentialProvider loads the credentials of the role attached to an EC2 instance.
///
/// IMDSv2 is tried first. When the token endpoint refuses to hand out a session token the
/// provider falls back to IMDSv1. An unreachable metadata service means the process does not
/// run on EC2, which is reported as no credential.
///
/// `AWS_EC2_METADATA_DISABLED=true` turns the provider off and
/// `AWS_EC2_METADATA_SERVICE_ENDPOINT` overrides the endpoint.
#[derive(Debug, Clone)]
pub struct InstanceCredentialProvider {
    endpoint: Option<String>,
    timeout: Duration,
    token: Arc<Mutex<(String, DateTime)>>,
}

impl Default for InstanceCredentialProvider {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(1),
            token: Arc::new(Mutex::new((String::new(), DateTime::default()))),
        }
    }
}

impl InstanceCredentialProvider {
    /// Create a new `InstanceCredentialProvider` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint for the metadata service.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the timeout for each metadata request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn get_endpoint(&self, ctx: &Context) -> String {
        self.endpoint
            .clone()
            .or_else(|| ctx.env_var(AWS_EC2_METADATA_SERVICE_ENDPOINT))
            .unwrap_or_else(|| INSTANCE_METADATA_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    async fn send(
        &self,
        ctx: &Context,
        req: http::Request<Bytes>,
    ) -> Result<http::Response<Bytes>> {
        match tokio::time::timeout(self.timeout, ctx.http_send(req)).await {
            Ok(resp) => resp,
            Err(_) => Err(Error::network("instance metadata service timed out")),
        }
    }

    /// Fetch an IMDSv2 session token, `None` means IMDSv1 must be used.
    async fn load_token(&self, ctx: &Context, endpoint: &str) -> Result<Option<String>> {
        {
            let (token, expires_at) = self.token.lock().expect("lock poisoned").clone();
            if expires_at > now() {
                return Ok(Some(token));
            }
        }

        let req = http::Request::builder()
            .uri(format!("{endpoint}/latest/api/token"))
            .method(Method::PUT)
            .header(CONTENT_LENGTH, "0")
            // 21600s (6h) is recommended by AWS.
            .header(
                "x-aws-ec2-metadata-token-ttl-seconds",
                TOKEN_TTL_SECONDS.to_string(),
            )
            .body(Bytes::new())?;

        let resp = self.send(ctx, req).await?;
        if resp.status() != StatusCode::OK {
            debug!(
                "instance metadata token refused with {}, falling back to IMDSv1",
                resp.status()
            );
            return Ok(None);
        }

        let token = String::from_utf8_lossy(resp.body()).to_string();
        // Refresh the token ten minutes before it expires.
        let expires_at = now()
            + chrono::TimeDelta::try_seconds(TOKEN_TTL_SECONDS - 600).expect("in bounds");
        *self.token.lock().expect("lock poisoned") = (token.clone(), expires_at);

        Ok(Some(token))
    }

    async fn get(
        &self,
        ctx: &Context,
        url: String,
        token: Option<&str>,
    ) -> Result<http::Response<Bytes>> {
        let mut req = http::Request::builder().uri(url).method(Method::GET);
        if let Some(token) = token {
            req = req.header("x-aws-ec2-metadata-token", token);
        }

        self.send(ctx, req.body(Bytes::new())?).await
    }
}

#[async_trait]
impl ProvideCredential for InstanceCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        if ctx
            .env_var(AWS_EC2_METADATA_DISABLED)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok(None);
        }

        let endpoint = self.get_endpoint(ctx);
        let token = match self.load_token(ctx, &endpoint).await {
            Ok(token) => token,
            Err(err) => {
                debug!("instance metadata service is not reachable: {err:?}");
                return Ok(None);
            }
        };

        // List the role attached to this instance.
        let resp = self
            .get(
                ctx,
                format!("{endpoint}/latest/meta-data/iam/security-credentials/"),
                token.as_deref(),
            )
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!("no role attached to this instance");
            return Ok(None);
        }
        let (parts, body) = resp.into_parts();
        if let Some(err) = classify(parts.status, &parts.headers, &body) {
            return Err(err);
        }

        let listing = String::from_utf8_lossy(&body);
        let Some(role) = listing.lines().map(str::trim).find(|v| !v.is_empty()) else {
            debug!("no role attached to this instance");
            return Ok(None);
        };

        let resp = self
            .get(
                ctx,
                format!("{endpoint}/latest/meta-data/iam/security-credentials/{role}"),
                token.as_deref(),
            )
            .await?;
        let (parts, body) = resp.into_parts();
        if let Some(err) = classify(parts.status, &parts.headers, &body) {
            return Err(err);
        }

        let resp: InstanceCredentials = serde_json::from_slice(&body).map_err(|e| {
            Error::unexpected("failed to parse instance credentials").with_source(e)
        })?;
        if resp.code != "Success" {
            return Err(Error::credential_denied(format!(
                "instance metadata service returned [{}] {}",
                resp.code, resp.message
            )));
        }

        Ok(Some(Credential {
            access_key_id: resp.access_key_id,
            secret_access_key: resp.secret_access_key,
            session_token: Some(resp.token),
            expires_at: Some(parse_expiration(&resp.expiration)?),
        }))
    }
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct InstanceCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: String,
    expiration: String,

    code: String,
    message: String,
}
