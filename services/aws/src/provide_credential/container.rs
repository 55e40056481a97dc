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

use crate::constants::CONTAINER_METADATA_ENDPOINT;
use crate::provide_credential::utils::parse_expiration;
use crate::response::classify;
use crate::{Configuration, Credential};
use async_trait::async_trait;
use bytes::Bytes;
use cirrus_core::{Context, Error, ProvideCredential, Result};
use http::Method;
use serde::Deserialize;
use std::sync::Arc;

/// ContainerCredentialProvider loads credentials from the ECS container agent.
///
/// The agent serves them at `http://169.254.170.2<containerCredentialsRelativeUri>`, the
/// relative uri being injected by ECS as `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI`.
///
/// References:
/// - [IAM roles for tasks](https://docs.aws.amazon.com/AmazonECS/latest/developerguide/task-iam-roles.html)
#[derive(Debug)]
pub struct ContainerCredentialProvider {
    config: Arc<Configuration>,
    endpoint: String,
}

impl ContainerCredentialProvider {
    /// Create a new `ContainerCredentialProvider` instance.
    pub fn new(config: Arc<Configuration>) -> Self {
        Self {
            config,
            endpoint: CONTAINER_METADATA_ENDPOINT.to_string(),
        }
    }

    /// Replace the container agent endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ProvideCredential for ContainerCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let Some(relative_uri) = self.config.value("containerCredentialsRelativeUri") else {
            return Ok(None);
        };

        let url = format!("{}{relative_uri}", self.endpoint.trim_end_matches('/'));
        let req = http::Request::builder()
            .uri(&url)
            .method(Method::GET)
            .body(Bytes::new())?;

        let (parts, body) = ctx.http_send(req).await?.into_parts();
        if let Some(err) = classify(parts.status, &parts.headers, &body) {
            return Err(err);
        }

        let cred: ContainerCredentials = serde_json::from_slice(&body).map_err(|e| {
            Error::unexpected("failed to parse container credentials").with_source(e)
        })?;

        Ok(Some(Credential {
            access_key_id: cred.access_key_id,
            secret_access_key: cred.secret_access_key,
            session_token: Some(cred.token),
            expires_at: Some(parse_expiration(&cred.expiration)?),
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: String,
    expiration: String,
}
