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

use crate::provide_credential::utils::{parse_expiration, sts_endpoint};
use crate::response::classify;
use crate::{Configuration, Credential};
use async_trait::async_trait;
use bytes::Bytes;
use cirrus_core::time::now;
use cirrus_core::{utils::Redact, Context, Error, ProvideCredential, Result};
use quick_xml::de;
use serde::Deserialize;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// WebIdentityCredentialProvider exchanges an OIDC token for temporary credentials through
/// STS `AssumeRoleWithWebIdentity`.
///
/// It reads `roleArn`, `webIdentityTokenFile` and `roleSessionName` from the [`Configuration`],
/// i.e. from `AWS_ROLE_ARN`, `AWS_WEB_IDENTITY_TOKEN_FILE` and `AWS_ROLE_SESSION_NAME` unless
/// they were given explicitly. `stsRegionalEndpoints` selects the STS endpoint.
#[derive(Debug)]
pub struct WebIdentityCredentialProvider {
    config: Arc<Configuration>,
}

impl WebIdentityCredentialProvider {
    /// Create a new `WebIdentityCredentialProvider` instance.
    pub fn new(config: Arc<Configuration>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProvideCredential for WebIdentityCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let (Some(role_arn), Some(token_file)) = (
            self.config.value("roleArn"),
            self.config.value("webIdentityTokenFile"),
        ) else {
            return Ok(None);
        };

        let session_name = self
            .config
            .value("roleSessionName")
            .map(|v| v.to_string())
            .unwrap_or_else(default_session_name);

        let cred =
            assume_role_with_web_identity(ctx, &self.config, role_arn, token_file, &session_name)
                .await?;
        Ok(Some(cred))
    }
}

pub(crate) fn default_session_name() -> String {
    format!("cirrus-{}", now().timestamp())
}

/// Call STS `AssumeRoleWithWebIdentity` with the token stored in `token_file`.
pub(crate) async fn assume_role_with_web_identity(
    ctx: &Context,
    config: &Configuration,
    role_arn: &str,
    token_file: &str,
    session_name: &str,
) -> Result<Credential> {
    let path = ctx.expand_home_dir(token_file).ok_or_else(|| {
        Error::config_invalid(format!(
            "failed to expand home dir of web identity token file {token_file}"
        ))
    })?;
    let token = ctx.file_read_as_string(&path).await.map_err(|e| {
        Error::config_invalid(format!("failed to read web identity token file {path}"))
            .with_source(e)
    })?;

    let use_regional = config.value("stsRegionalEndpoints") == Some("regional");
    let endpoint = sts_endpoint(config.region(), use_regional)?;

    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("Action", "AssumeRoleWithWebIdentity")
        .append_pair("RoleArn", role_arn)
        .append_pair("RoleSessionName", session_name)
        .append_pair("Version", "2011-06-15")
        .append_pair("WebIdentityToken", token.trim())
        .finish();
    let req = http::Request::builder()
        .method(http::Method::GET)
        .uri(format!("https://{endpoint}/?{query}"))
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(Bytes::new())?;

    log::debug!("assuming role {role_arn} with web identity through {endpoint}");
    let resp = ctx.http_send(req).await?;
    let (parts, body) = resp.into_parts();
    if let Some(err) = classify(parts.status, &parts.headers, &body) {
        return Err(err);
    }

    let body = String::from_utf8_lossy(&body);
    let resp: AssumeRoleWithWebIdentityResponse = de::from_str(&body).map_err(|e| {
        Error::unexpected("failed to parse STS AssumeRoleWithWebIdentity response").with_source(e)
    })?;
    let resp_cred = resp.result.credentials;

    Ok(Credential {
        access_key_id: resp_cred.access_key_id,
        secret_access_key: resp_cred.secret_access_key,
        session_token: Some(resp_cred.session_token),
        expires_at: Some(parse_expiration(&resp_cred.expiration)?),
    })
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleWithWebIdentityResponse {
    #[serde(rename = "AssumeRoleWithWebIdentityResult")]
    result: AssumeRoleWithWebIdentityResult,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleWithWebIdentityResult {
    credentials: AssumeRoleWithWebIdentityCredentials,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AssumeRoleWithWebIdentityCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: String,
}

impl Debug for AssumeRoleWithWebIdentityCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssumeRoleWithWebIdentityCredentials")
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("secret_access_key", &Redact::from(&self.secret_access_key))
            .field("session_token", &Redact::from(&self.session_token))
            .field("expiration", &self.expiration)
            .finish()
    }
}
