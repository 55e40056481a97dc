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

//! Credential resolution against scripted STS and metadata services.

use crate::common::{env, response, MockHttpSend};
use anyhow::Result;
use cirrus_aws::{Configuration, DefaultCredentialProvider};
use cirrus_core::{Context, ProvideCredential};
use cirrus_file_read_tokio::TokioFileRead;
use http::Method;
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;

const STS_RESPONSE: &str = r#"<AssumeRoleWithWebIdentityResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <AssumeRoleWithWebIdentityResult>
    <Credentials>
      <AccessKeyId>ASIAWEBIDENTITY</AccessKeyId>
      <SecretAccessKey>web_identity_secret</SecretAccessKey>
      <SessionToken>web_identity_token</SessionToken>
      <Expiration>2100-01-01T00:00:00Z</Expiration>
    </Credentials>
  </AssumeRoleWithWebIdentityResult>
</AssumeRoleWithWebIdentityResponse>"#;

fn provider(ctx: &Context) -> Result<DefaultCredentialProvider> {
    let config = Configuration::default_for(ctx)?;
    Ok(DefaultCredentialProvider::new(Arc::new(config)))
}

#[tokio::test]
async fn test_web_identity_is_exchanged_and_cached() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut token_file = tempfile::NamedTempFile::new()?;
    writeln!(token_file, "oidc-token")?;
    let token_path = token_file.path().to_string_lossy().to_string();

    let http = MockHttpSend::new(|_| response(200, STS_RESPONSE));
    let ctx = Context::new()
        .with_file_read(TokioFileRead)
        .with_http_send(http.clone())
        .with_env(env(&[
            ("AWS_REGION", "us-west-2"),
            ("AWS_ROLE_ARN", "arn:aws:iam::123456789012:role/cirrus"),
            ("AWS_WEB_IDENTITY_TOKEN_FILE", &token_path),
            ("AWS_ROLE_SESSION_NAME", "cirrus-test"),
        ]));
    let provider = provider(&ctx)?;

    let cred = provider
        .provide_credential(&ctx)
        .await?
        .expect("credential must be loaded");
    assert_eq!(cred.access_key_id, "ASIAWEBIDENTITY");
    assert_eq!(cred.secret_access_key, "web_identity_secret");
    assert_eq!(cred.session_token.as_deref(), Some("web_identity_token"));
    assert!(cred.expires_at.is_some());

    let requests = http.received();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].uri.host(), Some("sts.us-west-2.amazonaws.com"));
    let query = requests[0].uri.query().unwrap_or_default();
    assert!(query.contains("Action=AssumeRoleWithWebIdentity"));
    assert!(query.contains("RoleSessionName=cirrus-test"));
    assert!(query.contains("WebIdentityToken=oidc-token"));

    // Served from the cache until it comes close to expiration.
    let again = provider.provide_credential(&ctx).await?;
    assert_eq!(again, Some(cred));
    assert_eq!(http.received().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_container_credentials() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = MockHttpSend::new(|_| {
        response(
            200,
            r#"{"AccessKeyId":"ASIACONTAINER","SecretAccessKey":"container_secret","Token":"container_token","Expiration":"2100-01-01T00:00:00Z"}"#,
        )
    });
    let ctx = Context::new()
        .with_http_send(http.clone())
        .with_env(env(&[(
            "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI",
            "/v2/credentials/7d5f8a",
        )]));

    let cred = provider(&ctx)?
        .provide_credential(&ctx)
        .await?
        .expect("credential must be loaded");
    assert_eq!(cred.access_key_id, "ASIACONTAINER");
    assert_eq!(cred.session_token.as_deref(), Some("container_token"));

    let requests = http.received();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].uri.to_string(),
        "http://169.254.170.2/v2/credentials/7d5f8a"
    );
    Ok(())
}

#[tokio::test]
async fn test_instance_credentials_with_imdsv2() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = MockHttpSend::new(|req| {
        if req.method() == Method::PUT {
            assert_eq!(req.uri().path(), "/latest/api/token");
            return response(200, "imds-token");
        }

        assert_eq!(req.headers()["x-aws-ec2-metadata-token"], "imds-token");
        match req.uri().path() {
            "/latest/meta-data/iam/security-credentials/" => response(200, "cirrus-role\n"),
            "/latest/meta-data/iam/security-credentials/cirrus-role" => response(
                200,
                r#"{"Code":"Success","AccessKeyId":"ASIAINSTANCE","SecretAccessKey":"instance_secret","Token":"instance_token","Expiration":"2100-01-01T00:00:00Z"}"#,
            ),
            path => response(404, &format!("unexpected path {path}")),
        }
    });
    let ctx = Context::new()
        .with_http_send(http.clone())
        .with_env(env(&[("AWS_EC2_METADATA_DISABLED", "false")]));

    let cred = provider(&ctx)?
        .provide_credential(&ctx)
        .await?
        .expect("credential must be loaded");
    assert_eq!(cred.access_key_id, "ASIAINSTANCE");
    assert_eq!(cred.secret_access_key, "instance_secret");
    assert_eq!(http.received().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_failing_source_is_not_surfaced() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let http = MockHttpSend::new(|_| response(500, "agent is down"));
    let ctx = Context::new()
        .with_http_send(http.clone())
        .with_env(env(&[(
            "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI",
            "/v2/credentials/7d5f8a",
        )]));

    let cred = provider(&ctx)?.provide_credential(&ctx).await?;
    assert!(cred.is_none());
    assert_eq!(http.received().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_explicit_keys_win_over_environment() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let ctx = Context::new().with_env(env(&[
        ("AWS_ACCESS_KEY_ID", "env_access_key"),
        ("AWS_SECRET_ACCESS_KEY", "env_secret_key"),
    ]));
    let config = Configuration::create(
        &ctx,
        [
            ("accessKeyId", "explicit_access_key"),
            ("accessKeySecret", "explicit_secret_key"),
        ],
    )?;

    let cred = DefaultCredentialProvider::new(Arc::new(config))
        .provide_credential(&ctx)
        .await?
        .expect("credential must be loaded");
    assert_eq!(cred.access_key_id, "explicit_access_key");
    assert_eq!(cred.secret_access_key, "explicit_secret_key");
    Ok(())
}
