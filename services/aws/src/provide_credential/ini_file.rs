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

use crate::provide_credential::web_identity::{
    assume_role_with_web_identity, default_session_name,
};
use crate::{Configuration, Credential};
use async_trait::async_trait;
use cirrus_core::{Context, Error, ProvideCredential, Result};
use ini::{Ini, Properties};
use log::debug;
use std::sync::Arc;

/// IniFileCredentialProvider loads AWS credentials from the shared files.
///
/// This provider loads credentials from:
/// - `sharedCredentialsFile`, `~/.aws/credentials` by default, section `[<profile>]`.
/// - `sharedConfigFile`, `~/.aws/config` by default, section `[profile <profile>]` (or
///   `[default]`).
///
/// A profile holds either static keys (`aws_access_key_id`, `aws_secret_access_key`,
/// `aws_session_token`) or a web identity role (`role_arn`, `web_identity_token_file`,
/// `role_session_name`). Missing files and profiles are not errors, unparsable files are.
#[derive(Debug)]
pub struct IniFileCredentialProvider {
    config: Arc<Configuration>,
}

impl IniFileCredentialProvider {
    /// Create a new `IniFileCredentialProvider` instance.
    pub fn new(config: Arc<Configuration>) -> Self {
        Self { config }
    }

    async fn load_ini(&self, ctx: &Context, option: &'static str) -> Result<Option<Ini>> {
        let Some(path) = self.config.value(option) else {
            return Ok(None);
        };
        let Some(path) = ctx.expand_home_dir(path) else {
            debug!("failed to expand homedir for path: {path}");
            return Ok(None);
        };

        let content = match ctx.file_read(&path).await {
            Ok(content) => content,
            Err(err) => {
                debug!("failed to read shared file {path}: {err:?}");
                return Ok(None);
            }
        };

        let conf = Ini::load_from_str(&String::from_utf8_lossy(&content)).map_err(|e| {
            Error::config_invalid(format!("failed to parse shared file {path}")).with_source(e)
        })?;
        Ok(Some(conf))
    }

    async fn load_from_section(
        &self,
        ctx: &Context,
        props: &Properties,
    ) -> Result<Option<Credential>> {
        if let (Some(ak), Some(sk)) = (
            props.get("aws_access_key_id"),
            props.get("aws_secret_access_key"),
        ) {
            return Ok(Some(Credential {
                access_key_id: ak.to_string(),
                secret_access_key: sk.to_string(),
                session_token: props.get("aws_session_token").map(|s| s.to_string()),
                expires_at: None,
            }));
        }

        if let (Some(role_arn), Some(token_file)) =
            (props.get("role_arn"), props.get("web_identity_token_file"))
        {
            let session_name = props
                .get("role_session_name")
                .map(|v| v.to_string())
                .unwrap_or_else(default_session_name);
            let cred = assume_role_with_web_identity(
                ctx,
                &self.config,
                role_arn,
                token_file,
                &session_name,
            )
            .await?;
            return Ok(Some(cred));
        }

        Ok(None)
    }
}

#[async_trait]
impl ProvideCredential for IniFileCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let profile = self.config.profile();

        if let Some(conf) = self.load_ini(ctx, "sharedCredentialsFile").await? {
            match conf.section(Some(profile)) {
                Some(props) => {
                    if let Some(cred) = self.load_from_section(ctx, props).await? {
                        return Ok(Some(cred));
                    }
                }
                None => debug!("profile {profile} not found in credentials file"),
            }
        }

        if let Some(conf) = self.load_ini(ctx, "sharedConfigFile").await? {
            let section = match profile {
                "default" => "default".to_string(),
                x => format!("profile {x}"),
            };
            match conf.section(Some(section.as_str())) {
                Some(props) => return self.load_from_section(ctx, props).await,
                None => debug!("section {section} not found in config file"),
            }
        }

        Ok(None)
    }
}
