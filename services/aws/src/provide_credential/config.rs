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

use crate::{Configuration, Credential};
use async_trait::async_trait;
use cirrus_core::{Context, ProvideCredential, Result};
use std::sync::Arc;

/// ConfigurationCredentialProvider loads the static keys held by the [`Configuration`].
///
/// The keys reach the configuration either explicitly or from `AWS_ACCESS_KEY_ID`,
/// `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`.
#[derive(Debug)]
pub struct ConfigurationCredentialProvider {
    config: Arc<Configuration>,
}

impl ConfigurationCredentialProvider {
    /// Create a new `ConfigurationCredentialProvider` instance.
    pub fn new(config: Arc<Configuration>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ProvideCredential for ConfigurationCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, _: &Context) -> Result<Option<Self::Credential>> {
        let (Some(ak), Some(sk)) = (
            self.config.value("accessKeyId"),
            self.config.value("accessKeySecret"),
        ) else {
            return Ok(None);
        };

        Ok(Some(Credential {
            access_key_id: ak.to_string(),
            secret_access_key: sk.to_string(),
            session_token: self.config.value("sessionToken").map(|v| v.to_string()),
            expires_at: None,
        }))
    }
}
