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

use crate::provide_credential::{
    CacheCredentialProvider, ConfigurationCredentialProvider, ContainerCredentialProvider,
    IniFileCredentialProvider, InstanceCredentialProvider, WebIdentityCredentialProvider,
};
use crate::{Configuration, Credential};
use async_trait::async_trait;
use cirrus_core::{Context, ProvideCredential, ProvideCredentialChain, Result};
use std::sync::Arc;

/// DefaultCredentialProvider is a loader that will try to load credential via default chains.
///
/// Resolution order:
///
/// 1. Configuration (explicit keys or `AWS_ACCESS_KEY_ID` and friends)
/// 2. Web Identity Tokens
/// 3. Shared files (`~/.aws/credentials`, `~/.aws/config`)
/// 4. ECS container credentials
/// 5. EC2 instance metadata
///
/// The answer of the chain is cached until the credential comes close to its expiration.
#[derive(Debug)]
pub struct DefaultCredentialProvider {
    chain: CacheCredentialProvider<ProvideCredentialChain<Credential>>,
}

impl DefaultCredentialProvider {
    /// Create a new `DefaultCredentialProvider` instance.
    pub fn new(config: Arc<Configuration>) -> Self {
        let chain = ProvideCredentialChain::new()
            .push(ConfigurationCredentialProvider::new(config.clone()))
            .push(WebIdentityCredentialProvider::new(config.clone()))
            .push(IniFileCredentialProvider::new(config.clone()))
            .push(ContainerCredentialProvider::new(config))
            .push(InstanceCredentialProvider::new());

        Self::with_chain(chain)
    }

    /// Create with a custom credential chain.
    pub fn with_chain(chain: ProvideCredentialChain<Credential>) -> Self {
        Self {
            chain: CacheCredentialProvider::new(chain),
        }
    }

    /// Drop the cached credential.
    pub fn clear(&self) {
        self.chain.clear()
    }
}

#[async_trait]
impl ProvideCredential for DefaultCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        self.chain.provide_credential(ctx).await
    }
}
