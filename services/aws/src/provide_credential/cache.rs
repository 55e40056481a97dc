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

use crate::Credential;
use async_trait::async_trait;
use cirrus_core::{Context, ProvideCredential, Result};
use log::debug;
use std::sync::Mutex;

/// CacheCredentialProvider memoizes the answer of the provider it wraps.
///
/// The cached answer, including the absence of any credential, is served until the cached
/// credential comes close to its expiration; the inner provider is then asked again.
///
/// The lock is never held across the inner resolution. Two tasks racing on an empty cache both
/// resolve and the last one wins.
#[derive(Debug)]
pub struct CacheCredentialProvider<P> {
    inner: P,
    cached: Mutex<Option<Option<Credential>>>,
}

impl<P> CacheCredentialProvider<P>
where
    P: ProvideCredential<Credential = Credential>,
{
    /// Wrap `inner` with a cache.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cached: Mutex::new(None),
        }
    }

    /// Drop the cached answer, the next call resolves again.
    pub fn clear(&self) {
        *self.cached.lock().expect("lock poisoned") = None;
    }

    /// Get the wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P> ProvideCredential for CacheCredentialProvider<P>
where
    P: ProvideCredential<Credential = Credential>,
{
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let cached = self.cached.lock().expect("lock poisoned").clone();
        match cached {
            Some(Some(cred)) if !cred.is_expired() => return Ok(Some(cred)),
            Some(None) => return Ok(None),
            Some(Some(_)) => debug!("cached credential is about to expire, refreshing"),
            None => {}
        }

        let cred = self.inner.provide_credential(ctx).await?;
        *self.cached.lock().expect("lock poisoned") = Some(cred.clone());
        Ok(cred)
    }
}
