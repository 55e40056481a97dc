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

use crate::constants::DEFAULT_ENDPOINT;
use crate::result::PageSource;
use crate::{
    ApiResult, Configuration, Credential, DefaultCredentialProvider, Input, Output,
    PaginatedInput, PaginatedOutput, Request, RequestSigner, Response, RetryStrategy, Waiter,
    WaiterDefinition,
};
use cirrus_core::{Context, Error, ProvideCredential, Result};
use http::header::{CONTENT_LENGTH, USER_AGENT};
use http::HeaderValue;
use log::debug;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CIRRUS_USER_AGENT: &str = concat!("cirrus-aws/", env!("CARGO_PKG_VERSION"));

/// Identity of the service an [`ApiClient`] talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMetadata {
    endpoint_prefix: String,
    signing_name: Option<String>,
}

impl ServiceMetadata {
    /// Create metadata for the service reachable under `endpoint_prefix`, e.g. `sqs`.
    pub fn new(endpoint_prefix: impl Into<String>) -> Self {
        Self {
            endpoint_prefix: endpoint_prefix.into(),
            signing_name: None,
        }
    }

    /// Set the name used in the signature scope when it differs from the endpoint prefix.
    pub fn with_signing_name(mut self, signing_name: impl Into<String>) -> Self {
        self.signing_name = Some(signing_name.into());
        self
    }

    /// Prefix substituted for `%service%` in the endpoint template.
    pub fn endpoint_prefix(&self) -> &str {
        &self.endpoint_prefix
    }

    /// Name used in the signature scope.
    pub fn signing_name(&self) -> &str {
        self.signing_name.as_deref().unwrap_or(&self.endpoint_prefix)
    }
}

/// Per call options.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    region: Option<String>,
    require_credentials: bool,
}

impl RequestContext {
    /// Create an empty request context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Send the call to `region` unless the input picks one itself.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Fail with `CredentialUnavailable` instead of sending an unsigned request.
    pub fn with_require_credentials(mut self, require: bool) -> Self {
        self.require_credentials = require;
        self
    }

    /// Region of this call, if any.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Check if the call must be signed.
    pub fn requires_credentials(&self) -> bool {
        self.require_credentials
    }
}

/// ApiClient turns operation inputs into signed, dispatched requests.
///
/// Every call resolves the endpoint, picks the signer of the target region, loads
/// credentials and dispatches the request. A call made without credentials is sent unsigned,
/// which is what public and anonymous endpoints expect.
///
/// ApiClient is cheap to clone, clones share the signer memo and the credential provider.
#[derive(Clone)]
pub struct ApiClient {
    ctx: Context,
    config: Arc<Configuration>,
    service: Arc<ServiceMetadata>,
    provider: Arc<dyn ProvideCredential<Credential = Credential>>,
    retry: RetryStrategy,

    signers: Arc<Mutex<HashMap<String, Arc<RequestSigner>>>>,
}

impl Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("service", &self.service)
            .field("config", &self.config)
            .field("provider", &self.provider)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client loading credentials through [`DefaultCredentialProvider`].
    pub fn new(ctx: Context, config: Configuration, service: ServiceMetadata) -> Self {
        let config = Arc::new(config);
        let provider = DefaultCredentialProvider::new(config.clone());

        Self {
            ctx,
            config,
            service: Arc::new(service),
            provider: Arc::new(provider),
            retry: RetryStrategy::default(),

            signers: Arc::default(),
        }
    }

    /// Replace the credential provider.
    pub fn with_credential_provider(
        mut self,
        provider: impl ProvideCredential<Credential = Credential>,
    ) -> Self {
        self.provider = Arc::new(provider);
        self
    }

    /// Replace the retry strategy applied to every dispatched request.
    pub fn with_retry_strategy(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }

    /// Configuration of this client.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Service this client talks to.
    pub fn service(&self) -> &ServiceMetadata {
        &self.service
    }

    /// Dispatch `input` and wrap the response into a typed result.
    pub async fn call<O, I>(&self, input: &I, context: &RequestContext) -> Result<ApiResult<O>>
    where
        O: Output,
        I: Input,
    {
        let response = self.response(input, context).await?;
        Ok(ApiResult::new(response, None))
    }

    /// Dispatch the first page of a listing.
    ///
    /// The returned result keeps the input and the client around to fetch the following
    /// pages on demand.
    pub async fn paginated<O, I>(
        &self,
        input: I,
        context: RequestContext,
    ) -> Result<ApiResult<O, I>>
    where
        O: PaginatedOutput,
        I: PaginatedInput,
    {
        let response = self.response(&input, &context).await?;
        let source = PageSource::new(self.clone(), input, context);
        Ok(ApiResult::new(response, Some(source)))
    }

    /// Dispatch the first poll of a waiter.
    pub async fn waiter<W>(
        &self,
        input: W::Input,
        definition: W,
        context: RequestContext,
    ) -> Result<Waiter<W>>
    where
        W: WaiterDefinition,
    {
        let response = self.response(&input, &context).await?;
        Ok(Waiter::new(
            self.clone(),
            input,
            context,
            definition,
            response,
        ))
    }

    /// Build, sign and dispatch the request of `input`.
    pub async fn response<I: Input>(
        &self,
        input: &I,
        context: &RequestContext,
    ) -> Result<Response> {
        let (mut req, signer, cred) = self.prepare(input, context).await?;

        req.headers_mut()
            .insert(USER_AGENT, HeaderValue::from_static(CIRRUS_USER_AGENT));
        match &cred {
            Some(cred) => signer.sign(&mut req, cred)?,
            None => debug!("no credential loaded, sending unsigned request"),
        }
        if !req.headers().contains_key(CONTENT_LENGTH) {
            let len = req.body().len();
            req.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
        }

        let http_req = req.to_http()?;
        Ok(Response::dispatch(&self.ctx, http_req, self.retry.clone()))
    }

    /// Build a presigned URL for `input`, valid for `expires_in`. Nothing is sent.
    pub async fn presign<I: Input>(
        &self,
        input: &I,
        context: &RequestContext,
        expires_in: Duration,
    ) -> Result<String> {
        let (mut req, signer, cred) = self.prepare(input, context).await?;
        let cred = cred.ok_or_else(|| {
            Error::credential_unavailable("no credential available to presign request")
        })?;

        signer.presign(&mut req, &cred, expires_in)
    }

    async fn prepare<I: Input>(
        &self,
        input: &I,
        context: &RequestContext,
    ) -> Result<(Request, Arc<RequestSigner>, Option<Credential>)> {
        let mut req = input.request()?;

        let region = input
            .region()
            .or(context.region())
            .unwrap_or(self.config.region())
            .to_string();
        req.set_endpoint(self.endpoint(&region)?)?;
        let signer = self.signer(&region);

        let cred = self.provider.provide_credential(&self.ctx).await?;
        if cred.is_none() && context.requires_credentials() {
            return Err(Error::credential_unavailable(format!(
                "no credential available for {} in {region}",
                self.service.endpoint_prefix()
            )));
        }

        Ok((req, signer, cred))
    }

    /// Base endpoint for `region`.
    ///
    /// An endpoint given explicitly wins over the default template, even when it is equal to it.
    fn endpoint(&self, region: &str) -> Result<String> {
        let template = if self.config.is_default("endpoint")? {
            DEFAULT_ENDPOINT
        } else {
            self.config.get("endpoint")?.unwrap_or(DEFAULT_ENDPOINT)
        };

        Ok(template
            .replace("%service%", self.service.endpoint_prefix())
            .replace("%region%", region))
    }

    /// Signer of `region`, created on first use.
    ///
    /// Two racing calls may both build a signer, the last one inserted wins. Signers are
    /// stateless so either is fine.
    fn signer(&self, region: &str) -> Arc<RequestSigner> {
        if let Some(signer) = self.signers.lock().expect("lock poisoned").get(region) {
            return signer.clone();
        }

        debug!(
            "creating signer for {} in {region}",
            self.service.signing_name()
        );
        let signer = Arc::new(RequestSigner::new(self.service.signing_name(), region));
        self.signers
            .lock()
            .expect("lock poisoned")
            .insert(region.to_string(), signer.clone());
        signer
    }
}
