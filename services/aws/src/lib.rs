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

//! AWS API client runtime.
//!
//! This crate is what generated per-service bindings build on. A binding provides an
//! [`Input`] able to produce a wire-ready [`Request`] and an [`Output`] populated from a
//! [`Response`]. The runtime takes care of the rest:
//!
//! - [`Configuration`]: options resolved from explicit values, environment and defaults.
//! - [`DefaultCredentialProvider`]: credentials from configuration, web identity, shared
//!   files, ECS and EC2 metadata, cached until they are about to expire.
//! - [`RequestSigner`]: AWS SigV4 signing and presigning.
//! - [`ApiClient`]: endpoint resolution, signing and dispatch.
//! - [`ApiResult`]: lazy typed results, with transparent pagination and prefetch.
//! - [`Waiter`]: polling until a resource reaches a final state.
//!
//! ## Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use cirrus_aws::{ApiClient, Configuration, Input, Output, Request, RequestContext};
//! use cirrus_aws::{Response, ServiceMetadata};
//! use cirrus_core::{Context, OsEnv, Result};
//! use http::{HeaderMap, Method};
//! use std::collections::BTreeMap;
//!
//! #[derive(Debug, Clone)]
//! struct GetCallerIdentity;
//!
//! impl Input for GetCallerIdentity {
//!     fn request(&self) -> Result<Request> {
//!         let query = BTreeMap::from_iter([
//!             ("Action".to_string(), "GetCallerIdentity".to_string()),
//!             ("Version".to_string(), "2011-06-15".to_string()),
//!         ]);
//!         Ok(Request::new(Method::GET, "/", query, HeaderMap::new(), Bytes::new()))
//!     }
//! }
//!
//! struct CallerIdentity(String);
//!
//! impl Output for CallerIdentity {
//!     fn populate(response: &Response) -> Result<Self> {
//!         Ok(CallerIdentity(response.text()?))
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let ctx = Context::new().with_env(OsEnv);
//! let config = Configuration::default_for(&ctx)?;
//! let client = ApiClient::new(ctx, config, ServiceMetadata::new("sts"));
//!
//! let mut result = client
//!     .call::<CallerIdentity, _>(&GetCallerIdentity, &RequestContext::new())
//!     .await?;
//! println!("{}", result.output().await?.0);
//! # Ok(())
//! # }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

mod constants;

pub mod encoding;

mod config;
pub use config::parse_bool;
pub use config::Configuration;

mod credential;
pub use credential::Credential;

mod provide_credential;
pub use provide_credential::*;

mod request;
pub use request::Request;

mod sign_request;
pub use sign_request::RequestSigner;

mod retry;
pub use retry::RetryStrategy;

mod response;
pub use response::Response;
pub use response::ResponseInfo;
pub use response::ResponseState;

mod operation;
pub use operation::Input;
pub use operation::Output;
pub use operation::PaginatedInput;
pub use operation::PaginatedOutput;

mod api;
pub use api::ApiClient;
pub use api::RequestContext;
pub use api::ServiceMetadata;

mod result;
pub use result::ApiResult;
pub use result::Paginator;

mod waiter;
pub use waiter::Waiter;
pub use waiter::WaiterDefinition;
pub use waiter::WaiterState;
