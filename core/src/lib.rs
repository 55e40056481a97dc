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

//! Core components shared by every cirrus service runtime.
//!
//! This crate holds the service independent building blocks:
//!
//! - **Context**: a container for file reading, HTTP sending and environment access, so that
//!   every side effect of credential loading can be swapped out in tests.
//! - **Error**: the single error type used across the workspace, including the HTTP error family
//!   produced when a response is classified.
//! - **Credential traits**: [`ProvideCredential`] for sources of credentials and
//!   [`ProvideCredentialChain`] to try several sources in order.
//!
//! ## Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use cirrus_core::{Context, ProvideCredential, ProvideCredentialChain, Result, SigningCredential};
//!
//! #[derive(Clone, Debug)]
//! struct MyCredential {
//!     key: String,
//! }
//!
//! impl SigningCredential for MyCredential {
//!     fn is_valid(&self) -> bool {
//!         !self.key.is_empty()
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct MyProvider;
//!
//! #[async_trait]
//! impl ProvideCredential for MyProvider {
//!     type Credential = MyCredential;
//!
//!     async fn provide_credential(&self, _: &Context) -> Result<Option<Self::Credential>> {
//!         Ok(Some(MyCredential { key: "my-key".to_string() }))
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let chain = ProvideCredentialChain::new().push(MyProvider);
//! let cred = chain.provide_credential(&Context::new()).await?;
//! assert!(cred.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## Utilities
//!
//! - [`hash`]: hashing and HMAC helpers used by request signing
//! - [`time`]: time formatting and parsing
//! - [`utils`]: redaction of secrets in `Debug` output

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;
pub mod utils;

mod context;
pub use context::Context;
pub use context::Env;
pub use context::FileRead;
pub use context::HttpSend;
pub use context::NoopEnv;
pub use context::NoopFileRead;
pub use context::NoopHttpSend;
pub use context::OsEnv;
pub use context::StaticEnv;

mod error;
pub use error::Error;
pub use error::ErrorKind;
pub use error::Result;

mod api;
pub use api::ProvideCredential;
pub use api::SigningCredential;

mod chain;
pub use chain::ProvideCredentialChain;
