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

//! Seams implemented by generated per-service bindings.

use crate::{Request, Response};
use cirrus_core::Result;
use std::fmt::Debug;

/// Input is the request side of an operation.
pub trait Input: Clone + Debug + Send + Sync + 'static {
    /// Build the wire request.
    ///
    /// Must fail with [`ErrorKind::MissingParameter`](cirrus_core::ErrorKind::MissingParameter)
    /// when a required field is absent, before anything is sent.
    fn request(&self) -> Result<Request>;

    /// Region this input targets, overriding the client configuration.
    fn region(&self) -> Option<&str> {
        None
    }
}

/// Output is the typed view over a successful response.
pub trait Output: Sized + Send + 'static {
    /// Fill the output from the response, called once per response.
    fn populate(response: &Response) -> Result<Self>;
}

/// An input that can continue a listing from a continuation token.
pub trait PaginatedInput: Input {
    /// Clone this input with the continuation token applied.
    fn with_next_token(&self, token: &str) -> Self;
}

/// An output holding one page of a listing.
pub trait PaginatedOutput: Output {
    /// Item of the listing.
    type Item: Send + 'static;

    /// Continuation token of the next page. `None` or empty on the last page.
    fn next_token(&self) -> Option<&str>;

    /// Move the items of this page out.
    fn take_items(&mut self) -> Vec<Self::Item>;
}
