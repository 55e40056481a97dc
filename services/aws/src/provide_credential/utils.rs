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

use cirrus_core::time::{parse_rfc3339, DateTime};
use cirrus_core::{Error, Result};

/// Get the sts endpoint.
///
/// The returning format may look like `sts.{region}.amazonaws.com`
///
/// # Notes
///
/// AWS could have different sts endpoint based on it's region.
/// We can check them by region name.
///
/// ref: https://github.com/awslabs/aws-sdk-rust/blob/31cfae2cf23be0c68a47357070dea1aee9227e3a/sdk/sts/src/aws_endpoint.rs
pub fn sts_endpoint(region: &str, use_regional: bool) -> Result<String> {
    if use_regional {
        if region.is_empty() {
            return Err(Error::config_invalid("regional STS endpoint requires region"));
        }
        if region.starts_with("cn-") {
            Ok(format!("sts.{region}.amazonaws.com.cn"))
        } else {
            Ok(format!("sts.{region}.amazonaws.com"))
        }
    } else if region.starts_with("cn-") {
        Ok("sts.amazonaws.com.cn".to_string())
    } else {
        Ok("sts.amazonaws.com".to_string())
    }
}

/// Parse the expiration returned by STS and the metadata services.
pub fn parse_expiration(value: &str) -> Result<DateTime> {
    parse_rfc3339(value).map_err(|e| {
        Error::credential_invalid(format!("invalid credential expiration {value:?}")).with_source(e)
    })
}
