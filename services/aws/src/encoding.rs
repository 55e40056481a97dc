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

//! Escaping helpers shared by request serializers.

use crate::constants::AWS_QUERY_ENCODE_SET;
use percent_encoding::utf8_percent_encode;

/// Percent encode `input` per RFC 3986: only unreserved characters are kept.
///
/// ```
/// use cirrus_aws::encoding::rfc3986_encode;
///
/// assert_eq!(rfc3986_encode("a b/c~"), "a%20b%2Fc~");
/// ```
pub fn rfc3986_encode(input: &str) -> String {
    utf8_percent_encode(input, &AWS_QUERY_ENCODE_SET).to_string()
}

/// Encode `input` as `application/x-www-form-urlencoded`, spaces becoming `+`.
///
/// Query protocol bodies are written with this escaping.
///
/// ```
/// use cirrus_aws::encoding::rfc1738_encode;
///
/// assert_eq!(rfc1738_encode("a b&c"), "a+b%26c");
/// ```
pub fn rfc1738_encode(input: &str) -> String {
    form_urlencoded::byte_serialize(input.as_bytes()).collect()
}
