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

use crate::constants::{
    AWS_QUERY_ENCODE_SET, AWS_URI_ENCODE_SET, UNSIGNED_HEADERS, UNSIGNED_PAYLOAD,
    X_AMZ_CONTENT_SHA_256, X_AMZ_DATE, X_AMZ_SECURITY_TOKEN,
};
use crate::{Credential, Request};
use cirrus_core::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256};
use cirrus_core::time::{format_date, format_iso8601, now, DateTime};
use cirrus_core::{Error, Result};
use http::{header, HeaderMap, HeaderValue};
use log::debug;
use percent_encoding::{percent_decode_str, utf8_percent_encode};
use std::fmt::Write;
use std::time::Duration;

/// Presigned URLs can not live longer than 7 days.
const MAX_PRESIGN_EXPIRES_IN: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// RequestSigner that implement AWS SigV4.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
#[derive(Debug, Clone)]
pub struct RequestSigner {
    service: String,
    region: String,

    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a new signer for `service` in `region`.
    pub fn new(service: &str, region: &str) -> Self {
        Self {
            service: service.into(),
            region: region.into(),

            time: None,
        }
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Signing name of the service.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Region requests are signed for.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Sign the request in place with an `Authorization` header.
    ///
    /// `x-amz-date` and `x-amz-security-token` are (re)written, so signing a request twice
    /// leaves only the latest signature.
    pub fn sign(&self, req: &mut Request, cred: &Credential) -> Result<()> {
        let now = self.time.unwrap_or_else(now);
        self.ensure_host(req)?;

        let headers = req.headers_mut();
        headers.remove(header::AUTHORIZATION);
        headers.insert(X_AMZ_DATE, HeaderValue::try_from(format_iso8601(now))?);
        match &cred.session_token {
            Some(token) => {
                let mut value = HeaderValue::from_str(token)?;
                // Set token value sensitive to valid leaking.
                value.set_sensitive(true);
                headers.insert(X_AMZ_SECURITY_TOKEN, value);
            }
            None => {
                headers.remove(X_AMZ_SECURITY_TOKEN);
            }
        }

        let payload_hash = self.payload_hash(req, false)?;
        if self.is_s3() {
            req.headers_mut()
                .insert(X_AMZ_CONTENT_SHA_256, HeaderValue::from_str(&payload_hash)?);
        }

        let (canonical_headers, signed_headers) = canonicalize_headers(req.headers())?;
        let creq = canonical_request_string(
            req.method().as_str(),
            &self.canonical_path(&req.path()?)?,
            &canonical_query(req.query().iter()),
            &canonical_headers,
            &signed_headers,
            &payload_hash,
        )?;
        let (scope, signature) = self.calculate_signature(&creq, cred, now)?;

        let mut authorization = HeaderValue::from_str(&format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            cred.access_key_id, scope, signed_headers, signature
        ))?;
        authorization.set_sensitive(true);
        req.headers_mut()
            .insert(header::AUTHORIZATION, authorization);

        Ok(())
    }

    /// Sign the request through its query string and return the resulting URL.
    ///
    /// `expires_in` can not exceed 7 days.
    pub fn presign(
        &self,
        req: &mut Request,
        cred: &Credential,
        expires_in: Duration,
    ) -> Result<String> {
        if expires_in > MAX_PRESIGN_EXPIRES_IN {
            return Err(Error::request_invalid(format!(
                "presigned url can not expire after more than 7 days, got {}s",
                expires_in.as_secs()
            )));
        }

        let now = self.time.unwrap_or_else(now);
        self.ensure_host(req)?;

        let (canonical_headers, signed_headers) = canonicalize_headers(req.headers())?;
        let query = req.query_mut();
        query.remove("X-Amz-Signature");
        query.insert("X-Amz-Algorithm".into(), "AWS4-HMAC-SHA256".into());
        query.insert(
            "X-Amz-Credential".into(),
            format!(
                "{}/{}/{}/{}/aws4_request",
                cred.access_key_id,
                format_date(now),
                self.region,
                self.service
            ),
        );
        query.insert("X-Amz-Date".into(), format_iso8601(now));
        query.insert("X-Amz-Expires".into(), expires_in.as_secs().to_string());
        query.insert("X-Amz-SignedHeaders".into(), signed_headers.clone());
        match &cred.session_token {
            Some(token) => {
                query.insert("X-Amz-Security-Token".into(), token.clone());
            }
            None => {
                query.remove("X-Amz-Security-Token");
            }
        }

        let payload_hash = self.payload_hash(req, true)?;
        let creq = canonical_request_string(
            req.method().as_str(),
            &self.canonical_path(&req.path()?)?,
            &canonical_query(req.query().iter()),
            &canonical_headers,
            &signed_headers,
            &payload_hash,
        )?;
        let (_, signature) = self.calculate_signature(&creq, cred, now)?;
        req.set_query_param("X-Amz-Signature", signature);

        req.endpoint()
    }

    fn is_s3(&self) -> bool {
        self.service == "s3"
    }

    fn ensure_host(&self, req: &mut Request) -> Result<()> {
        if req.headers().get(header::HOST).is_none() {
            let host = req.host()?;
            req.headers_mut()
                .insert(header::HOST, HeaderValue::from_str(&host)?);
        }
        Ok(())
    }

    /// Hash of the payload covered by the signature.
    fn payload_hash(&self, req: &Request, presign: bool) -> Result<String> {
        if let Some(v) = req.headers().get(X_AMZ_CONTENT_SHA_256) {
            return Ok(v.to_str()?.to_string());
        }
        if req.is_unsigned_payload() || (presign && self.is_s3()) {
            return Ok(UNSIGNED_PAYLOAD.to_string());
        }

        Ok(hex_sha256(req.body()))
    }

    /// S3 expects the path encoded once, every other service expects it encoded twice.
    fn canonical_path(&self, uri: &str) -> Result<String> {
        let path = if uri.is_empty() { "/" } else { uri };
        if self.is_s3() {
            let decoded = percent_decode_str(path).decode_utf8().map_err(|e| {
                Error::request_invalid(format!("failed to decode path {path}")).with_source(e)
            })?;
            Ok(utf8_percent_encode(&decoded, &AWS_URI_ENCODE_SET).to_string())
        } else {
            Ok(utf8_percent_encode(path, &AWS_URI_ENCODE_SET).to_string())
        }
    }

    fn calculate_signature(
        &self,
        creq: &str,
        cred: &Credential,
        now: DateTime,
    ) -> Result<(String, String)> {
        let encoded_req = hex_sha256(creq.as_bytes());

        // Scope: "20220313/<region>/<service>/aws4_request"
        let scope = format!(
            "{}/{}/{}/aws4_request",
            format_date(now),
            self.region,
            self.service
        );
        debug!("calculated scope: {scope}");

        // StringToSign:
        //
        // AWS4-HMAC-SHA256
        // 20220313T072004Z
        // 20220313/<region>/<service>/aws4_request
        // <hashed_canonical_request>
        let string_to_sign = {
            let mut f = String::new();
            writeln!(f, "AWS4-HMAC-SHA256")?;
            writeln!(f, "{}", format_iso8601(now))?;
            writeln!(f, "{}", &scope)?;
            write!(f, "{}", &encoded_req)?;
            f
        };
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key =
            generate_signing_key(&cred.secret_access_key, now, &self.region, &self.service);
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        Ok((scope, signature))
    }
}

/// Build the canonical headers block and the signed headers list.
///
/// Names are lower-cased and sorted, values are trimmed with inner runs of spaces collapsed,
/// repeated headers are joined with `,`.
fn canonicalize_headers(headers: &HeaderMap) -> Result<(String, String)> {
    let mut names: Vec<&str> = headers
        .keys()
        .map(|k| k.as_str())
        .filter(|k| !UNSIGNED_HEADERS.contains(k))
        .collect();
    names.sort_unstable();

    let mut canonical = String::with_capacity(256);
    for name in &names {
        let mut values = Vec::new();
        for value in headers.get_all(*name) {
            values.push(value.to_str()?.split_whitespace().collect::<Vec<_>>().join(" "));
        }
        writeln!(canonical, "{}:{}", name, values.join(","))?;
    }

    Ok((canonical, names.join(";")))
}

/// Sorted `key=value` pairs, both encoded per RFC 3986.
fn canonical_query<'a>(query: impl Iterator<Item = (&'a String, &'a String)>) -> String {
    let mut pairs: Vec<(String, String)> = query
        .map(|(k, v)| {
            (
                utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET).to_string(),
                utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET).to_string(),
            )
        })
        .collect();
    // Sort by param name
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn canonical_request_string(
    method: &str,
    path: &str,
    query: &str,
    canonical_headers: &str,
    signed_headers: &str,
    payload_hash: &str,
) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    writeln!(f, "{method}")?;
    writeln!(f, "{path}")?;
    writeln!(f, "{query}")?;
    // Every canonical header already ends with a newline.
    writeln!(f, "{canonical_headers}")?;
    writeln!(f, "{signed_headers}")?;
    write!(f, "{payload_hash}")?;

    debug!("calculated canonical request: {f}");
    Ok(f)
}

fn generate_signing_key(secret: &str, time: DateTime, region: &str, service: &str) -> Vec<u8> {
    // Sign secret
    let secret = format!("AWS4{secret}");
    // Sign date
    let sign_date = hmac_sha256(secret.as_bytes(), format_date(time).as_bytes());
    // Sign region
    let sign_region = hmac_sha256(sign_date.as_slice(), region.as_bytes());
    // Sign service
    let sign_service = hmac_sha256(sign_region.as_slice(), service.as_bytes());
    // Sign request
    hmac_sha256(sign_service.as_slice(), "aws4_request".as_bytes())
}
