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

use crate::constants::*;
use cirrus_core::{Context, Error, Result};
use std::collections::{HashMap, HashSet};

/// Environment fallback groups.
///
/// Options of the same group are sourced from the environment all together or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Group {
    Region,
    Profile,
    StaticCredentials,
    SharedCredentialsFile,
    SharedConfigFile,
    WebIdentity,
    Container,
    EndpointDiscovery,
    Sts,
}

#[derive(Debug)]
struct OptionSpec {
    name: &'static str,
    envs: &'static [&'static str],
    group: Option<Group>,
    default: Option<&'static str>,
    boolean: bool,
}

const fn option(
    name: &'static str,
    envs: &'static [&'static str],
    group: Option<Group>,
    default: Option<&'static str>,
) -> OptionSpec {
    OptionSpec {
        name,
        envs,
        group,
        default,
        boolean: false,
    }
}

const fn flag(
    name: &'static str,
    envs: &'static [&'static str],
    group: Option<Group>,
    default: &'static str,
) -> OptionSpec {
    OptionSpec {
        name,
        envs,
        group,
        default: Some(default),
        boolean: true,
    }
}

static OPTIONS: &[OptionSpec] = &[
    option(
        "region",
        &[AWS_REGION, AWS_DEFAULT_REGION],
        Some(Group::Region),
        Some("us-east-1"),
    ),
    option(
        "profile",
        &[AWS_PROFILE, AWS_DEFAULT_PROFILE],
        Some(Group::Profile),
        Some("default"),
    ),
    option(
        "accessKeyId",
        &[AWS_ACCESS_KEY_ID, AWS_ACCESS_KEY],
        Some(Group::StaticCredentials),
        None,
    ),
    option(
        "accessKeySecret",
        &[AWS_SECRET_ACCESS_KEY, AWS_SECRET_KEY],
        Some(Group::StaticCredentials),
        None,
    ),
    option(
        "sessionToken",
        &[AWS_SESSION_TOKEN],
        Some(Group::StaticCredentials),
        None,
    ),
    option(
        "sharedCredentialsFile",
        &[AWS_SHARED_CREDENTIALS_FILE],
        Some(Group::SharedCredentialsFile),
        Some("~/.aws/credentials"),
    ),
    option(
        "sharedConfigFile",
        &[AWS_CONFIG_FILE],
        Some(Group::SharedConfigFile),
        Some("~/.aws/config"),
    ),
    option(
        "roleArn",
        &[AWS_ROLE_ARN],
        Some(Group::WebIdentity),
        None,
    ),
    option(
        "webIdentityTokenFile",
        &[AWS_WEB_IDENTITY_TOKEN_FILE],
        Some(Group::WebIdentity),
        None,
    ),
    option(
        "roleSessionName",
        &[AWS_ROLE_SESSION_NAME],
        Some(Group::WebIdentity),
        None,
    ),
    option(
        "containerCredentialsRelativeUri",
        &[AWS_CONTAINER_CREDENTIALS_RELATIVE_URI],
        Some(Group::Container),
        None,
    ),
    flag(
        "endpointDiscoveryEnabled",
        &[AWS_ENDPOINT_DISCOVERY_ENABLED, AWS_ENABLE_ENDPOINT_DISCOVERY],
        Some(Group::EndpointDiscovery),
        "false",
    ),
    option(
        "stsRegionalEndpoints",
        &[AWS_STS_REGIONAL_ENDPOINTS],
        Some(Group::Sts),
        Some("regional"),
    ),
    option("endpoint", &[], None, Some(DEFAULT_ENDPOINT)),
    flag("pathStyleEndpoint", &[], None, "false"),
    flag("sendChunkedBody", &[], None, "false"),
];

fn lookup(name: &str) -> Result<&'static OptionSpec> {
    OPTIONS
        .iter()
        .find(|o| o.name == name)
        .ok_or_else(|| Error::config_invalid(format!("unknown configuration option: {name}")))
}

/// Parse a boolean option value.
///
/// Accepts `true/false`, `1/0`, `yes/no` and `on/off`, case-insensitively.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration of an API client.
///
/// Every value is resolved once by [`Configuration::create`], in this order:
///
/// 1. the options given by the caller,
/// 2. the environment, one group of variables at a time,
/// 3. the static defaults.
///
/// A group is skipped entirely when the caller set any of its options, so that an explicit
/// secret key is never paired with an access key coming from the environment.
#[derive(Debug, Clone)]
pub struct Configuration {
    values: HashMap<&'static str, String>,
    defaulted: HashSet<&'static str>,
}

impl Configuration {
    /// Build a configuration from explicit options, environment and defaults.
    pub fn create<I, K, V>(ctx: &Context, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut values = HashMap::new();
        for (name, value) in options {
            let spec = lookup(name.as_ref())?;
            values.insert(spec.name, value.into());
        }

        let explicit_groups: HashSet<Group> = OPTIONS
            .iter()
            .filter(|o| values.contains_key(o.name))
            .filter_map(|o| o.group)
            .collect();

        for spec in OPTIONS {
            let Some(group) = spec.group else {
                continue;
            };
            if explicit_groups.contains(&group) {
                continue;
            }
            if let Some(value) = spec
                .envs
                .iter()
                .filter_map(|key| ctx.env_var(key))
                .find(|v| !v.is_empty())
            {
                log::debug!("configuration option {} loaded from environment", spec.name);
                values.insert(spec.name, value);
            }
        }

        let mut defaulted = HashSet::new();
        for spec in OPTIONS {
            if values.contains_key(spec.name) {
                continue;
            }
            defaulted.insert(spec.name);
            if let Some(default) = spec.default {
                values.insert(spec.name, default.to_string());
            }
        }

        let cfg = Self { values, defaulted };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build a configuration from environment and defaults only.
    pub fn default_for(ctx: &Context) -> Result<Self> {
        Self::create(ctx, Vec::<(&str, String)>::new())
    }

    fn validate(&self) -> Result<()> {
        for spec in OPTIONS.iter().filter(|o| o.boolean) {
            if let Some(value) = self.values.get(spec.name) {
                if parse_bool(value).is_none() {
                    return Err(Error::config_invalid(format!(
                        "option {} expects a boolean, got {value:?}",
                        spec.name
                    )));
                }
            }
        }

        if let Some(value) = self.values.get("stsRegionalEndpoints") {
            if value != "legacy" && value != "regional" {
                return Err(Error::config_invalid(format!(
                    "option stsRegionalEndpoints must be legacy or regional, got {value:?}"
                )));
            }
        }

        Ok(())
    }

    /// Get the value of an option, if it has one.
    pub fn get(&self, name: &str) -> Result<Option<&str>> {
        let spec = lookup(name)?;
        Ok(self.values.get(spec.name).map(|v| v.as_str()))
    }

    /// Check if an option has a value.
    pub fn has(&self, name: &str) -> Result<bool> {
        let spec = lookup(name)?;
        Ok(self.values.contains_key(spec.name))
    }

    /// Check if an option was neither given nor found in the environment.
    pub fn is_default(&self, name: &str) -> Result<bool> {
        let spec = lookup(name)?;
        Ok(self.defaulted.contains(spec.name))
    }

    /// Get a boolean option, options without value read as `false`.
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        let spec = lookup(name)?;
        if !spec.boolean {
            return Err(Error::config_invalid(format!(
                "option {name} is not a boolean option"
            )));
        }

        Ok(self
            .values
            .get(spec.name)
            .and_then(|v| parse_bool(v))
            .unwrap_or_default())
    }

    /// Region used when neither the input nor the call carries one.
    pub fn region(&self) -> &str {
        self.values
            .get("region")
            .map(|v| v.as_str())
            .unwrap_or("us-east-1")
    }

    /// Profile selected in the shared files.
    pub fn profile(&self) -> &str {
        self.values
            .get("profile")
            .map(|v| v.as_str())
            .unwrap_or("default")
    }

    pub(crate) fn value(&self, name: &'static str) -> Option<&str> {
        self.values.get(name).map(|v| v.as_str())
    }
}
