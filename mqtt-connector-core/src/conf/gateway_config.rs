/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/


//! Parsing of configuration for the function gateway.

use super::AppConfigDefaults;
use crate::util::DurationResolver;
use config::ConfigBuilder;
use config::ConfigError;
use config::builder::BuilderState;
use mqtt_connector_gw::ConnectorError;
use mqtt_connector_gw::ConnectorErrorKind;
use serde::Deserialize;
use std::time::Duration;

/// Function gateway implementation variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayImplementation {
    /// Gateway reached over HTTP.
    Http,
    /// Ephemeral in-memory gateway.
    Mem,
}

/// Configuration for the function gateway.
#[derive(Deserialize)]
pub struct GatewayConfig {
    /// Gateway implementation
    implementation: String,
    /// Base URL of the gateway.
    url: String,
    /// Basic auth username for the system endpoints.
    username: String,
    /// Basic auth password for the system endpoints.
    password: String,
    /// Namespace to look for functions in. Empty means all namespaces.
    namespace: String,
    /// Timeout for every request to the gateway.
    timeout: String,
    /// Content-Type of invocation requests.
    contenttype: String,
    /// Invoke through the gateway's queue.
    asyncinvoke: bool,
    /// Callback URL for asynchronous invocations.
    callbackurl: String,
    /// Resolved from `timeout`.
    #[serde(skip)]
    request_timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("implementation", &self.implementation)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"*redacted*")
            .field("namespace", &self.namespace)
            .field("timeout", &self.timeout)
            .field("contenttype", &self.contenttype)
            .field("asyncinvoke", &self.asyncinvoke)
            .field("callbackurl", &self.callbackurl)
            .finish()
    }
}

impl AppConfigDefaults for GatewayConfig {
    /// Provide defaults for this part of the configuration
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> Result<ConfigBuilder<T>, ConfigError> {
        config_builder
            .set_default(prefix.to_string() + "." + "implementation", "http")?
            .set_default(prefix.to_string() + "." + "url", "")?
            .set_default(prefix.to_string() + "." + "username", "admin")?
            .set_default(prefix.to_string() + "." + "password", "")?
            .set_default(prefix.to_string() + "." + "namespace", "")?
            .set_default(prefix.to_string() + "." + "timeout", "60s")?
            .set_default(prefix.to_string() + "." + "contenttype", "text/plain")?
            .set_default(prefix.to_string() + "." + "asyncinvoke", "false")?
            .set_default(prefix.to_string() + "." + "callbackurl", "")
    }
}

impl GatewayConfig {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub(super) fn resolve_durations(&mut self, resolver: &mut DurationResolver) {
        self.request_timeout =
            resolver.resolve(&self.timeout, Self::DEFAULT_TIMEOUT, "gateway timeout");
    }

    /// Gateway implementation variant.
    pub fn implementation(&self) -> Result<GatewayImplementation, ConnectorError> {
        match self.implementation.as_str() {
            "http" => Ok(GatewayImplementation::Http),
            "mem" => Ok(GatewayImplementation::Mem),
            unknown => Err(ConnectorErrorKind::Configuration
                .error_with_msg(format!("Unknown gateway implementation '{unknown}'."))),
        }
    }

    /// Base URL of the gateway.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Explicitly configured basic auth credentials `(username, password)`.
    ///
    /// Only present when a password has been set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        (!self.password.is_empty()).then_some((self.username.as_str(), self.password.as_str()))
    }

    /// Namespace to look for functions in or `None` for all namespaces.
    pub fn namespace(&self) -> Option<&str> {
        Some(self.namespace.trim()).filter(|namespace| !namespace.is_empty())
    }

    /// Timeout for every request to the gateway. Defaults to 60 seconds.
    pub fn timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Content-Type of invocation requests.
    pub fn content_type(&self) -> &str {
        &self.contenttype
    }

    /// Return `true` if functions should be invoked through the gateway's
    /// queue.
    pub fn async_invoke(&self) -> bool {
        self.asyncinvoke
    }

    /// Callback URL for asynchronous invocations.
    pub fn callback_url(&self) -> Option<&str> {
        Some(self.callbackurl.as_str()).filter(|url| !url.is_empty())
    }
}
