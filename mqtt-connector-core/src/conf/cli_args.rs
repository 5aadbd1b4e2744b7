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


//! Command line flags.

use clap::Parser;
use config::ConfigBuilder;
use config::ConfigError;
use config::builder::BuilderState;

/// Bridge MQTT topics to functions behind a gateway.
///
/// Every flag overrides the same setting from the configuration file and
/// environment.
#[derive(Debug, Default, Parser)]
#[command(version, about)]
pub struct CliArgs {
    /// Gateway URL.
    #[arg(long, env = "gateway_url")]
    gateway: Option<String>,
    /// Username for the gateway.
    #[arg(long = "gw-username")]
    gw_username: Option<String>,
    /// Password for the gateway.
    #[arg(long = "gw-password")]
    gw_password: Option<String>,
    /// Only route to functions in this namespace (default: all namespaces).
    #[arg(long, env = "namespace")]
    namespace: Option<String>,
    /// The topic filter to subscribe to.
    #[arg(long)]
    topic: Option<String>,
    /// The broker URI. ex: tcp://10.10.1.1:1883
    #[arg(long)]
    broker: Option<String>,
    /// The MQTT user (optional).
    #[arg(long)]
    user: Option<String>,
    /// The MQTT password (optional).
    #[arg(long)]
    password: Option<String>,
    /// The MQTT client ID (optional).
    #[arg(long)]
    id: Option<String>,
    /// Set clean session.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    clean: Option<bool>,
    /// The quality of service 0, 1 or 2.
    #[arg(long)]
    qos: Option<u8>,
    /// Trim channel key when using emitter.io MQTT broker.
    #[arg(long = "trim-channel-key", num_args = 0..=1, default_missing_value = "true")]
    trim_channel_key: Option<bool>,
    /// Invoke via queueing using the function's async endpoint.
    #[arg(long = "async-invoke", num_args = 0..=1, default_missing_value = "true")]
    async_invoke: Option<bool>,
    /// Callback URL for asynchronous invocations.
    #[arg(long = "async-callback-url")]
    async_callback_url: Option<String>,
    /// Interval between rebuilding map of functions vs. topics, like `10s`.
    #[arg(long = "rebuild-interval", alias = "rebuild_interval")]
    rebuild_interval: Option<String>,
}

impl CliArgs {
    /// Apply all flags that were given as configuration overrides.
    pub fn set_overrides<T: BuilderState>(
        &self,
        config_builder: ConfigBuilder<T>,
    ) -> Result<ConfigBuilder<T>, ConfigError> {
        config_builder
            .set_override_option("gateway.url", self.gateway.clone())?
            .set_override_option("gateway.username", self.gw_username.clone())?
            .set_override_option("gateway.password", self.gw_password.clone())?
            .set_override_option("gateway.namespace", self.namespace.clone())?
            .set_override_option("gateway.asyncinvoke", self.async_invoke)?
            .set_override_option("gateway.callbackurl", self.async_callback_url.clone())?
            .set_override_option("broker.topic", self.topic.clone())?
            .set_override_option("broker.uri", self.broker.clone())?
            .set_override_option("broker.username", self.user.clone())?
            .set_override_option("broker.password", self.password.clone())?
            .set_override_option("broker.clientid", self.id.clone())?
            .set_override_option("broker.cleansession", self.clean)?
            .set_override_option("broker.qos", self.qos.map(i64::from))?
            .set_override_option("broker.trimchannelkey", self.trim_channel_key)?
            .set_override_option("routing.rebuildinterval", self.rebuild_interval.clone())
    }
}
