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


//! Parsing of configuration for the MQTT broker connection.

use super::AppConfigDefaults;
use crate::util::DurationResolver;
use config::ConfigBuilder;
use config::ConfigError;
use config::builder::BuilderState;
use mqtt_connector_gw::ConnectorError;
use mqtt_connector_gw::ConnectorErrorKind;
use rumqttc::QoS;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the MQTT broker connection.
#[derive(Deserialize)]
pub struct BrokerConfig {
    /// Broker URI like `tcp://10.10.1.1:1883`.
    uri: String,
    /// Topic filter to subscribe to.
    topic: String,
    /// MQTT client identifier.
    clientid: String,
    /// Optional MQTT username.
    username: String,
    /// Optional MQTT password.
    password: String,
    /// Start without any previous session state.
    cleansession: bool,
    /// Quality of service level of the subscription.
    qos: u8,
    /// MQTT keep-alive interval.
    keepalive: String,
    /// Drop the leading path segment of received topics before routing.
    trimchannelkey: bool,
    /// Time allowed for an orderly disconnect.
    disconnecttimeout: String,
    /// Resolved from `keepalive`.
    #[serde(skip)]
    keep_alive: Duration,
    /// Resolved from `disconnecttimeout`.
    #[serde(skip)]
    disconnect_timeout: Duration,
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("uri", &self.uri)
            .field("topic", &self.topic)
            .field("clientid", &self.clientid)
            .field("username", &self.username)
            .field("password", &"*redacted*")
            .field("cleansession", &self.cleansession)
            .field("qos", &self.qos)
            .field("keepalive", &self.keepalive)
            .field("trimchannelkey", &self.trimchannelkey)
            .field("disconnecttimeout", &self.disconnecttimeout)
            .finish()
    }
}

impl AppConfigDefaults for BrokerConfig {
    /// Provide defaults for this part of the configuration
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> Result<ConfigBuilder<T>, ConfigError> {
        config_builder
            .set_default(prefix.to_string() + "." + "uri", "tcp://iot.eclipse.org:1883")?
            .set_default(prefix.to_string() + "." + "topic", "")?
            .set_default(prefix.to_string() + "." + "clientid", "testgoid")?
            .set_default(prefix.to_string() + "." + "username", "")?
            .set_default(prefix.to_string() + "." + "password", "")?
            .set_default(prefix.to_string() + "." + "cleansession", "false")?
            .set_default(prefix.to_string() + "." + "qos", "0")?
            .set_default(prefix.to_string() + "." + "keepalive", "30s")?
            .set_default(prefix.to_string() + "." + "trimchannelkey", "false")?
            .set_default(prefix.to_string() + "." + "disconnecttimeout", "1250ms")
    }
}

impl BrokerConfig {
    const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);
    const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_millis(1250);

    pub(super) fn resolve_durations(&mut self, resolver: &mut DurationResolver) {
        self.keep_alive =
            resolver.resolve(&self.keepalive, Self::DEFAULT_KEEP_ALIVE, "broker keep-alive");
        self.disconnect_timeout = resolver.resolve(
            &self.disconnecttimeout,
            Self::DEFAULT_DISCONNECT_TIMEOUT,
            "broker disconnect timeout",
        );
    }

    /// Broker URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Topic filter to subscribe to. May contain the `+` and `#` wildcards.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// MQTT client identifier.
    pub fn client_id(&self) -> &str {
        &self.clientid
    }

    /// MQTT credentials `(username, password)` when a username is set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        (!self.username.is_empty()).then_some((self.username.as_str(), self.password.as_str()))
    }

    /// Return `true` if the broker should discard previous session state.
    pub fn clean_session(&self) -> bool {
        self.cleansession
    }

    /// Quality of service level of the subscription.
    pub fn qos(&self) -> Result<QoS, ConnectorError> {
        match self.qos {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            qos => Err(ConnectorErrorKind::Configuration
                .error_with_msg(format!("Invalid QoS {qos}. Must be 0, 1 or 2."))),
        }
    }

    /// MQTT keep-alive interval. Defaults to 30 seconds.
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Return `true` if the leading path segment of received topics should be
    /// dropped before routing.
    pub fn trim_channel_key(&self) -> bool {
        self.trimchannelkey
    }

    /// Time allowed for an orderly disconnect. Defaults to 1250 ms.
    pub fn disconnect_timeout(&self) -> Duration {
        self.disconnect_timeout
    }
}
