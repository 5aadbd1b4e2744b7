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


//! Parsing of application configuration.

mod broker_config;
mod cli_args;
mod dispatch_config;
mod gateway_config;
mod metrics_config;
mod routing_config;

use crate::util::DurationResolver;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use config::builder::BuilderState;
use config::builder::DefaultState;
use mqtt_connector_gw::ConnectorError;
use mqtt_connector_gw::ConnectorErrorKind;
use serde::Deserialize;

pub use self::broker_config::BrokerConfig;
pub use self::cli_args::CliArgs;
pub use self::dispatch_config::DispatchConfig;
pub use self::dispatch_config::OverflowPolicy;
pub use self::gateway_config::GatewayConfig;
pub use self::gateway_config::GatewayImplementation;
pub use self::metrics_config::MetricsConfig;
pub use self::routing_config::RoutingConfig;

/// Package version reported by Cargo at build time.
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Static trait for tracking implementations.
trait AppConfigDefaults {
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> Result<ConfigBuilder<T>, ConfigError>;
}

/**
Application configration root.

The application name defaults to the Rust package name, but can be overridden
with the environment variable `APP_NAME`.

Configuration will be loaded from

1. the file `{application name}.json` in the current working directory.
2. environment variable overrides in the form
   `{APPLICATION_NAME}_MODULE_CONFIGKEYWITHOUTSPACES`
3. command line flags (see [CliArgs]).
 */
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Configuration of the function gateway.
    pub gateway: GatewayConfig,
    /// Configuration of the MQTT broker connection.
    pub broker: BrokerConfig,
    /// Configuration of the topic to function routing table.
    pub routing: RoutingConfig,
    /// Configuration of message dispatching.
    pub dispatch: DispatchConfig,
    /// Configuration for the application's metrics collection.
    pub metrics: MetricsConfig,

    /// Lower case application name. Ignored when loading configuration.
    #[serde(skip_deserializing)]
    app_name: String,
    /// Values that were replaced by their defaults while loading.
    #[serde(skip_deserializing)]
    fallback_warnings: Vec<String>,
}

impl AppConfig {
    /// The application name defaults to the Rust package name, but can be
    /// overridden with the environment variable `APP_NAME`.
    fn read_app_name_lowercase(cargo_pkg_name: &str) -> String {
        std::env::var("APP_NAME")
            .map_err(|e| {
                log::debug!(
                    "Environment variable APP_NAME: {e:?} -> Default app name '{cargo_pkg_name}' will be used."
                );
            })
            .ok()
            .map(|value| value.to_lowercase())
            .unwrap_or(cargo_pkg_name.to_owned())
    }

    /// Lower case application name.
    pub fn app_name_lowercase(&self) -> &str {
        &self.app_name
    }

    /// SemVer application version derived fromt the Rust package version.
    pub fn app_version(&self) -> &'static str {
        CARGO_PKG_VERSION
    }

    /// Warnings for malformed values that were replaced by their defaults.
    ///
    /// Each warning is logged once when the configuration is loaded.
    pub fn fallback_warnings(&self) -> &[String] {
        &self.fallback_warnings
    }

    /** Creates a new instance pre-populated with defaults, an optional
    configurations file, environment variable overrides and command line
    overrides.

    Use `env!("CARGO_PKG_NAME")` as `cargo_pkg_name`.
    */
    pub fn new(cargo_pkg_name: &str, cli_args: &CliArgs) -> Result<Self, ConnectorError> {
        let app_name = Self::read_app_name_lowercase(cargo_pkg_name);
        let config_filename = app_name.to_owned() + ".json";
        let config_env_prefix = &app_name.to_uppercase();
        let conf_file = std::env::current_dir()
            .map_err(|e| {
                ConnectorErrorKind::Configuration
                    .error_with_msg(format!("Unable to determine working directory: {e}"))
            })?
            .join(config_filename);
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "Will load '{}' configuration if present.",
                conf_file.display()
            );
        }
        let config_builder = Self::defaults_builder()
            .and_then(|config_builder| {
                cli_args.set_overrides(
                    config_builder
                        .add_source(File::from(conf_file).required(false))
                        .add_source(
                            Environment::with_prefix(config_env_prefix)
                                .separator("_")
                                .list_separator(","),
                        ),
                )
            })
            .map_err(Self::config_error)?;
        let mut app_config = Self::from_builder(config_builder)?;
        app_config.app_name = app_name;
        log::info!("Running with configuration: {app_config:?}");
        Ok(app_config)
    }

    /// Configuration builder with the defaults of every section.
    pub(crate) fn defaults_builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let mut config_builder = Config::builder();
        config_builder = GatewayConfig::set_defaults(config_builder, "gateway")?;
        config_builder = BrokerConfig::set_defaults(config_builder, "broker")?;
        config_builder = RoutingConfig::set_defaults(config_builder, "routing")?;
        config_builder = DispatchConfig::set_defaults(config_builder, "dispatch")?;
        config_builder = MetricsConfig::set_defaults(config_builder, "metrics")?;
        Ok(config_builder)
    }

    /// Build, deserialize, resolve durations and validate.
    pub(crate) fn from_builder(config_builder: ConfigBuilder<DefaultState>) -> Result<Self, ConnectorError> {
        let mut app_config: AppConfig = config_builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(Self::config_error)?;
        app_config.resolve_durations();
        app_config.validate()?;
        Ok(app_config)
    }

    /// Parse every duration setting once and log replaced values.
    fn resolve_durations(&mut self) {
        let mut resolver = DurationResolver::default();
        self.gateway.resolve_durations(&mut resolver);
        self.broker.resolve_durations(&mut resolver);
        self.routing.resolve_durations(&mut resolver);
        self.dispatch.resolve_durations(&mut resolver);
        self.metrics.resolve_durations(&mut resolver);
        for warning in resolver.warnings() {
            log::warn!("{warning}");
        }
        self.fallback_warnings = resolver.into_warnings();
    }

    fn config_error(e: ConfigError) -> ConnectorError {
        ConnectorErrorKind::Configuration.error_with_msg(format!("Unable to load configuration: {e}"))
    }

    /// Reject configuration that the connector can't run with.
    fn validate(&self) -> Result<(), ConnectorError> {
        if self.gateway.implementation()? == GatewayImplementation::Http
            && self.gateway.url().is_empty()
        {
            return Err(ConnectorErrorKind::Configuration.error_with_msg(
                "A value must be set for env 'gateway_url' or via the --gateway flag for the function gateway.",
            ));
        }
        if self.broker.topic().is_empty() {
            return Err(ConnectorErrorKind::Configuration
                .error_with_msg("A topic must be set via the --topic flag."));
        }
        self.broker.qos()?;
        self.dispatch.overflow_policy()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;

    /// Configuration from command line flags and defaults only.
    pub(crate) fn build(args: &[&str]) -> Result<AppConfig, ConnectorError> {
        let cli_args = CliArgs::try_parse_from(args).unwrap();
        let config_builder = cli_args.set_overrides(AppConfig::defaults_builder().unwrap());
        AppConfig::from_builder(config_builder.unwrap())
    }

    #[test]
    fn test_defaults_with_required_flags() {
        let app_config = build(&[
            "mqtt-connector",
            "--gateway",
            "http://gateway:8080",
            "--topic",
            "sensors/#",
        ])
        .unwrap();
        assert_eq!(app_config.gateway.url(), "http://gateway:8080");
        assert_eq!(app_config.gateway.namespace(), None);
        assert_eq!(app_config.broker.topic(), "sensors/#");
        assert_eq!(app_config.broker.uri(), "tcp://iot.eclipse.org:1883");
        assert_eq!(app_config.broker.client_id(), "testgoid");
        assert_eq!(app_config.broker.qos().unwrap(), rumqttc::QoS::AtMostOnce);
        assert!(!app_config.broker.clean_session());
        assert!(!app_config.broker.trim_channel_key());
        assert_eq!(app_config.routing.rebuild_interval(), Duration::from_secs(10));
        assert_eq!(app_config.routing.topic_delimiter(), ",");
        assert_eq!(app_config.dispatch.queue_capacity(), 256);
        assert_eq!(
            app_config.dispatch.overflow_policy().unwrap(),
            OverflowPolicy::Block
        );
        assert!(!app_config.gateway.async_invoke());
        assert!(app_config.metrics.enabled());
    }

    #[test]
    fn test_flag_overrides() {
        let app_config = build(&[
            "mqtt-connector",
            "--gateway",
            "http://gateway:8080",
            "--namespace",
            "openfaas-fn",
            "--topic",
            "device/#",
            "--broker",
            "tcp://localhost:1883",
            "--id",
            "connector-1",
            "--qos",
            "2",
            "--clean",
            "--trim-channel-key",
            "--async-invoke",
            "--async-callback-url",
            "http://callback:8080",
            "--rebuild-interval",
            "30s",
        ])
        .unwrap();
        assert_eq!(app_config.gateway.namespace(), Some("openfaas-fn"));
        assert_eq!(app_config.broker.uri(), "tcp://localhost:1883");
        assert_eq!(app_config.broker.client_id(), "connector-1");
        assert_eq!(app_config.broker.qos().unwrap(), rumqttc::QoS::ExactlyOnce);
        assert!(app_config.broker.clean_session());
        assert!(app_config.broker.trim_channel_key());
        assert!(app_config.gateway.async_invoke());
        assert_eq!(
            app_config.gateway.callback_url(),
            Some("http://callback:8080")
        );
        assert_eq!(app_config.routing.rebuild_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_rebuild_interval_falls_back() {
        let app_config = build(&[
            "mqtt-connector",
            "--gateway",
            "http://gateway:8080",
            "--topic",
            "t",
            "--rebuild_interval",
            "abc",
        ])
        .unwrap();
        assert_eq!(app_config.routing.rebuild_interval(), Duration::from_secs(10));
        // Repeated reads reuse the resolved value without warning again.
        assert_eq!(app_config.routing.rebuild_interval(), Duration::from_secs(10));
        assert_eq!(
            app_config.fallback_warnings(),
            ["Invalid rebuild interval 'abc' (expected number at 0). Using default 10s."]
        );
    }

    #[test]
    fn test_valid_durations_without_warnings() {
        let app_config = build(&[
            "mqtt-connector",
            "--gateway",
            "http://gateway:8080",
            "--topic",
            "t",
        ])
        .unwrap();
        assert!(app_config.fallback_warnings().is_empty());
        assert_eq!(app_config.gateway.timeout(), Duration::from_secs(60));
        assert_eq!(app_config.broker.keep_alive(), Duration::from_secs(30));
        assert_eq!(
            app_config.broker.disconnect_timeout(),
            Duration::from_millis(1250)
        );
        assert_eq!(app_config.dispatch.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(app_config.metrics.log_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_new_from_cli_args() {
        let cli_args = CliArgs::try_parse_from([
            "mqtt-connector",
            "--gateway",
            "http://gateway:8080",
            "--topic",
            "t",
        ])
        .unwrap();
        let app_config = AppConfig::new("mqtt-connector", &cli_args).unwrap();
        assert!(!app_config.app_name_lowercase().is_empty());
        assert_eq!(app_config.app_version(), env!("CARGO_PKG_VERSION"));
        assert_eq!(app_config.broker.topic(), "t");
    }

    #[test]
    fn test_fatal_configuration() {
        let err = build(&["mqtt-connector", "--topic", "t"]).unwrap_err();
        assert_eq!(err.kind(), &ConnectorErrorKind::Configuration);
        let err = build(&["mqtt-connector", "--gateway", "http://gw:8080"]).unwrap_err();
        assert_eq!(err.kind(), &ConnectorErrorKind::Configuration);
        let err = build(&[
            "mqtt-connector",
            "--gateway",
            "http://gw:8080",
            "--topic",
            "t",
            "--qos",
            "3",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), &ConnectorErrorKind::Configuration);
    }
}
