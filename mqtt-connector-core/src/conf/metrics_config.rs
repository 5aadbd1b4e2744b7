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


//! Parsing of configuration for the application's metrics.

use super::AppConfigDefaults;
use crate::util::DurationResolver;
use config::ConfigBuilder;
use config::ConfigError;
use config::builder::BuilderState;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the application's metrics collection.
#[derive(Debug, Deserialize)]
pub struct MetricsConfig {
    /// See [Self::enabled()].
    enabled: bool,
    /// See [Self::log_interval()].
    loginterval: String,
    /// Resolved from `loginterval`.
    #[serde(skip)]
    log_interval: Duration,
}

impl AppConfigDefaults for MetricsConfig {
    /// Provide defaults for this part of the configuration
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> Result<ConfigBuilder<T>, ConfigError> {
        config_builder
            .set_default(prefix.to_string() + "." + "enabled", "true")?
            .set_default(prefix.to_string() + "." + "loginterval", "60s")
    }
}

impl MetricsConfig {
    const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(60);

    pub(super) fn resolve_durations(&mut self, resolver: &mut DurationResolver) {
        self.log_interval = resolver.resolve(
            &self.loginterval,
            Self::DEFAULT_LOG_INTERVAL,
            "metrics log interval",
        );
    }

    /// Return `true` if a metrics summary should be logged periodically.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Interval between metrics summaries. Defaults to 60 seconds.
    pub fn log_interval(&self) -> Duration {
        self.log_interval
    }
}
