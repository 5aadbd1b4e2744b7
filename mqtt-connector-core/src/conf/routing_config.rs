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


//! Parsing of configuration for the routing table.

use super::AppConfigDefaults;
use crate::util::DurationResolver;
use config::ConfigBuilder;
use config::ConfigError;
use config::builder::BuilderState;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the topic to function routing table.
#[derive(Debug, Deserialize)]
pub struct RoutingConfig {
    /// See [Self::rebuild_interval()].
    rebuildinterval: String,
    /// See [Self::topic_delimiter()].
    topicdelimiter: String,
    /// Resolved from `rebuildinterval`.
    #[serde(skip)]
    rebuild_interval: Duration,
}

impl AppConfigDefaults for RoutingConfig {
    /// Provide defaults for this part of the configuration
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> Result<ConfigBuilder<T>, ConfigError> {
        config_builder
            .set_default(prefix.to_string() + "." + "rebuildinterval", "10s")?
            .set_default(prefix.to_string() + "." + "topicdelimiter", ",")
    }
}

impl RoutingConfig {
    pub(super) fn resolve_durations(&mut self, resolver: &mut DurationResolver) {
        self.rebuild_interval = resolver.resolve(
            &self.rebuildinterval,
            Self::DEFAULT_REBUILD_INTERVAL,
            "rebuild interval",
        );
    }

    /// Used when the configured interval is malformed or not positive.
    pub const DEFAULT_REBUILD_INTERVAL: Duration = Duration::from_secs(10);

    /// Interval between rebuilds of the topic to function map.
    ///
    /// Malformed values fall back to 10 seconds with a warning.
    pub fn rebuild_interval(&self) -> Duration {
        self.rebuild_interval
    }

    /// Delimiter between topics in a function's topic annotation.
    pub fn topic_delimiter(&self) -> &str {
        &self.topicdelimiter
    }
}
