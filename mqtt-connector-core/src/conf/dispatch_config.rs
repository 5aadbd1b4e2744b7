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


//! Parsing of configuration for message dispatching.

use super::AppConfigDefaults;
use crate::util::DurationResolver;
use config::ConfigBuilder;
use config::ConfigError;
use config::builder::BuilderState;
use mqtt_connector_gw::ConnectorError;
use mqtt_connector_gw::ConnectorErrorKind;
use serde::Deserialize;
use std::time::Duration;

/// What to do with a received message when the dispatch queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wait for free capacity. This stops reading from the broker.
    Block,
    /// Discard the received message.
    Drop,
}

/// Configuration of message dispatching.
#[derive(Debug, Deserialize)]
pub struct DispatchConfig {
    /// Capacity of the queue between the broker and the dispatcher.
    queuecapacity: usize,
    /// `block` or `drop`.
    overflowpolicy: String,
    /// Dispatch already queued messages during shutdown.
    drainonshutdown: bool,
    /// Upper bound for the whole shutdown sequence.
    shutdowntimeout: String,
    /// Log the outcome of every invocation.
    printresponse: bool,
    /// Include the response body when logging the outcome.
    printresponsebody: bool,
    /// Resolved from `shutdowntimeout`.
    #[serde(skip)]
    shutdown_timeout: Duration,
}

impl AppConfigDefaults for DispatchConfig {
    /// Provide defaults for this part of the configuration
    fn set_defaults<T: BuilderState>(
        config_builder: ConfigBuilder<T>,
        prefix: &str,
    ) -> Result<ConfigBuilder<T>, ConfigError> {
        config_builder
            .set_default(prefix.to_string() + "." + "queuecapacity", "256")?
            .set_default(prefix.to_string() + "." + "overflowpolicy", "block")?
            .set_default(prefix.to_string() + "." + "drainonshutdown", "true")?
            .set_default(prefix.to_string() + "." + "shutdowntimeout", "5s")?
            .set_default(prefix.to_string() + "." + "printresponse", "true")?
            .set_default(prefix.to_string() + "." + "printresponsebody", "true")
    }
}

impl DispatchConfig {
    const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

    pub(super) fn resolve_durations(&mut self, resolver: &mut DurationResolver) {
        self.shutdown_timeout = resolver.resolve(
            &self.shutdowntimeout,
            Self::DEFAULT_SHUTDOWN_TIMEOUT,
            "shutdown timeout",
        );
    }

    /// Capacity of the queue between the broker and the dispatcher. At least
    /// `1`.
    pub fn queue_capacity(&self) -> usize {
        std::cmp::max(1, self.queuecapacity)
    }

    /// What to do when the queue is full.
    pub fn overflow_policy(&self) -> Result<OverflowPolicy, ConnectorError> {
        match self.overflowpolicy.to_lowercase().as_str() {
            "block" => Ok(OverflowPolicy::Block),
            "drop" => Ok(OverflowPolicy::Drop),
            unknown => Err(ConnectorErrorKind::Configuration.error_with_msg(format!(
                "Unknown overflow policy '{unknown}'. Use 'block' or 'drop'."
            ))),
        }
    }

    /// Return `true` if queued messages should still be dispatched during
    /// shutdown.
    pub fn drain_on_shutdown(&self) -> bool {
        self.drainonshutdown
    }

    /// Upper bound for the whole shutdown sequence. Defaults to 5 seconds.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Return `true` if the outcome of every invocation should be logged.
    pub fn print_response(&self) -> bool {
        self.printresponse
    }

    /// Return `true` if response bodies should be logged.
    pub fn print_response_body(&self) -> bool {
        self.printresponsebody
    }
}
