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


//! Wiring of the broker subscription, routing table and dispatcher.

mod broker_subscription;
mod connector_metrics;
mod dispatcher;
mod invocation_reporter;
mod message;
mod message_queue;
mod routing_table;

pub use self::broker_subscription::BrokerAddress;
pub use self::broker_subscription::BrokerSubscription;
pub use self::connector_metrics::ConnectorMetrics;
pub use self::dispatcher::DispatchOptions;
pub use self::dispatcher::Dispatcher;
pub use self::invocation_reporter::InvocationReporter;
pub use self::invocation_reporter::LogReporter;
pub use self::message::Message;
pub use self::message::trim_channel_key;
pub use self::message_queue::MessageSender;
pub use self::routing_table::RoutingTable;
pub use self::routing_table::TopicMap;
use crate::conf::AppConfig;
use crate::conf::GatewayImplementation;
use crate::util::ShutdownSignal;
use mqtt_connector_gw::ConnectorError;
use mqtt_connector_gw::Gateway;
use mqtt_connector_gw_http::BasicAuthCredentials;
use mqtt_connector_gw_http::CredentialsCache;
use mqtt_connector_gw_http::HttpGateway;
use mqtt_connector_gw_mem::MemoryGateway;
use std::sync::Arc;

/** Connector context.

Owns everything a running connector needs and is passed around explicitly.
Call [Connector::run] to subscribe and dispatch until [ShutdownSignal] is
raised through [Connector::shutdown_signal].
*/
pub struct Connector {
    app_config: Arc<AppConfig>,
    gateway: Arc<dyn Gateway>,
    reporters: Vec<Arc<dyn InvocationReporter>>,
    metrics: Arc<ConnectorMetrics>,
    shutdown: Arc<ShutdownSignal>,
}

impl Connector {
    /// Return a new instance with the configured gateway implementation.
    pub async fn new(app_config: &Arc<AppConfig>) -> Result<Self, ConnectorError> {
        let gateway_config = &app_config.gateway;
        let gateway: Arc<dyn Gateway> = match gateway_config.implementation()? {
            GatewayImplementation::Http => {
                let explicit = gateway_config
                    .credentials()
                    .map(|(user, password)| BasicAuthCredentials::new(user, password));
                let credentials_cache = CredentialsCache::new(explicit).await;
                HttpGateway::new(
                    gateway_config.url(),
                    app_config.app_name_lowercase(),
                    app_config.app_version(),
                    &credentials_cache,
                    app_config.routing.topic_delimiter(),
                    gateway_config.content_type(),
                    gateway_config.timeout(),
                )? as Arc<dyn Gateway>
            }
            GatewayImplementation::Mem => {
                log::warn!("Using in-memory gateway. No functions will be invoked over HTTP.");
                MemoryGateway::new(app_config.routing.topic_delimiter()) as Arc<dyn Gateway>
            }
        };
        Ok(Self::with_gateway(app_config, gateway))
    }

    /// Return a new instance that uses the provided gateway.
    pub fn with_gateway(app_config: &Arc<AppConfig>, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            app_config: Arc::clone(app_config),
            gateway,
            reporters: Vec::new(),
            metrics: ConnectorMetrics::new(),
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Add a consumer of invocation outcomes.
    ///
    /// When none is registered, outcomes are logged by a [LogReporter].
    pub fn register_reporter(&mut self, reporter: Arc<dyn InvocationReporter>) {
        self.reporters.push(reporter);
    }

    /// Raise this signal to stop a running connector.
    pub fn shutdown_signal(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.shutdown)
    }

    /// Counters of the connector.
    pub fn metrics(&self) -> &Arc<ConnectorMetrics> {
        &self.metrics
    }

    /// Subscribe and dispatch messages until shutdown is signaled.
    ///
    /// Fails if the broker connection or subscription could not be
    /// established.
    pub async fn run(self) -> Result<(), ConnectorError> {
        let app_config = &self.app_config;
        let overflow_policy = app_config.dispatch.overflow_policy()?;
        let routing_table = RoutingTable::new(
            &self.gateway,
            app_config.gateway.namespace(),
            app_config.routing.rebuild_interval(),
            &self.metrics,
        );
        let rebuild_loop = routing_table.spawn_rebuild_loop(&self.shutdown);
        let metrics_logger = app_config.metrics.enabled().then(|| {
            self.metrics
                .spawn_summary_logger(app_config.metrics.log_interval(), &self.shutdown)
        });
        let (sender, receiver) = MessageSender::bounded(
            app_config.dispatch.queue_capacity(),
            overflow_policy,
            &self.metrics,
        );
        let subscription =
            match BrokerSubscription::connect(&app_config.broker, sender, &self.shutdown).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    self.shutdown.signal();
                    let _ = rebuild_loop.await;
                    if let Some(metrics_logger) = metrics_logger {
                        let _ = metrics_logger.await;
                    }
                    return Err(e);
                }
            };
        let reporters = if self.reporters.is_empty() {
            vec![Arc::new(LogReporter::new(
                app_config.dispatch.print_response(),
                app_config.dispatch.print_response_body(),
            )) as Arc<dyn InvocationReporter>]
        } else {
            self.reporters
        };
        let dispatcher = Dispatcher::new(
            &routing_table,
            &self.gateway,
            reporters,
            &self.metrics,
            DispatchOptions {
                trim_channel_key: app_config.broker.trim_channel_key(),
                async_invoke: app_config.gateway.async_invoke(),
                callback_url: app_config.gateway.callback_url().map(str::to_owned),
                drain_on_shutdown: app_config.dispatch.drain_on_shutdown(),
            },
        );
        let shutdown = Arc::clone(&self.shutdown);
        let dispatch_loop = tokio::spawn(async move { dispatcher.run(receiver, shutdown).await });
        self.shutdown.wait_for_signal().await;
        let shutdown_timeout = app_config.dispatch.shutdown_timeout();
        log::info!(
            "Shutting down. Waiting up to {} ms for tasks to finish.",
            shutdown_timeout.as_millis()
        );
        let all_done = async {
            subscription.join().await;
            if let Err(e) = dispatch_loop.await {
                log::warn!("Dispatch task failed: {e}");
            }
            let _ = rebuild_loop.await;
            if let Some(metrics_logger) = metrics_logger {
                let _ = metrics_logger.await;
            }
        };
        if tokio::time::timeout(shutdown_timeout, all_done).await.is_err() {
            log::warn!("Tasks did not finish within the shutdown timeout.");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::ConfigError;
    use mqtt_connector_gw::ConnectorErrorKind;
    use std::time::Duration;

    fn app_config(overrides: &[(&str, &str)]) -> Arc<AppConfig> {
        let config_builder = overrides.iter().try_fold(
            AppConfig::defaults_builder().unwrap(),
            |config_builder, (key, value)| {
                Ok::<_, ConfigError>(config_builder.set_override(*key, *value)?)
            },
        );
        Arc::new(AppConfig::from_builder(config_builder.unwrap()).unwrap())
    }

    #[tokio::test]
    async fn test_mem_gateway_selection() {
        let app_config = app_config(&[
            ("gateway.implementation", "mem"),
            ("broker.topic", "sensors/#"),
        ]);
        let connector = Connector::new(&app_config).await.unwrap();
        assert!(connector.gateway.list_functions(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broker_connection_failure_is_fatal() {
        let _ = env_logger::builder().is_test(true).try_init();
        let app_config = app_config(&[
            ("gateway.implementation", "mem"),
            ("broker.topic", "sensors/#"),
            ("broker.uri", "tcp://127.0.0.1:9"),
        ]);
        let connector = Connector::with_gateway(&app_config, MemoryGateway::new(","));
        let shutdown = connector.shutdown_signal();
        let result = tokio::time::timeout(Duration::from_secs(10), connector.run())
            .await
            .unwrap();
        assert_eq!(result.unwrap_err().kind(), &ConnectorErrorKind::Connection);
        assert!(shutdown.is_signaled());
    }
}
