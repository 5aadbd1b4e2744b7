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


//! MQTT broker connection feeding the dispatch queue.

use super::Message;
use super::MessageSender;
use crate::conf::BrokerConfig;
use crate::util::ShutdownSignal;
use mqtt_connector_gw::ConnectorError;
use mqtt_connector_gw::ConnectorErrorKind;
use rumqttc::AsyncClient;
use rumqttc::ConnectionError;
use rumqttc::Event;
use rumqttc::EventLoop;
use rumqttc::MqttOptions;
use rumqttc::Outgoing;
use rumqttc::Packet;
use rumqttc::Publish;
use rumqttc::QoS;
use rumqttc::SubscribeReasonCode;
use rumqttc::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Capacity of the client's request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 64;
/// Pause before polling again after a connection error.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Where and how to reach the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    host: String,
    port: u16,
    tls: bool,
}

impl BrokerAddress {
    /** Parse a broker URI like `tcp://10.10.1.1:1883`.

    Supported schemes are `tcp` and `mqtt` for plain connections and `ssl`,
    `tls` and `mqtts` for TLS. A missing scheme means `tcp` and a missing port
    means the default port of the scheme.
    */
    pub fn parse(uri: &str) -> Result<Self, ConnectorError> {
        let (scheme, authority) = uri.split_once("://").unwrap_or(("tcp", uri));
        let tls = match scheme.to_ascii_lowercase().as_str() {
            "tcp" | "mqtt" => false,
            "ssl" | "tls" | "mqtts" => true,
            _ => {
                return Err(ConnectorErrorKind::Configuration
                    .error_with_msg(format!("Unsupported broker URI scheme in '{uri}'.")));
            }
        };
        let authority = authority.trim_end_matches('/');
        let default_port = if tls { 8883 } else { 1883 };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|e| {
                    ConnectorErrorKind::Configuration
                        .error_with_msg(format!("Invalid port in broker URI '{uri}': {e}"))
                })?;
                (host, port)
            }
            None => (authority, default_port),
        };
        if host.is_empty() {
            return Err(ConnectorErrorKind::Configuration
                .error_with_msg(format!("Missing host in broker URI '{uri}'.")));
        }
        Ok(Self {
            host: host.to_owned(),
            port,
            tls,
        })
    }

    /// Broker host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Broker port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Return `true` if the connection should use TLS.
    pub fn is_tls(&self) -> bool {
        self.tls
    }
}

/// Client options derived from the broker configuration.
fn mqtt_options(broker_config: &BrokerConfig) -> Result<MqttOptions, ConnectorError> {
    let address = BrokerAddress::parse(broker_config.uri())?;
    if broker_config.client_id().is_empty() && !broker_config.clean_session() {
        return Err(ConnectorErrorKind::Configuration
            .error_with_msg("A client id is required unless a clean session is requested."));
    }
    let mut mqtt_options =
        MqttOptions::new(broker_config.client_id(), address.host(), address.port());
    mqtt_options
        .set_clean_session(broker_config.clean_session())
        .set_keep_alive(std::cmp::max(broker_config.keep_alive(), Duration::from_secs(1)));
    if let Some((username, password)) = broker_config.credentials() {
        mqtt_options.set_credentials(username, password);
    }
    if address.is_tls() {
        mqtt_options.set_transport(Transport::tls_with_default_config());
    }
    Ok(mqtt_options)
}

/** Subscription to a single topic filter on the broker.

A background task owns the client's event loop and forwards every received
publish to the dispatch queue until shutdown is signaled. The connection is
released on every exit path of that task.
*/
pub struct BrokerSubscription {
    pump: JoinHandle<()>,
}

impl BrokerSubscription {
    /// Connect, subscribe and start forwarding messages.
    ///
    /// Fails with a `Connection` error if the broker can't be reached,
    /// refuses the connection or shutdown is signaled before the handshake
    /// completes and with a `Subscription` error if the topic filter is
    /// rejected.
    ///
    /// Publishes received during the handshake are held back and forwarded
    /// once the subscription is running, so a full dispatch queue can't
    /// stall the handshake.
    pub async fn connect(
        broker_config: &BrokerConfig,
        sender: MessageSender,
        shutdown: &Arc<ShutdownSignal>,
    ) -> Result<Self, ConnectorError> {
        let qos = broker_config.qos()?;
        let topic = broker_config.topic().to_owned();
        let (client, mut eventloop) =
            AsyncClient::new(mqtt_options(broker_config)?, REQUEST_CHANNEL_CAPACITY);
        let mut held_back = Vec::new();
        Self::await_conn_ack(&mut eventloop, broker_config.uri(), &mut held_back, shutdown).await?;
        log::info!(
            "Connected to broker '{}' as '{}'.",
            broker_config.uri(),
            broker_config.client_id()
        );
        client.subscribe(&topic, qos).await.map_err(|e| {
            ConnectorErrorKind::Subscription
                .error_with_msg(format!("Unable to subscribe to '{topic}': {e}"))
        })?;
        Self::await_sub_ack(&mut eventloop, &topic, &mut held_back, shutdown).await?;
        log::info!("Subscribed to '{topic}' with {qos:?}.");
        if !held_back.is_empty() {
            log::debug!(
                "Forwarding {} message(s) received during the broker handshake.",
                held_back.len()
            );
        }
        let pump = tokio::spawn(Self::pump(
            client,
            eventloop,
            topic,
            qos,
            held_back,
            sender,
            Arc::clone(shutdown),
            broker_config.disconnect_timeout(),
        ));
        Ok(Self { pump })
    }

    /// Wait for the forwarding task to release the connection.
    pub async fn join(self) {
        if let Err(e) = self.pump.await {
            log::warn!("Broker subscription task failed: {e}");
        }
    }

    /// Poll the event loop during the handshake unless shutdown is signaled.
    async fn poll_handshake(
        eventloop: &mut EventLoop,
        shutdown: &ShutdownSignal,
    ) -> Result<Result<Event, ConnectionError>, ConnectorError> {
        tokio::select! {
            biased;
            _ = shutdown.wait_for_signal() => Err(ConnectorErrorKind::Connection
                .error_with_msg("Shutdown signaled during the broker handshake.")),
            event = eventloop.poll() => Ok(event),
        }
    }

    async fn await_conn_ack(
        eventloop: &mut EventLoop,
        uri: &str,
        held_back: &mut Vec<Message>,
        shutdown: &ShutdownSignal,
    ) -> Result<(), ConnectorError> {
        loop {
            match Self::poll_handshake(eventloop, shutdown).await? {
                Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    held_back.push(Self::as_message(publish));
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(ConnectorErrorKind::Connection
                        .error_with_msg(format!("Unable to connect to broker '{uri}': {e}")));
                }
            }
        }
    }

    async fn await_sub_ack(
        eventloop: &mut EventLoop,
        topic: &str,
        held_back: &mut Vec<Message>,
        shutdown: &ShutdownSignal,
    ) -> Result<(), ConnectorError> {
        loop {
            match Self::poll_handshake(eventloop, shutdown).await? {
                Ok(Event::Incoming(Packet::SubAck(sub_ack))) => {
                    if sub_ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        return Err(ConnectorErrorKind::Subscription
                            .error_with_msg(format!("Broker rejected subscription to '{topic}'.")));
                    }
                    return Ok(());
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    // Retained or queued session messages may arrive first.
                    held_back.push(Self::as_message(publish));
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(ConnectorErrorKind::Connection.error_with_msg(format!(
                        "Connection lost while subscribing to '{topic}': {e}"
                    )));
                }
            }
        }
    }

    /// Queue a message unless shutdown is signaled first.
    ///
    /// Return `false` if the message was not queued and forwarding should stop.
    async fn forward(sender: &MessageSender, message: Message, shutdown: &ShutdownSignal) -> bool {
        let enqueued = tokio::select! {
            _ = shutdown.wait_for_signal() => return false,
            enqueued = sender.enqueue(message) => enqueued,
        };
        if !enqueued {
            log::debug!("Dispatch queue closed. Stopping broker subscription.");
        }
        enqueued
    }

    fn as_message(publish: Publish) -> Message {
        Message::new(&publish.topic, publish.payload)
    }

    #[allow(clippy::too_many_arguments)]
    async fn pump(
        client: AsyncClient,
        mut eventloop: EventLoop,
        topic: String,
        qos: QoS,
        held_back: Vec<Message>,
        sender: MessageSender,
        shutdown: Arc<ShutdownSignal>,
        disconnect_timeout: Duration,
    ) {
        for message in held_back {
            if !Self::forward(&sender, message, &shutdown).await {
                Self::disconnect(&client, &mut eventloop, disconnect_timeout).await;
                return;
            }
        }
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.wait_for_signal() => break,
                event = eventloop.poll() => event,
            };
            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if !Self::forward(&sender, Self::as_message(publish), &shutdown).await {
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(conn_ack))) => {
                    log::info!("Reconnected to broker.");
                    if !conn_ack.session_present {
                        if let Err(e) = client.try_subscribe(&topic, qos) {
                            log::warn!("Unable to renew subscription to '{topic}': {e}");
                        }
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(sub_ack))) => {
                    if sub_ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        log::warn!("Broker rejected renewed subscription to '{topic}'.");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!(
                        "Broker connection error: {e}. Retrying in {} ms.",
                        RECONNECT_BACKOFF.as_millis()
                    );
                    tokio::select! {
                        _ = shutdown.wait_for_signal() => break,
                        _ = tokio::time::sleep(RECONNECT_BACKOFF) => {},
                    }
                }
            }
        }
        Self::disconnect(&client, &mut eventloop, disconnect_timeout).await;
    }

    /// Best effort orderly disconnect within `timeout`.
    async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop, timeout: Duration) {
        if let Err(e) = client.try_disconnect() {
            log::debug!("Unable to request disconnect: {e}");
            return;
        }
        let flush = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        log::debug!("Connection closed during disconnect: {e}");
                        break;
                    }
                }
            }
        };
        if tokio::time::timeout(timeout, flush).await.is_err() {
            log::info!(
                "Broker disconnect did not complete within {} ms.",
                timeout.as_millis()
            );
        } else {
            log::info!("Disconnected from broker.");
        }
    }
}
