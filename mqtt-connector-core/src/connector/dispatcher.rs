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


//! Single consumer dispatch loop.

use super::ConnectorMetrics;
use super::InvocationReporter;
use super::Message;
use super::RoutingTable;
use super::trim_channel_key;
use crate::util::ShutdownSignal;
use mqtt_connector_gw::Gateway;
use mqtt_connector_gw::model::InvocationRequest;
use std::sync::Arc;
use tokio::sync::mpsc;

/// How matched functions are invoked.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Drop the leading path segment of the topic before routing.
    pub trim_channel_key: bool,
    /// Invoke through the gateway's queue.
    pub async_invoke: bool,
    /// Where the gateway should deliver results of async invocations.
    pub callback_url: Option<String>,
    /// Dispatch already queued messages when shutting down.
    pub drain_on_shutdown: bool,
}

/** Drains the message queue in arrival order and invokes matched functions.

All functions matched by a single message are invoked concurrently. The next
message is not picked up until every invocation of the current one has been
reported.
*/
pub struct Dispatcher {
    routing_table: Arc<RoutingTable>,
    gateway: Arc<dyn Gateway>,
    reporters: Vec<Arc<dyn InvocationReporter>>,
    metrics: Arc<ConnectorMetrics>,
    options: DispatchOptions,
}

impl Dispatcher {
    /// Return a new instance.
    pub fn new(
        routing_table: &Arc<RoutingTable>,
        gateway: &Arc<dyn Gateway>,
        reporters: Vec<Arc<dyn InvocationReporter>>,
        metrics: &Arc<ConnectorMetrics>,
        options: DispatchOptions,
    ) -> Self {
        Self {
            routing_table: Arc::clone(routing_table),
            gateway: Arc::clone(gateway),
            reporters,
            metrics: Arc::clone(metrics),
            options,
        }
    }

    /// Dispatch messages until shutdown is signaled or all senders are gone.
    pub async fn run(&self, mut receiver: mpsc::Receiver<Message>, shutdown: Arc<ShutdownSignal>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait_for_signal() => break,
                message = receiver.recv() => match message {
                    Some(message) => {
                        self.dispatch(message).await;
                    }
                    None => {
                        log::debug!("Message queue closed.");
                        return;
                    }
                },
            }
        }
        if self.options.drain_on_shutdown {
            receiver.close();
            let mut drained = 0usize;
            while let Some(message) = receiver.recv().await {
                self.dispatch(message).await;
                drained += 1;
            }
            log::info!("Dispatched {drained} queued messages during shutdown.");
        } else {
            log::info!(
                "Abandoned {} queued messages during shutdown.",
                receiver.len()
            );
        }
    }

    /// Route a single message and invoke every matched function.
    ///
    /// Return the number of invocations made.
    pub async fn dispatch(&self, message: Message) -> usize {
        self.metrics.inc_received();
        let topic = if self.options.trim_channel_key {
            if log::log_enabled!(log::Level::Trace) {
                log::trace!("Topic before trim: {}", message.topic());
            }
            trim_channel_key(message.topic())
        } else {
            message.topic()
        };
        let functions = self.routing_table.lookup(topic);
        if functions.is_empty() {
            if log::log_enabled!(log::Level::Trace) {
                log::trace!("No functions consume topic '{topic}'.");
            }
            return 0;
        }
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "Invoking {functions:?} on topic: {topic:?}, value: {:?}",
                String::from_utf8_lossy(message.payload())
            );
        }
        let invocations = functions.iter().map(|function| {
            let request = InvocationRequest::new(function, topic, message.payload().clone())
                .with_async(self.options.async_invoke, self.options.callback_url.as_deref());
            self.gateway.invoke(request)
        });
        let responses = futures::future::join_all(invocations).await;
        for response in &responses {
            self.metrics
                .inc_invocation(response.topic(), response.is_failure());
            for reporter in &self.reporters {
                reporter.handle(response);
            }
        }
        responses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mqtt_connector_gw::model::InvocationResponse;
    use mqtt_connector_gw_mem::MemoryGateway;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Collects every reported response.
    #[derive(Default)]
    struct CollectingReporter {
        responses: Mutex<Vec<InvocationResponse>>,
    }

    impl InvocationReporter for CollectingReporter {
        fn handle(&self, response: &InvocationResponse) {
            self.responses.lock().unwrap().push(response.clone());
        }
    }

    impl CollectingReporter {
        fn functions(&self) -> Vec<String> {
            self.responses
                .lock()
                .unwrap()
                .iter()
                .map(|res| res.function().to_owned())
                .collect()
        }
    }

    struct Fixture {
        gw: Arc<MemoryGateway>,
        reporter: Arc<CollectingReporter>,
        metrics: Arc<ConnectorMetrics>,
        dispatcher: Dispatcher,
    }

    async fn fixture(functions: &[(&str, &str)], options: DispatchOptions) -> Fixture {
        let gw = MemoryGateway::new(",");
        for (name, topic_annotation) in functions {
            gw.register_function(name, None, topic_annotation);
        }
        let gateway = Arc::clone(&gw) as Arc<dyn Gateway>;
        let metrics = ConnectorMetrics::new();
        let routing_table =
            RoutingTable::new(&gateway, None, Duration::from_secs(10), &metrics);
        routing_table.rebuild().await.unwrap();
        let reporter = Arc::new(CollectingReporter::default());
        let dispatcher = Dispatcher::new(
            &routing_table,
            &gateway,
            vec![Arc::clone(&reporter) as Arc<dyn InvocationReporter>],
            &metrics,
            options,
        );
        Fixture {
            gw,
            reporter,
            metrics,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn test_single_match() {
        let f = fixture(&[("f1", "sensors/temp,sensors/humidity")], DispatchOptions::default()).await;
        let count = f
            .dispatcher
            .dispatch(Message::new("sensors/temp", Bytes::from_static(b"22.5")))
            .await;
        assert_eq!(count, 1);
        let invocations = f.gw.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].function(), "f1");
        assert_eq!(invocations[0].topic(), "sensors/temp");
        assert_eq!(invocations[0].body().as_ref(), b"22.5");
        assert!(!invocations[0].is_async());
        assert_eq!(f.reporter.functions(), vec!["f1"]);
    }

    #[tokio::test]
    async fn test_channel_key_trim() {
        let options = DispatchOptions {
            trim_channel_key: true,
            ..Default::default()
        };
        let f = fixture(&[("f1", "sensors/temp")], options).await;
        let count = f
            .dispatcher
            .dispatch(Message::new("device123/sensors/temp", Bytes::from_static(b"1")))
            .await;
        assert_eq!(count, 1);
        assert_eq!(f.gw.invocations()[0].topic(), "sensors/temp");
        // Topics without a channel key are routed as is.
        let f = fixture(&[("f2", "temp")], DispatchOptions { trim_channel_key: true, ..Default::default() }).await;
        assert_eq!(
            f.dispatcher
                .dispatch(Message::new("temp", Bytes::from_static(b"1")))
                .await,
            1
        );
        assert_eq!(f.metrics.received_total(), 1);
    }

    #[tokio::test]
    async fn test_no_match_is_silent() {
        let f = fixture(&[("f1", "a")], DispatchOptions::default()).await;
        let count = f
            .dispatcher
            .dispatch(Message::new("b", Bytes::from_static(b"x")))
            .await;
        assert_eq!(count, 0);
        assert_eq!(f.gw.invocation_count(), 0);
        assert!(f.reporter.functions().is_empty());
        assert_eq!(f.metrics.received_total(), 1);
    }

    #[tokio::test]
    async fn test_unrouted_topics_are_not_tracked() {
        let f = fixture(&[("f1", "a")], DispatchOptions::default()).await;
        for i in 0..100 {
            let topic = format!("devices/{i}/state");
            f.dispatcher
                .dispatch(Message::new(&topic, Bytes::from_static(b"x")))
                .await;
        }
        f.dispatcher
            .dispatch(Message::new("a", Bytes::from_static(b"x")))
            .await;
        assert_eq!(f.metrics.received_total(), 101);
        assert_eq!(f.metrics.tracked_topics(), 1);
        assert_eq!(f.metrics.invocations("a"), 1);
    }

    #[tokio::test]
    async fn test_fan_out_with_independent_failure() {
        let f = fixture(
            &[("f1", "t"), ("f2", "t"), ("f3", "t, other")],
            DispatchOptions::default(),
        )
        .await;
        f.gw.fail_function("f2");
        let count = f
            .dispatcher
            .dispatch(Message::new("t", Bytes::from_static(b"x")))
            .await;
        assert_eq!(count, 3);
        assert_eq!(f.gw.invocation_count(), 3);
        assert_eq!(f.reporter.functions(), vec!["f1", "f2", "f3"]);
        let responses = f.reporter.responses.lock().unwrap();
        assert!(responses[0].error().is_none());
        assert!(responses[1].error().is_some());
        assert!(responses[2].error().is_none());
        assert_eq!(f.metrics.invocations("t"), 3);
        assert_eq!(f.metrics.failed_invocations("t"), 1);
    }

    #[tokio::test]
    async fn test_async_invoke_with_callback() {
        let options = DispatchOptions {
            async_invoke: true,
            callback_url: Some("http://callback:8080/".to_owned()),
            ..Default::default()
        };
        let f = fixture(&[("f1", "t")], options).await;
        f.dispatcher
            .dispatch(Message::new("t", Bytes::from_static(b"x")))
            .await;
        let invocation = &f.gw.invocations()[0];
        assert!(invocation.is_async());
        assert_eq!(invocation.callback_url(), Some("http://callback:8080/"));
        assert_eq!(
            f.reporter.responses.lock().unwrap()[0].status(),
            202
        );
    }

    #[tokio::test]
    async fn test_run_preserves_arrival_order() {
        let f = fixture(&[("f1", "a,b")], DispatchOptions::default()).await;
        let (sender, receiver) = mpsc::channel(16);
        for (topic, payload) in [("a", "1"), ("b", "2"), ("a", "3"), ("c", "4"), ("b", "5")] {
            sender
                .send(Message::new(topic, Bytes::from(payload.to_owned())))
                .await
                .unwrap();
        }
        drop(sender);
        f.dispatcher.run(receiver, ShutdownSignal::new()).await;
        let bodies = f
            .gw
            .invocations()
            .iter()
            .map(|req| String::from_utf8_lossy(req.body()).to_string())
            .collect::<Vec<_>>();
        assert_eq!(bodies, vec!["1", "2", "3", "5"]);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let options = DispatchOptions {
            drain_on_shutdown: true,
            ..Default::default()
        };
        let f = fixture(&[("f1", "a")], options).await;
        let (sender, receiver) = mpsc::channel(16);
        for payload in ["1", "2", "3"] {
            sender
                .send(Message::new("a", Bytes::from(payload.to_owned())))
                .await
                .unwrap();
        }
        let shutdown = ShutdownSignal::new();
        shutdown.signal();
        tokio::time::timeout(Duration::from_secs(1), f.dispatcher.run(receiver, shutdown))
            .await
            .unwrap();
        assert_eq!(f.gw.invocation_count(), 3);
        // The queue no longer accepts messages.
        assert!(sender.send(Message::new("a", Bytes::new())).await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_abandons_queue() {
        let f = fixture(&[("f1", "a")], DispatchOptions::default()).await;
        let (sender, receiver) = mpsc::channel(16);
        sender
            .send(Message::new("a", Bytes::from_static(b"1")))
            .await
            .unwrap();
        let shutdown = ShutdownSignal::new();
        shutdown.signal();
        tokio::time::timeout(Duration::from_secs(1), f.dispatcher.run(receiver, shutdown))
            .await
            .unwrap();
        assert_eq!(f.gw.invocation_count(), 0);
    }
}
