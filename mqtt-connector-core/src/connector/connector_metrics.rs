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


//! Provide metrics for the [super::Connector].

use crate::util::ShutdownSignal;
use crossbeam_skiplist::SkipMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::task::JoinHandle;

/** Counters of the connector's message flow.

Received and dropped messages are plain totals since the subscribed topic
filter may match any number of topics. Invocations are tracked per routed
topic, which is bounded by the routing table.
*/
#[derive(Default)]
pub struct ConnectorMetrics {
    received_messages: AtomicU64,
    dropped_messages: AtomicU64,
    invocations: SkipMap<String, AtomicU64>,
    failed_invocations: SkipMap<String, AtomicU64>,
    rebuilds_ok: AtomicU64,
    rebuilds_failed: AtomicU64,
    routed_topics: AtomicU64,
}

impl ConnectorMetrics {
    /// Return a new instance.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Increase counter for a received message.
    pub fn inc_received(&self) {
        self.received_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Increase counter for a message discarded because the dispatch queue
    /// was full.
    pub fn inc_dropped(&self) {
        self.dropped_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Track the outcome of a single invocation for a routed topic.
    pub fn inc_invocation(&self, topic: &str, failed: bool) {
        Self::inc_by_topic(&self.invocations, topic);
        if failed {
            Self::inc_by_topic(&self.failed_invocations, topic);
        }
    }

    /// Track the outcome of a routing table rebuild.
    pub fn report_rebuild(&self, routed_topics: Option<usize>) {
        if let Some(routed_topics) = routed_topics {
            self.rebuilds_ok.fetch_add(1, Ordering::Relaxed);
            self.routed_topics.store(
                u64::try_from(routed_topics).unwrap_or_default(),
                Ordering::Relaxed,
            );
        } else {
            self.rebuilds_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn inc_by_topic(map: &SkipMap<String, AtomicU64>, topic: &str) {
        // Note: Only alloc String when entry is missing during first check.
        map.get(topic)
            .unwrap_or_else(|| map.get_or_insert_with(topic.to_string(), AtomicU64::default))
            .value()
            .fetch_add(1, Ordering::Relaxed);
    }

    fn by_topic(map: &SkipMap<String, AtomicU64>, topic: &str) -> u64 {
        map.get(topic)
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .unwrap_or_default()
    }

    fn total(map: &SkipMap<String, AtomicU64>) -> u64 {
        map.iter()
            .map(|entry| entry.value().load(Ordering::Relaxed))
            .sum()
    }

    /// Messages received on all topics.
    pub fn received_total(&self) -> u64 {
        self.received_messages.load(Ordering::Relaxed)
    }

    /// Messages dropped on all topics.
    pub fn dropped_total(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Number of topics with per topic counters.
    pub fn tracked_topics(&self) -> usize {
        self.invocations.len()
    }

    /// Invocations triggered by messages on `topic`.
    pub fn invocations(&self, topic: &str) -> u64 {
        Self::by_topic(&self.invocations, topic)
    }

    /// Failed invocations triggered by messages on `topic`.
    pub fn failed_invocations(&self, topic: &str) -> u64 {
        Self::by_topic(&self.failed_invocations, topic)
    }

    /// Successful and failed routing table rebuilds.
    pub fn rebuilds(&self) -> (u64, u64) {
        (
            self.rebuilds_ok.load(Ordering::Relaxed),
            self.rebuilds_failed.load(Ordering::Relaxed),
        )
    }

    /// Number of topics in the latest routing table.
    pub fn routed_topics(&self) -> u64 {
        self.routed_topics.load(Ordering::Relaxed)
    }

    /// One line summary of all counters.
    pub fn summary(&self) -> String {
        let (rebuilds_ok, rebuilds_failed) = self.rebuilds();
        format!(
            "received={} dropped={} invocations={} failed={} routed_topics={} rebuilds_ok={} rebuilds_failed={}",
            self.received_total(),
            self.dropped_total(),
            Self::total(&self.invocations),
            Self::total(&self.failed_invocations),
            self.routed_topics(),
            rebuilds_ok,
            rebuilds_failed,
        )
    }

    /// Log a summary every `interval` until shutdown.
    pub fn spawn_summary_logger(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: &Arc<ShutdownSignal>,
    ) -> JoinHandle<()> {
        let self_clone = Arc::clone(self);
        let shutdown = Arc::clone(shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait_for_signal() => break,
                    _ = tokio::time::sleep(interval) => {
                        log::info!("Metrics: {}", self_clone.summary());
                    },
                }
            }
            log::info!("Final metrics: {}", self_clone.summary());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = ConnectorMetrics::new();
        metrics.inc_received();
        metrics.inc_received();
        metrics.inc_received();
        metrics.inc_invocation("a", false);
        metrics.inc_invocation("a", true);
        metrics.inc_dropped();
        metrics.report_rebuild(Some(3));
        metrics.report_rebuild(None);
        assert_eq!(metrics.received_total(), 3);
        assert_eq!(metrics.invocations("a"), 2);
        assert_eq!(metrics.invocations("missing"), 0);
        assert_eq!(metrics.failed_invocations("a"), 1);
        assert_eq!(metrics.tracked_topics(), 1);
        assert_eq!(metrics.dropped_total(), 1);
        assert_eq!(metrics.rebuilds(), (1, 1));
        assert_eq!(metrics.routed_topics(), 3);
        assert_eq!(
            metrics.summary(),
            "received=3 dropped=1 invocations=2 failed=1 routed_topics=3 rebuilds_ok=1 rebuilds_failed=1"
        );
    }
}
