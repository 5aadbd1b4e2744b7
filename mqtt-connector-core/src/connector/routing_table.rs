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


//! Periodically rebuilt topic to function routing.

mod topic_map;

pub use self::topic_map::TopicMap;
use super::ConnectorMetrics;
use crate::util::LogScopeDuration;
use crate::util::ShutdownSignal;
use crossbeam_skiplist::SkipMap;
use mqtt_connector_gw::ConnectorError;
use mqtt_connector_gw::Gateway;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/** Routing of topics to the functions annotated to consume them.

The [TopicMap] is rebuilt from the gateway's function registry and replaced
wholesale, so a lookup sees either the previous or the new complete map. A
failed rebuild keeps the previous map.
*/
pub struct RoutingTable {
    gateway: Arc<dyn Gateway>,
    namespace: Option<String>,
    rebuild_interval: Duration,
    current: SkipMap<(), Arc<TopicMap>>,
    metrics: Arc<ConnectorMetrics>,
}

impl RoutingTable {
    /// Return a new instance with an empty map.
    pub fn new(
        gateway: &Arc<dyn Gateway>,
        namespace: Option<&str>,
        rebuild_interval: Duration,
        metrics: &Arc<ConnectorMetrics>,
    ) -> Arc<Self> {
        let ret = Arc::new(Self {
            gateway: Arc::clone(gateway),
            namespace: namespace.map(str::to_owned),
            rebuild_interval,
            current: SkipMap::default(),
            metrics: Arc::clone(metrics),
        });
        ret.current.insert((), Arc::new(TopicMap::default()));
        ret
    }

    /// Return the current map.
    ///
    /// Use this when several lookups need to see the same map.
    pub fn snapshot(&self) -> Arc<TopicMap> {
        self.current
            .get(&())
            .map(|entry| Arc::clone(entry.value()))
            .unwrap_or_default()
    }

    /// Functions that consume `topic`. Empty if there is no match.
    pub fn lookup(&self, topic: &str) -> BTreeSet<String> {
        self.snapshot()
            .functions(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Query the gateway and replace the current map.
    ///
    /// The current map is left in place if the query fails.
    pub async fn rebuild(&self) -> Result<Arc<TopicMap>, ConnectorError> {
        let _log_scope_duration =
            LogScopeDuration::new(log::Level::Trace, module_path!(), "rebuild", 0);
        let function_annotations = self
            .gateway
            .list_functions(self.namespace.as_deref())
            .await
            .inspect_err(|_| self.metrics.report_rebuild(None))?;
        let topic_map = Arc::new(TopicMap::from_function_annotations(&function_annotations));
        self.current.insert((), Arc::clone(&topic_map));
        self.metrics.report_rebuild(Some(topic_map.topic_count()));
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "Routing table rebuilt from {} functions: {} topics.",
                function_annotations.len(),
                topic_map.topic_count()
            );
        }
        if log::log_enabled!(log::Level::Trace) {
            for (topic, functions) in topic_map.iter() {
                log::trace!("Topic '{topic}' -> {functions:?}");
            }
        }
        Ok(topic_map)
    }

    /// Rebuild right away and then every rebuild interval until shutdown.
    pub fn spawn_rebuild_loop(self: &Arc<Self>, shutdown: &Arc<ShutdownSignal>) -> JoinHandle<()> {
        let self_clone = Arc::clone(self);
        let shutdown = Arc::clone(shutdown);
        tokio::spawn(async move {
            loop {
                if let Err(e) = self_clone.rebuild().await {
                    log::warn!("Keeping previous routing table: {e}");
                }
                tokio::select! {
                    _ = shutdown.wait_for_signal() => break,
                    _ = tokio::time::sleep(self_clone.rebuild_interval) => {},
                }
            }
            log::debug!("Routing table rebuilds stopped.");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqtt_connector_gw_mem::MemoryGateway;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;

    fn routing_table(gw: &Arc<MemoryGateway>, namespace: Option<&str>) -> Arc<RoutingTable> {
        let gateway = Arc::clone(gw) as Arc<dyn Gateway>;
        RoutingTable::new(
            &gateway,
            namespace,
            Duration::from_millis(20),
            &ConnectorMetrics::new(),
        )
    }

    #[tokio::test]
    async fn test_lookup_before_and_after_rebuild() {
        let gw = MemoryGateway::new(",");
        gw.register_function("f1", None, "sensors/temp,sensors/humidity");
        let rt = routing_table(&gw, None);
        assert!(rt.lookup("sensors/temp").is_empty());
        rt.rebuild().await.unwrap();
        assert_eq!(
            rt.lookup("sensors/temp").into_iter().collect::<Vec<_>>(),
            vec!["f1"]
        );
        assert!(rt.lookup("unknown").is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_replaces_and_removes_stale_entries() {
        let gw = MemoryGateway::new(",");
        gw.register_function("f1", None, "a,b");
        gw.register_function("f2", None, "b");
        let rt = routing_table(&gw, None);
        rt.rebuild().await.unwrap();
        assert_eq!(rt.lookup("b").len(), 2);
        gw.register_function("f1", None, "c");
        gw.remove_function("f2");
        rt.rebuild().await.unwrap();
        assert!(rt.lookup("a").is_empty());
        assert!(rt.lookup("b").is_empty());
        assert_eq!(rt.lookup("c").into_iter().collect::<Vec<_>>(), vec!["f1"]);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_table() {
        let gw = MemoryGateway::new(",");
        gw.register_function("f1", None, "a");
        let rt = routing_table(&gw, None);
        rt.rebuild().await.unwrap();
        gw.fail_listing(true);
        gw.remove_function("f1");
        let err = rt.rebuild().await.unwrap_err();
        assert_eq!(
            err.kind(),
            &mqtt_connector_gw::ConnectorErrorKind::RegistryQuery
        );
        assert_eq!(rt.lookup("a").into_iter().collect::<Vec<_>>(), vec!["f1"]);
        assert_eq!(rt.metrics.rebuilds(), (1, 1));
    }

    #[tokio::test]
    async fn test_namespace_filter() {
        let gw = MemoryGateway::new(",");
        gw.register_function("f1", Some("dev"), "a");
        gw.register_function("f2", Some("prod"), "a");
        let rt = routing_table(&gw, Some("dev"));
        rt.rebuild().await.unwrap();
        assert_eq!(rt.lookup("a").into_iter().collect::<Vec<_>>(), vec!["f1"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_lookups_never_see_partial_table() {
        // Two generations that route both topics to the same function.
        let gw = MemoryGateway::new(",");
        let rt = routing_table(&gw, None);
        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let rt = Arc::clone(&rt);
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                let mut observations = 0u64;
                while !done.load(Ordering::Relaxed) {
                    let snapshot = rt.snapshot();
                    let t1 = snapshot.functions("t1").cloned().unwrap_or_default();
                    let t2 = snapshot.functions("t2").cloned().unwrap_or_default();
                    assert_eq!(t1, t2, "Observed a torn routing table.");
                    observations += 1;
                    tokio::task::yield_now().await;
                }
                observations
            })
        };
        for i in 0..200 {
            let (old, new) = if i % 2 == 0 { ("old", "new") } else { ("new", "old") };
            gw.remove_function(old);
            gw.register_function(new, None, "t1,t2");
            rt.rebuild().await.unwrap();
            tokio::task::yield_now().await;
        }
        done.store(true, Ordering::Relaxed);
        assert!(reader.await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_rebuild_loop() {
        let gw = MemoryGateway::new(",");
        let rt = routing_table(&gw, None);
        let shutdown = ShutdownSignal::new();
        let handle = rt.spawn_rebuild_loop(&shutdown);
        gw.register_function("late", None, "x");
        tokio::time::timeout(Duration::from_secs(5), async {
            while rt.lookup("x").is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        shutdown.signal();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
