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


//! Ephemeral in-memory implementation of [Gateway].

use crossbeam_skiplist::SkipMap;
use crossbeam_skiplist::SkipSet;
use mqtt_connector_gw::ConnectorError;
use mqtt_connector_gw::ConnectorErrorKind;
use mqtt_connector_gw::Gateway;
use mqtt_connector_gw::model::FunctionAnnotation;
use mqtt_connector_gw::model::InvocationRequest;
use mqtt_connector_gw::model::InvocationResponse;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// A function known to the in-memory registry.
struct MemFunction {
    namespace: Option<String>,
    topic_annotation: String,
}

/** Ephemeral in-memory implementation of [Gateway].

Only the most recent invocations are kept for inspection. See
[Self::set_recorded_invocations_limit()].
*/
pub struct MemoryGateway {
    topic_delimiter: String,
    functions: SkipMap<String, MemFunction>,
    failing_functions: SkipSet<String>,
    fail_listing: AtomicBool,
    invocation_seq: AtomicU64,
    invocations: SkipMap<u64, InvocationRequest>,
    recorded_invocations_limit: AtomicUsize,
}

impl MemoryGateway {
    /// Default number of recent invocations kept for inspection.
    pub const DEFAULT_RECORDED_INVOCATIONS_LIMIT: usize = 1024;

    /// Return a new instance that splits topic annotations on
    /// `topic_delimiter`.
    pub fn new(topic_delimiter: &str) -> Arc<Self> {
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("Using in-mem gateway.");
        }
        Arc::new(Self {
            topic_delimiter: topic_delimiter.to_owned(),
            functions: SkipMap::default(),
            failing_functions: SkipSet::default(),
            fail_listing: AtomicBool::default(),
            invocation_seq: AtomicU64::default(),
            invocations: SkipMap::default(),
            recorded_invocations_limit: AtomicUsize::new(Self::DEFAULT_RECORDED_INVOCATIONS_LIMIT),
        })
    }

    /// Deploy (or redeploy) a function with a topic annotation.
    pub fn register_function(&self, name: &str, namespace: Option<&str>, topic_annotation: &str) {
        self.functions.insert(
            name.to_owned(),
            MemFunction {
                namespace: namespace.map(str::to_owned),
                topic_annotation: topic_annotation.to_owned(),
            },
        );
    }

    /// Remove a deployed function.
    pub fn remove_function(&self, name: &str) {
        self.functions.remove(name);
    }

    /// Make every future invocation of `name` fail.
    pub fn fail_function(&self, name: &str) {
        self.failing_functions.insert(name.to_owned());
    }

    /// Make listing of functions fail (or succeed again).
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::Relaxed);
    }

    /// Keep at most `limit` of the most recent invocations.
    pub fn set_recorded_invocations_limit(&self, limit: usize) {
        self.recorded_invocations_limit.store(limit, Ordering::Relaxed);
        self.evict_recorded_invocations();
    }

    /// Recent invocations in the order they were made.
    pub fn invocations(&self) -> Vec<InvocationRequest> {
        self.invocations
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of invocations made, including those no longer recorded.
    pub fn invocation_count(&self) -> usize {
        usize::try_from(self.invocation_seq.load(Ordering::Relaxed)).unwrap_or(usize::MAX)
    }

    fn evict_recorded_invocations(&self) {
        let limit = self.recorded_invocations_limit.load(Ordering::Relaxed);
        while self.invocations.len() > limit {
            if self.invocations.pop_front().is_none() {
                break;
            }
        }
    }
}

#[async_trait::async_trait]
impl Gateway for MemoryGateway {
    async fn list_functions(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<FunctionAnnotation>, ConnectorError> {
        if self.fail_listing.load(Ordering::Relaxed) {
            return Err(ConnectorErrorKind::RegistryQuery.error_with_msg("Listing disabled."));
        }
        Ok(self
            .functions
            .iter()
            .filter(|entry| {
                namespace.is_none_or(|namespace| {
                    entry.value().namespace.as_deref() == Some(namespace)
                })
            })
            .map(|entry| {
                FunctionAnnotation::from_annotation(
                    entry.key(),
                    &entry.value().topic_annotation,
                    &self.topic_delimiter,
                )
            })
            .collect())
    }

    async fn invoke(&self, request: InvocationRequest) -> InvocationResponse {
        let seq = self.invocation_seq.fetch_add(1, Ordering::Relaxed);
        self.invocations.insert(seq, request.clone());
        self.evict_recorded_invocations();
        if self.failing_functions.contains(request.function()) {
            return InvocationResponse::from_error(
                request.topic(),
                request.function(),
                ConnectorErrorKind::Invocation
                    .error_with_msg(format!("Function '{}' failed.", request.function())),
            );
        }
        if !self.functions.contains_key(request.function()) {
            return InvocationResponse::new(404, request.topic(), request.function(), None);
        }
        let status = if request.is_async() { 202 } else { 200 };
        let body = (!request.is_async()).then(|| request.body().clone());
        InvocationResponse::new(status, request.topic(), request.function(), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_list_and_invoke() {
        let gw = MemoryGateway::new(",");
        gw.register_function("f1", Some("openfaas-fn"), "a, b");
        gw.register_function("f2", Some("other"), "b");
        let all = gw.list_functions(None).await.unwrap();
        assert_eq!(all.len(), 2);
        let in_ns = gw.list_functions(Some("other")).await.unwrap();
        assert_eq!(in_ns.len(), 1);
        assert_eq!(in_ns[0].function_name(), "f2");

        let res = gw
            .invoke(InvocationRequest::new("f1", "a", Bytes::from_static(b"x")))
            .await;
        assert_eq!(res.status(), 200);
        assert_eq!(res.body().map(Bytes::as_ref), Some(&b"x"[..]));
        let res = gw
            .invoke(InvocationRequest::new("f1", "a", Bytes::new()).with_async(true, None))
            .await;
        assert_eq!(res.status(), 202);
        let res = gw
            .invoke(InvocationRequest::new("gone", "a", Bytes::new()))
            .await;
        assert_eq!(res.status(), 404);
        assert_eq!(gw.invocation_count(), 3);
    }

    #[tokio::test]
    async fn test_failures() {
        let gw = MemoryGateway::new(",");
        gw.register_function("f1", None, "a");
        gw.fail_function("f1");
        let res = gw
            .invoke(InvocationRequest::new("f1", "a", Bytes::new()))
            .await;
        assert!(res.error().is_some());
        gw.fail_listing(true);
        assert!(gw.list_functions(None).await.is_err());
        gw.fail_listing(false);
        gw.remove_function("f1");
        assert!(gw.list_functions(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recorded_invocations_are_bounded() {
        let gw = MemoryGateway::new(",");
        gw.register_function("f1", None, "a");
        gw.set_recorded_invocations_limit(2);
        for i in 0..5u8 {
            gw.invoke(InvocationRequest::new("f1", "a", Bytes::from(vec![i])))
                .await;
        }
        assert_eq!(gw.invocation_count(), 5);
        let bodies = gw
            .invocations()
            .iter()
            .map(|request| request.body().to_vec())
            .collect::<Vec<_>>();
        assert_eq!(bodies, vec![vec![3u8], vec![4u8]]);
        gw.set_recorded_invocations_limit(1);
        assert_eq!(gw.invocations().len(), 1);
    }
}
