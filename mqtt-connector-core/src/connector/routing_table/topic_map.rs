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


//! Immutable topic to function mapping.

use mqtt_connector_gw::model::FunctionAnnotation;
use std::collections::BTreeSet;
use std::collections::HashMap;

/// Immutable mapping from topic to the functions that consume it.
#[derive(Debug, Default)]
pub struct TopicMap {
    functions_by_topic: HashMap<String, BTreeSet<String>>,
}

impl TopicMap {
    /// Build a new mapping where every function appears under each of its
    /// declared topics.
    pub fn from_function_annotations(function_annotations: &[FunctionAnnotation]) -> Self {
        let mut functions_by_topic: HashMap<String, BTreeSet<String>> = HashMap::new();
        for function_annotation in function_annotations {
            for topic in function_annotation.topics() {
                functions_by_topic
                    .entry(topic.to_owned())
                    .or_default()
                    .insert(function_annotation.function_name().to_owned());
            }
        }
        Self { functions_by_topic }
    }

    /// Functions that consume `topic`, in name order.
    pub fn functions(&self, topic: &str) -> Option<&BTreeSet<String>> {
        self.functions_by_topic.get(topic)
    }

    /// Number of topics with at least one consuming function.
    pub fn topic_count(&self) -> usize {
        self.functions_by_topic.len()
    }

    /// Iterate over all `(topic, functions)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.functions_by_topic.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations() -> Vec<FunctionAnnotation> {
        vec![
            FunctionAnnotation::from_annotation("f1", "sensors/temp,sensors/humidity", ","),
            FunctionAnnotation::from_annotation("f2", " sensors/temp ", ","),
            FunctionAnnotation::from_annotation("f3", "", ","),
            FunctionAnnotation::from_annotation("f4", "alerts;sensors/humidity", ";"),
        ]
    }

    #[test]
    fn test_every_function_under_every_declared_topic() {
        let function_annotations = annotations();
        let topic_map = TopicMap::from_function_annotations(&function_annotations);
        for fa in &function_annotations {
            for topic in fa.topics() {
                assert!(
                    topic_map
                        .functions(topic)
                        .is_some_and(|functions| functions.contains(fa.function_name())),
                    "{} missing under {topic}",
                    fa.function_name()
                );
            }
        }
        // No function appears under an undeclared topic
        for (topic, functions) in topic_map.iter() {
            for function in functions {
                let fa = function_annotations
                    .iter()
                    .find(|fa| fa.function_name() == function)
                    .unwrap();
                assert!(fa.topics().contains(topic));
            }
        }
        assert_eq!(topic_map.topic_count(), 3);
        assert_eq!(
            topic_map
                .functions("sensors/temp")
                .unwrap()
                .iter()
                .collect::<Vec<_>>(),
            vec!["f1", "f2"]
        );
        assert!(topic_map.functions("f3").is_none());
    }
}
