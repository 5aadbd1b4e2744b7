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


//! Topics a deployed function consumes.

use std::collections::BTreeSet;

/// A deployed function and the topics it has been annotated to consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionAnnotation {
    function_name: String,
    topics: BTreeSet<String>,
}

impl FunctionAnnotation {
    /// Name of the registry metadata annotation that lists consumed topics.
    pub const TOPIC_ANNOTATION_KEY: &'static str = "topic";

    /// Return a new instance.
    pub fn new(function_name: &str, topics: BTreeSet<String>) -> Self {
        Self {
            function_name: function_name.to_owned(),
            topics,
        }
    }

    /// Parse a delimited topic annotation.
    ///
    /// Each item is trimmed and empty items are skipped, so `"a, b,,"` with
    /// delimiter `","` yields the topics `a` and `b`.
    pub fn from_annotation(function_name: &str, annotation: &str, delimiter: &str) -> Self {
        let topics = if delimiter.is_empty() {
            std::iter::once(annotation.trim())
                .filter(|topic| !topic.is_empty())
                .map(str::to_owned)
                .collect()
        } else {
            annotation
                .split(delimiter)
                .map(str::trim)
                .filter(|topic| !topic.is_empty())
                .map(str::to_owned)
                .collect()
        };
        Self::new(function_name, topics)
    }

    /// Address of the function in the gateway.
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Topics that the function consumes.
    pub fn topics(&self) -> &BTreeSet<String> {
        &self.topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_annotation() {
        let fa = FunctionAnnotation::from_annotation("f1", " sensors/temp ,sensors/humidity,,", ",");
        assert_eq!(fa.function_name(), "f1");
        assert_eq!(
            fa.topics().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["sensors/humidity", "sensors/temp"]
        );
    }

    #[test]
    fn test_from_annotation_custom_delimiter() {
        let fa = FunctionAnnotation::from_annotation("f2", "a|b, c|a", "|");
        assert_eq!(
            fa.topics().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["a", "b, c"]
        );
        let fa = FunctionAnnotation::from_annotation("f3", "   ", ",");
        assert!(fa.topics().is_empty());
        let fa = FunctionAnnotation::from_annotation("f4", " x,y ", "");
        assert_eq!(
            fa.topics().iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["x,y"]
        );
    }
}
