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


//! Function registry entry as returned by the gateway.

use mqtt_connector_gw::model::FunctionAnnotation;
use serde::Deserialize;
use std::collections::HashMap;

/// Function registry entry as returned by the gateway.
///
/// Only the fields needed for routing are parsed.
#[derive(Debug, Deserialize)]
pub struct FunctionStatus {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    annotations: Option<HashMap<String, String>>,
}

impl FunctionStatus {
    /// Parse a JSON array of function registry entries.
    pub fn from_json_list(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Return the topics this function consumes or `None` if the function
    /// has no topic annotation.
    ///
    /// Functions listed for an explicitly requested namespace are addressed
    /// as `{name}.{namespace}`.
    pub fn as_function_annotation(
        &self,
        queried_namespace: Option<&str>,
        topic_delimiter: &str,
    ) -> Option<FunctionAnnotation> {
        let topic_annotation = self
            .annotations
            .as_ref()?
            .get(FunctionAnnotation::TOPIC_ANNOTATION_KEY)?;
        let function_name = match queried_namespace {
            Some(namespace) if !namespace.is_empty() => {
                let namespace = self.namespace.as_deref().unwrap_or(namespace);
                format!("{}.{namespace}", self.name)
            }
            _ => self.name.to_owned(),
        };
        Some(FunctionAnnotation::from_annotation(
            &function_name,
            topic_annotation,
            topic_delimiter,
        ))
    }
}
