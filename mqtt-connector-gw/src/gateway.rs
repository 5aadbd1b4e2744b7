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


//! Function gateway abstraction.

use crate::ConnectorError;
use crate::model::FunctionAnnotation;
use crate::model::InvocationRequest;
use crate::model::InvocationResponse;

/// Gateway in front of deployed functions.
///
/// The gateway exposes a registry of deployed functions (with their topic
/// annotations) and a way to invoke them.
#[async_trait::async_trait]
pub trait Gateway: Send + Sync {
    /// List all deployed functions in `namespace` or in all namespaces when
    /// `None`.
    async fn list_functions(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<FunctionAnnotation>, ConnectorError>;

    /// Invoke a function.
    ///
    /// Failures are reported through [InvocationResponse::error] and never
    /// returned as an `Err` so that every invocation yields exactly one
    /// response.
    async fn invoke(&self, request: InvocationRequest) -> InvocationResponse;
}
