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

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

mod connector_error;
mod gateway;
pub mod model {
    //! Objects passed between the connector and a function gateway.

    mod function_annotation;
    mod invocation_request;
    mod invocation_response;

    pub use self::function_annotation::FunctionAnnotation;
    pub use self::invocation_request::InvocationRequest;
    pub use self::invocation_response::InvocationResponse;
}

pub use self::connector_error::ConnectorError;
pub use self::connector_error::ConnectorErrorKind;
pub use self::gateway::Gateway;
