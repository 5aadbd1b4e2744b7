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


//! Request to invoke a single function.

use bytes::Bytes;

/// Request to invoke a single function with a message payload.
///
/// One instance is created for every (message, matched function) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    function: String,
    topic: String,
    body: Bytes,
    async_invoke: bool,
    callback_url: Option<String>,
}

impl InvocationRequest {
    /// Return a new synchronous request.
    pub fn new(function: &str, topic: &str, body: Bytes) -> Self {
        Self {
            function: function.to_owned(),
            topic: topic.to_owned(),
            body,
            async_invoke: false,
            callback_url: None,
        }
    }

    /// Invoke through the gateway's queue instead of waiting for the result.
    ///
    /// An empty `callback_url` is treated as absent.
    pub fn with_async(mut self, async_invoke: bool, callback_url: Option<&str>) -> Self {
        self.async_invoke = async_invoke;
        self.callback_url = callback_url
            .filter(|url| !url.is_empty())
            .map(str::to_owned);
        self
    }

    /// Function to invoke.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Topic the payload was received on (after any channel key trim).
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// `true` when the invocation should be queued by the gateway.
    pub fn is_async(&self) -> bool {
        self.async_invoke
    }

    /// Where the gateway should deliver the result of an async invocation.
    pub fn callback_url(&self) -> Option<&str> {
        self.callback_url.as_deref()
    }
}
