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


//! Outcome of a single function invocation.

use crate::ConnectorError;
use bytes::Bytes;
use std::time::Duration;

/// Outcome of a single function invocation.
#[derive(Debug, Clone)]
pub struct InvocationResponse {
    status: u16,
    topic: String,
    function: String,
    body: Option<Bytes>,
    error: Option<ConnectorError>,
    duration: Duration,
}

impl InvocationResponse {
    /// Return a response for an invocation that reached the function.
    pub fn new(status: u16, topic: &str, function: &str, body: Option<Bytes>) -> Self {
        Self {
            status,
            topic: topic.to_owned(),
            function: function.to_owned(),
            body,
            error: None,
            duration: Duration::ZERO,
        }
    }

    /// Return a response for an invocation that failed before an HTTP status
    /// was available.
    pub fn from_error(topic: &str, function: &str, error: ConnectorError) -> Self {
        Self {
            status: 0,
            topic: topic.to_owned(),
            function: function.to_owned(),
            body: None,
            error: Some(error),
            duration: Duration::ZERO,
        }
    }

    /// Set how long the invocation took.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// HTTP status code or `0` if no response was received.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Topic that triggered the invocation.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Invoked function.
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Response body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Invocation failure, if any.
    pub fn error(&self) -> Option<&ConnectorError> {
        self.error.as_ref()
    }

    /// Time spent waiting for the gateway.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// `true` if the invocation failed or the function answered with a
    /// client or server error status.
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.status >= 400
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectorErrorKind;

    #[test]
    fn test_is_failure() {
        assert!(!InvocationResponse::new(200, "t", "f", None).is_failure());
        assert!(!InvocationResponse::new(202, "t", "f", None).is_failure());
        assert!(InvocationResponse::new(502, "t", "f", None).is_failure());
        let res = InvocationResponse::from_error(
            "t",
            "f",
            ConnectorErrorKind::Invocation.error_with_msg("timeout"),
        );
        assert!(res.is_failure());
        assert_eq!(res.status(), 0);
    }
}
