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


//! Incoming broker message.

use bytes::Bytes;

/// A message received from the broker.
///
/// Immutable once queued and consumed exactly once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    topic: String,
    payload: Bytes,
}

impl Message {
    /// Return a new instance.
    pub fn new(topic: &str, payload: Bytes) -> Self {
        Self {
            topic: topic.to_owned(),
            payload,
        }
    }

    /// Topic the message was published on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Message payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// Drop the leading `/`-delimited segment ("channel key") of a topic.
///
/// A topic without any `/` is returned unchanged.
pub fn trim_channel_key(topic: &str) -> &str {
    topic
        .split_once('/')
        .map(|(_channel_key, rest)| rest)
        .unwrap_or(topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_channel_key() {
        assert_eq!(trim_channel_key("device123/sensors/temp"), "sensors/temp");
        assert_eq!(trim_channel_key("key/"), "");
        assert_eq!(trim_channel_key("/sensors"), "sensors");
    }

    #[test]
    fn test_trim_channel_key_without_delimiter() {
        assert_eq!(trim_channel_key("temp"), "temp");
        assert_eq!(trim_channel_key(trim_channel_key("temp")), "temp");
        assert_eq!(trim_channel_key(""), "");
    }
}
