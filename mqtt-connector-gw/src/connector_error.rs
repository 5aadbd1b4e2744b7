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


//! Connector errors.

use std::error::Error;
use std::fmt;

/// Cause of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorErrorKind {
    /// General failure. See message for details.
    Unspecified,
    /// Invalid or missing configuration.
    Configuration,
    /// The broker was unreachable or refused the connection.
    Connection,
    /// The broker rejected the topic subscription.
    Subscription,
    /// The function registry of the gateway could not be queried.
    RegistryQuery,
    /// Invocation of a function through the gateway failed.
    Invocation,
}

impl ConnectorErrorKind {
    /// Create a new instance with an error message.
    pub fn error_with_msg<S: AsRef<str>>(self, msg: S) -> ConnectorError {
        ConnectorError {
            kind: self,
            msg: Some(msg.as_ref().to_string()),
        }
    }

    /// Create a new instance without an error message.
    pub fn error(self) -> ConnectorError {
        ConnectorError {
            kind: self,
            msg: None,
        }
    }
}

impl fmt::Display for ConnectorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/** Connector error.

Create a new instance via [ConnectorErrorKind].
*/
#[derive(Debug, Clone)]
pub struct ConnectorError {
    kind: ConnectorErrorKind,
    msg: Option<String>,
}

impl ConnectorError {
    /// Return the type of error.
    pub fn kind(&self) -> &ConnectorErrorKind {
        &self.kind
    }

    /// Return the error message if present.
    pub fn msg(&self) -> Option<&str> {
        self.msg.as_deref()
    }
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(msg) = &self.msg {
            write!(f, "{}Error: {}", self.kind, msg)
        } else {
            write!(f, "{}Error", self.kind)
        }
    }
}

impl AsRef<ConnectorError> for ConnectorError {
    fn as_ref(&self) -> &ConnectorError {
        self
    }
}

impl Error for ConnectorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = ConnectorErrorKind::Connection.error_with_msg("refused");
        assert_eq!(e.to_string(), "ConnectionError: refused");
        assert_eq!(e.kind(), &ConnectorErrorKind::Connection);
        let e = ConnectorErrorKind::RegistryQuery.error();
        assert_eq!(e.to_string(), "RegistryQueryError");
        assert!(e.msg().is_none());
    }
}
