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


//! Default reporter that logs invocation outcomes.

use super::InvocationReporter;
use mqtt_connector_gw::model::InvocationResponse;

/// Log the outcome of invocations.
pub struct LogReporter {
    print_response: bool,
    print_response_body: bool,
}

impl LogReporter {
    /// Return a new instance.
    ///
    /// Failures are always logged. Successful outcomes are only logged when
    /// `print_response` is set.
    pub fn new(print_response: bool, print_response_body: bool) -> Self {
        Self {
            print_response,
            print_response_body,
        }
    }

    /// Text line describing the outcome.
    fn describe(&self, response: &InvocationResponse) -> String {
        if let Some(e) = response.error() {
            return format!(
                "Invocation of '{}' for topic '{}' failed: {e}",
                response.function(),
                response.topic()
            );
        }
        let body_len = response.body().map(|body| body.len()).unwrap_or_default();
        let mut ret = format!(
            "[{}] {} => {} ({} bytes, {} ms)",
            response.status(),
            response.topic(),
            response.function(),
            body_len,
            response.duration().as_millis(),
        );
        if self.print_response_body
            && let Some(body) = response.body()
        {
            ret.push_str(": ");
            ret.push_str(&String::from_utf8_lossy(body));
        }
        ret
    }
}

impl InvocationReporter for LogReporter {
    fn handle(&self, response: &InvocationResponse) {
        if response.error().is_some() {
            log::warn!("{}", self.describe(response));
        } else if self.print_response {
            log::info!("{}", self.describe(response));
        }
    }
}
