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

//! Lenient parsing of human readable durations.

use std::time::Duration;

/// Parse a human readable duration like `10s`, `1250ms` or `2m`.
///
/// Return the reason when the value is malformed or not positive.
pub fn parse_positive_duration(value: &str) -> Result<Duration, String> {
    match humantime::parse_duration(value.trim()) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        Ok(_) => Err("Must be a positive duration".to_owned()),
        Err(e) => Err(e.to_string()),
    }
}

/** Resolves duration settings and keeps track of replaced values.

Malformed or zero durations are replaced by the setting's default and a
warning naming the setting is recorded for the caller to log.
*/
#[derive(Debug, Default)]
pub struct DurationResolver {
    warnings: Vec<String>,
}

impl DurationResolver {
    /// Parse `value` or fall back to `default`.
    pub fn resolve(&mut self, value: &str, default: Duration, config_key: &str) -> Duration {
        parse_positive_duration(value).unwrap_or_else(|reason| {
            self.warnings.push(format!(
                "Invalid {config_key} '{value}' ({reason}). Using default {}.",
                humantime::format_duration(default)
            ));
            default
        })
    }

    /// Warnings for every replaced value so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Take the recorded warnings.
    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}
