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


//! Utility for measuring duration of a scope.

use std::time::Instant;

/// Leverage `Drop` trait to log when the struct goes out of scope.
pub struct LogScopeDuration<'a> {
    level: log::Level,
    module_path: &'a str,
    scope_name: &'a str,
    start: Instant,
    min_micros_to_log: u128,
}

impl<'a> LogScopeDuration<'a> {
    /// Return a new instance or `None` if logging at `level` is disabled.
    ///
    /// You can retrieve the module path of the caller using the `module_path!()` macro.
    pub fn new(
        level: log::Level,
        module_path: &'a str,
        scope_name: &'a str,
        min_micros_to_log: u128,
    ) -> Option<Self> {
        log::log_enabled!(target: module_path, level).then(|| Self {
            module_path,
            scope_name,
            start: Instant::now(),
            level,
            min_micros_to_log,
        })
    }

    /// Microseconds since this instance was created.
    pub fn elapsed_micros(&self) -> u128 {
        self.start.elapsed().as_micros()
    }
}

impl Drop for LogScopeDuration<'_> {
    fn drop(&mut self) {
        let duration_micros = self.elapsed_micros();
        if duration_micros >= self.min_micros_to_log {
            log::log!(target: self.module_path, self.level, "'{}' took {} µs.", self.scope_name, duration_micros);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Initialize logging.
    pub fn init_logger() {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Debug)
            .try_init();
    }

    #[test]
    fn test_scoped_timer() {
        init_logger();
        let timer = LogScopeDuration::new(log::Level::Debug, module_path!(), "test_scoped_timer", 0);
        assert_eq!(
            timer.is_some(),
            log::log_enabled!(target: module_path!(), log::Level::Debug)
        );
        let filtered = LogScopeDuration::new(
            log::Level::Trace,
            module_path!(),
            "filtered by log level",
            0,
        );
        assert_eq!(
            filtered.is_some(),
            log::log_enabled!(target: module_path!(), log::Level::Trace)
        );
        if let Some(timer) = timer {
            std::thread::sleep(std::time::Duration::from_millis(2));
            assert!(timer.elapsed_micros() >= 2000);
        }
    }
}
