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


//! Cooperative shutdown signalling.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use tokio::sync::Semaphore;

/// Shared shutdown flag that async tasks can poll or wait for.
///
/// Once raised the signal stays raised.
pub struct ShutdownSignal {
    signaled: AtomicBool,
    semaphore: Semaphore,
}

impl ShutdownSignal {
    /// Return a new instance.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            signaled: AtomicBool::default(),
            semaphore: Semaphore::new(0),
        })
    }

    /// Wait until shutdown has been signaled.
    ///
    /// Returns immediately if the signal was already raised.
    pub async fn wait_for_signal(&self) {
        let _ = self.semaphore.acquire().await;
    }

    /// Return `true` if shutdown has been signaled.
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Relaxed)
    }

    /// Raise the shutdown signal and wake all waiting tasks.
    pub fn signal(&self) {
        // Only add permits once.
        if !self.signaled.swap(true, Ordering::Relaxed) {
            self.semaphore.add_permits(Semaphore::MAX_PERMITS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_shutdown_signal() {
        let shutdown = ShutdownSignal::new();
        assert!(!shutdown.is_signaled());
        assert!(
            timeout(Duration::from_millis(50), shutdown.wait_for_signal())
                .await
                .is_err()
        );
        let shutdown_clone = Arc::clone(&shutdown);
        let waiter = tokio::spawn(async move { shutdown_clone.wait_for_signal().await });
        shutdown.signal();
        shutdown.signal();
        assert!(shutdown.is_signaled());
        timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        // Waiting after the fact returns immediately.
        timeout(Duration::from_secs(1), shutdown.wait_for_signal())
            .await
            .unwrap();
    }
}
