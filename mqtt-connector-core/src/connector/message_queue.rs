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


//! Bounded hand-off from the broker subscription to the dispatcher.

use super::ConnectorMetrics;
use super::Message;
use crate::conf::OverflowPolicy;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Producer side of the bounded dispatch queue.
#[derive(Clone)]
pub struct MessageSender {
    sender: mpsc::Sender<Message>,
    overflow_policy: OverflowPolicy,
    metrics: Arc<ConnectorMetrics>,
}

impl MessageSender {
    /// Return a new sender and the receiver that the dispatcher drains.
    pub fn bounded(
        capacity: usize,
        overflow_policy: OverflowPolicy,
        metrics: &Arc<ConnectorMetrics>,
    ) -> (Self, mpsc::Receiver<Message>) {
        let (sender, receiver) = mpsc::channel(std::cmp::max(1, capacity));
        (
            Self {
                sender,
                overflow_policy,
                metrics: Arc::clone(metrics),
            },
            receiver,
        )
    }

    /// Queue a message according to the overflow policy.
    ///
    /// Return `false` if the dispatcher has gone away.
    pub async fn enqueue(&self, message: Message) -> bool {
        match self.overflow_policy {
            OverflowPolicy::Block => self.sender.send(message).await.is_ok(),
            OverflowPolicy::Drop => match self.sender.try_send(message) {
                Ok(()) => true,
                Err(TrySendError::Full(message)) => {
                    log::warn!(
                        "Dispatch queue is full. Dropping message on topic '{}'.",
                        message.topic()
                    );
                    self.metrics.inc_dropped();
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_drop_policy() {
        let metrics = ConnectorMetrics::new();
        let (sender, mut receiver) = MessageSender::bounded(1, OverflowPolicy::Drop, &metrics);
        assert!(sender.enqueue(Message::new("t", Bytes::from_static(b"1"))).await);
        assert!(sender.enqueue(Message::new("t", Bytes::from_static(b"2"))).await);
        assert_eq!(metrics.dropped_total(), 1);
        let first = receiver.recv().await.unwrap();
        assert_eq!(first.payload().as_ref(), b"1");
        drop(receiver);
        assert!(!sender.enqueue(Message::new("t", Bytes::new())).await);
    }

    #[tokio::test]
    async fn test_block_policy() {
        let metrics = ConnectorMetrics::new();
        let (sender, mut receiver) = MessageSender::bounded(1, OverflowPolicy::Block, &metrics);
        assert!(sender.enqueue(Message::new("t", Bytes::from_static(b"1"))).await);
        let sender_clone = sender.clone();
        let blocked = tokio::spawn(async move {
            sender_clone
                .enqueue(Message::new("t", Bytes::from_static(b"2")))
                .await
        });
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());
        assert_eq!(receiver.recv().await.unwrap().payload().as_ref(), b"1");
        assert!(blocked.await.unwrap());
        assert_eq!(receiver.recv().await.unwrap().payload().as_ref(), b"2");
        assert_eq!(metrics.dropped_total(), 0);
    }
}
