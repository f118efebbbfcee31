use std::time::Duration;

use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TrySendError};
use tracing::{debug, error, warn};

use crate::error::PipelineError;

/// Sending half of one pipeline stream.
///
/// A full buffer is waited on for `grace`; if it is still full after that the
/// consumer cannot keep up with the configuration and a fatal
/// [`PipelineError::CapacityExceeded`] is raised on the `fatal` channel.
pub struct BoundedSender<T> {
    stream: &'static str,
    tx: mpsc::Sender<T>,
    grace: Duration,
    fatal: mpsc::Sender<PipelineError>,
}

impl<T> Clone for BoundedSender<T> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream,
            tx: self.tx.clone(),
            grace: self.grace,
            fatal: self.fatal.clone(),
        }
    }
}

impl<T> BoundedSender<T> {
    pub fn new(
        stream: &'static str,
        tx: mpsc::Sender<T>,
        grace: Duration,
        fatal: mpsc::Sender<PipelineError>,
    ) -> Self {
        Self { stream, tx, grace, fatal }
    }

    /// Publish one item. Returns `false` when the item was not delivered.
    pub async fn publish(&self, item: T) -> bool {
        let item = match self.tx.try_send(item) {
            Ok(()) => return true,
            Err(TrySendError::Closed(_)) => {
                debug!(stream = self.stream, "stream closed, dropping item");
                return false;
            }
            Err(TrySendError::Full(item)) => item,
        };

        warn!(stream = self.stream, capacity = self.tx.max_capacity(), "stream full, waiting for consumer");
        match self.tx.send_timeout(item, self.grace).await {
            Ok(()) => true,
            Err(SendTimeoutError::Closed(_)) => false,
            Err(SendTimeoutError::Timeout(_)) => {
                let capacity = self.tx.max_capacity();
                error!(stream = self.stream, capacity, grace = ?self.grace, "stream stayed full");
                // one fatal report is enough to stop the pipeline
                let _ = self.fatal.try_send(PipelineError::CapacityExceeded {
                    stream: self.stream,
                    capacity,
                });
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_delivers() {
        let (tx, mut rx) = mpsc::channel(2);
        let (fatal_tx, _fatal_rx) = mpsc::channel(1);
        let sender = BoundedSender::new("outcome", tx, Duration::from_secs(1), fatal_tx);

        assert!(sender.publish(1).await);
        assert_eq!(rx.recv().await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_stream_is_fatal() {
        let (tx, _rx) = mpsc::channel(1);
        let (fatal_tx, mut fatal_rx) = mpsc::channel(1);
        let sender = BoundedSender::new("event", tx, Duration::from_secs(5), fatal_tx);

        assert!(sender.publish(1).await);
        assert!(!sender.publish(2).await);

        match fatal_rx.recv().await {
            Some(PipelineError::CapacityExceeded { stream, capacity }) => {
                assert_eq!(stream, "event");
                assert_eq!(capacity, 1);
            }
            other => panic!("expected capacity error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_closed_stream_is_not_fatal() {
        let (tx, rx) = mpsc::channel(1);
        let (fatal_tx, mut fatal_rx) = mpsc::channel(1);
        let sender = BoundedSender::new("outcome", tx, Duration::from_secs(1), fatal_tx);
        drop(rx);

        assert!(!sender.publish(1).await);
        assert!(fatal_rx.try_recv().is_err());
    }
}
