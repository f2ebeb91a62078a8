//! `Tx` abstraction over channel kinds used to forward transformed events out of a connection
//! task, plus the unbounded mpsc wrapper used by every provider in this engine.

use tokio::sync::mpsc;

/// Abstraction over a channel sender, letting connection-driving code stay generic over the
/// concrete channel implementation (unbounded mpsc today, bounded or broadcast tomorrow).
pub trait Tx<T> {
    type Error;
    fn send(&self, item: T) -> Result<(), Self::Error>;
}

/// Unbounded mpsc sender half, used to forward events from an exchange connection task to
/// whichever consumer subscribed to it without ever blocking the connection task on a slow
/// consumer.
#[derive(Debug, Clone)]
pub struct UnboundedTx<T>(pub mpsc::UnboundedSender<T>);

/// Unbounded mpsc receiver half.
#[derive(Debug)]
pub struct UnboundedRx<T>(pub mpsc::UnboundedReceiver<T>);

impl<T> UnboundedRx<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.0.recv().await
    }
}

impl<T> Tx<T> for UnboundedTx<T> {
    type Error = mpsc::error::SendError<T>;

    fn send(&self, item: T) -> Result<(), Self::Error> {
        self.0.send(item)
    }
}

/// Constructs a linked [`UnboundedTx`]/[`UnboundedRx`] pair.
pub fn unbounded<T>() -> (UnboundedTx<T>, UnboundedRx<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UnboundedTx(tx), UnboundedRx(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sent_item_is_received() {
        let (tx, mut rx) = unbounded::<u32>();
        tx.send(42).unwrap();
        assert_eq!(rx.recv().await, Some(42));
    }

    #[tokio::test]
    async fn send_after_receiver_dropped_errors() {
        let (tx, rx) = unbounded::<u32>();
        drop(rx);
        assert!(tx.send(1).is_err());
    }
}
