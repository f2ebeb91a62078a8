//! Graceful shutdown signal. Grounded on the teacher's `Shutdown` marker
//! (`core/src/shutdown.rs`), generalized here into a broadcast channel so every long-running
//! task in the system (provider connections, the bot, future session transports) can `select!`
//! against the same signal without owning a reference to whichever task fires it.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Marker signal indicating a graceful shutdown has been requested.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize, Serialize,
)]
pub struct Shutdown;

/// Fires [`Shutdown`] to every subscriber exactly once. Cloning a handle and calling
/// [`ShutdownHandle::subscribe`] from each long-running task is the intended usage; calling
/// [`ShutdownHandle::trigger`] more than once is harmless (subsequent sends simply have no
/// additional effect beyond the first, since every receiver already observed the first one or
/// will on its next `recv`).
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<Shutdown>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Shutdown> {
        self.tx.subscribe()
    }

    /// Broadcasts [`Shutdown`] to every current subscriber. A receiver side with no active
    /// subscribers yet (e.g. `trigger` racing ahead of `subscribe`) is not an error — there was
    /// simply nothing to notify.
    pub fn trigger(&self) {
        let _ = self.tx.send(Shutdown);
    }

    /// Waits for the `SIGINT`/Ctrl-C signal and triggers shutdown when it arrives.
    pub async fn trigger_on_ctrl_c(self) {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt, triggering shutdown");
            self.trigger();
        }
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_all_observe_trigger() {
        let handle = ShutdownHandle::new();
        let mut a = handle.subscribe();
        let mut b = handle.subscribe();

        handle.trigger();

        assert_eq!(a.recv().await.unwrap(), Shutdown);
        assert_eq!(b.recv().await.unwrap(), Shutdown);
    }
}
