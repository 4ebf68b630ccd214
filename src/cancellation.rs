//! Cooperative cancellation signal threaded through a turn.
//!
//! Hand-rolled over `tokio::sync::watch` rather than pulling in `tokio-util`
//! for a single type (see DESIGN.md) — a `CancellationToken` is just a
//! watch channel over a `bool`, cheap to clone and check at every
//! suspension point per spec §5.

use tokio::sync::watch;

/// The caller-held half: call `cancel()` once to signal every clone of the
/// paired [`CancellationToken`].
#[derive(Debug, Clone)]
pub struct CancellationSource {
    sender: watch::Sender<bool>,
}

/// The callee-held half, passed through `RunOptions` into the execution
/// loop, provider adapters, and tool adapters. Cheap to clone; every clone
/// observes the same underlying signal.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    receiver: watch::Receiver<bool>,
}

/// Create a linked `(source, token)` pair. The turn caller keeps the
/// source and calls `cancel()`; the token is handed to `RunOptions`.
pub fn cancellation_pair() -> (CancellationSource, CancellationToken) {
    let (sender, receiver) = watch::channel(false);
    (CancellationSource { sender }, CancellationToken { receiver })
}

impl CancellationSource {
    /// Signal cancellation. Idempotent: calling it twice has no additional
    /// effect.
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

impl CancellationToken {
    /// A token that never cancels, for callers that don't need the feature.
    pub fn none() -> Self {
        let (_source, token) = cancellation_pair();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }
}
