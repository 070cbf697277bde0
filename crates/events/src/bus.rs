//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes committed events to out-of-band consumers. It is:
//!
//! - **Non-blocking for publishers**: `publish` never waits on a consumer, so a
//!   request handler that commits a change is never slowed down by whatever
//!   reacts to it.
//! - **At-least-once**: consumers must be idempotent.
//! - **Not storage**: the stores are the source of truth; the bus only fans out.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

/// A subscription to an event stream.
///
/// Each subscription receives a copy of every message published after it was
/// created (broadcast semantics). Intended for a single consuming task.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: UnboundedReceiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: UnboundedReceiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message. Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Take a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<M> {
        self.receiver.try_recv().ok()
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// ```text
/// Service (commit to store) → EventBus::publish → Subscription → Worker
/// ```
///
/// `publish` failing means no subscriber could be reached; callers treat that
/// as a logged, non-fatal condition because the state change is already
/// committed.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
