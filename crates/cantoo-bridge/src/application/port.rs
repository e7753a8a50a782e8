//! The transport seam between the bridge and a window.
//!
//! In a browser, an embedded application talks to its host through the
//! global `message` channel: it *listens* for message events and *posts*
//! structured values.  Each inbound event carries the sender origin and,
//! optionally, a reference to the sending window that can be posted back to.
//!
//! This module models that contract with two traits:
//!
//! - [`MessagePort`] – something a message can be posted to (the global
//!   window, or the `source` of an inbound event).
//! - [`MessageWindow`] – a port that can also be subscribed to.
//!
//! Subscribing returns an owned [`Subscription`].  Its [`ListenerGuard`] half
//! removes the listener when dropped, so a listener can never outlive the
//! object that registered it.

use std::fmt;
use std::sync::Arc;

use cantoo_core::{MessageError, OutgoingMessage};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

/// Errors raised when posting a message.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The receiving side of the port is gone (window closed, socket dropped).
    #[error("message port is closed")]
    Closed,

    /// The message could not be encoded to JSON.
    #[error(transparent)]
    Encode(#[from] MessageError),
}

/// Something a message can be posted to.
///
/// Posting is fire-and-forget: the call returns once the message is queued,
/// not once the other side processed it.
pub trait MessagePort: Send + Sync {
    /// Queues `message` for delivery.
    fn post_message(&self, message: &OutgoingMessage) -> Result<(), ChannelError>;
}

/// A window: a port that also delivers inbound message events.
pub trait MessageWindow: MessagePort {
    /// Registers a new listener and returns its event stream.
    fn subscribe(&self) -> Subscription;
}

// ── Message events ────────────────────────────────────────────────────────────

/// One inbound message event: the transport envelope plus the payload.
#[derive(Clone)]
pub struct MessageEvent {
    /// Origin of the sending window, as reported by the transport.
    pub origin: Option<String>,
    /// Structured payload.  `None` when the sender posted nothing usable.
    pub data: Option<Value>,
    /// Reply channel back to the sender, when the transport provides one.
    pub source: Option<Arc<dyn MessagePort>>,
}

impl MessageEvent {
    /// Creates an event without a reply channel.
    pub fn new(origin: Option<String>, data: Option<Value>) -> Self {
        Self {
            origin,
            data,
            source: None,
        }
    }

    /// Attaches a reply channel.
    pub fn with_source(mut self, source: Arc<dyn MessagePort>) -> Self {
        self.source = Some(source);
        self
    }
}

impl fmt::Debug for MessageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEvent")
            .field("origin", &self.origin)
            .field("data", &self.data)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

// ── Subscriptions ─────────────────────────────────────────────────────────────

/// Removes a listener from its window when dropped.
pub struct ListenerGuard {
    id: Uuid,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerGuard {
    /// Creates a guard that runs `release` exactly once.
    pub fn new(id: Uuid, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            release: Some(Box::new(release)),
        }
    }

    /// Identifier of the guarded listener.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard").field("id", &self.id).finish()
    }
}

/// An active listener: the event stream plus the guard that ends it.
#[derive(Debug)]
pub struct Subscription {
    events: UnboundedReceiver<MessageEvent>,
    guard: ListenerGuard,
}

impl Subscription {
    pub fn new(events: UnboundedReceiver<MessageEvent>, guard: ListenerGuard) -> Self {
        Self { events, guard }
    }

    /// Identifier of this listener.
    pub fn id(&self) -> Uuid {
        self.guard.id()
    }

    /// Waits for the next event.  Returns `None` once the listener was removed.
    pub async fn recv(&mut self) -> Option<MessageEvent> {
        self.events.recv().await
    }

    /// Separates the event stream from the guard, so that one task can read
    /// events while another decides when the listener ends.
    pub fn split(self) -> (UnboundedReceiver<MessageEvent>, ListenerGuard) {
        (self.events, self.guard)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
