//! In-process window: both ends of the message channel in one process.
//!
//! [`local_window`] returns the client-side [`LocalWindow`] (handed to a
//! `MessageBridge`) and the host-side [`HostHandle`].  The host handle plays
//! the part of the parent frame: it dispatches message events to the window's
//! listeners and observes what the client posts.
//!
//! ```text
//!  HostHandle::send()        ──► listeners of LocalWindow
//!  LocalWindow::post_message ──► HostHandle::next_posted()   (global posts)
//!  event.source.post_message ──► HostHandle::next_reply()    (correlated replies)
//! ```
//!
//! Messages are stored in their encoded JSON form, exactly as the host would
//! see them on the wire.

use std::sync::Arc;

use cantoo_core::{encode_message, OutgoingMessage};
use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::application::port::{
    ChannelError, MessageEvent, MessagePort, MessageWindow, Subscription,
};
use crate::infrastructure::listeners::ListenerTable;

/// Creates a connected window / host pair.
pub fn local_window() -> (Arc<LocalWindow>, HostHandle) {
    let listeners = ListenerTable::new();
    let (posted_tx, posted_rx) = unbounded_channel();
    let (reply_tx, reply_rx) = unbounded_channel();

    let window = Arc::new(LocalWindow {
        listeners: listeners.clone(),
        posted: posted_tx,
    });

    let host = HostHandle {
        listeners,
        posted: posted_rx,
        replies: reply_rx,
        reply_port: Arc::new(QueuePort { tx: reply_tx }),
    };

    (window, host)
}

/// The client side of an in-process window.
pub struct LocalWindow {
    listeners: ListenerTable,
    posted: UnboundedSender<Value>,
}

impl MessagePort for LocalWindow {
    fn post_message(&self, message: &OutgoingMessage) -> Result<(), ChannelError> {
        let value = encode_message(message)?;
        self.posted.send(value).map_err(|_| ChannelError::Closed)
    }
}

impl MessageWindow for LocalWindow {
    fn subscribe(&self) -> Subscription {
        self.listeners.subscribe()
    }
}

/// A port that queues encoded messages on a channel.
struct QueuePort {
    tx: UnboundedSender<Value>,
}

impl MessagePort for QueuePort {
    fn post_message(&self, message: &OutgoingMessage) -> Result<(), ChannelError> {
        let value = encode_message(message)?;
        self.tx.send(value).map_err(|_| ChannelError::Closed)
    }
}

/// The host side of an in-process window.
pub struct HostHandle {
    listeners: ListenerTable,
    posted: UnboundedReceiver<Value>,
    replies: UnboundedReceiver<Value>,
    reply_port: Arc<QueuePort>,
}

impl HostHandle {
    /// Sends `data` from `origin` with a reply channel back to this host.
    ///
    /// Returns the number of listeners the event reached.
    pub fn send(&self, origin: &str, data: Value) -> usize {
        let event = MessageEvent::new(Some(origin.to_string()), Some(data))
            .with_source(Arc::clone(&self.reply_port) as Arc<dyn MessagePort>);
        self.dispatch(event)
    }

    /// Sends an arbitrary event, e.g. one without origin, payload, or source.
    pub fn dispatch(&self, event: MessageEvent) -> usize {
        self.listeners.deliver(&event)
    }

    /// Number of listeners currently registered on the window.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Waits for the next message the client posted to the window.
    pub async fn next_posted(&mut self) -> Option<Value> {
        self.posted.recv().await
    }

    /// Waits for the next reply sent through an event's reply channel.
    pub async fn next_reply(&mut self) -> Option<Value> {
        self.replies.recv().await
    }

    /// Returns a posted message if one is already queued.
    pub fn try_next_posted(&mut self) -> Option<Value> {
        self.posted.try_recv().ok()
    }

    /// Returns a reply if one is already queued.
    pub fn try_next_reply(&mut self) -> Option<Value> {
        self.replies.try_recv().ok()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
