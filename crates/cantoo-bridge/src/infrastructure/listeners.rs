//! Listener bookkeeping shared by every window implementation.
//!
//! A window delivers each inbound event to all of its listeners, the same way
//! a browser calls every `message` event listener registered on `window`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::debug;
use uuid::Uuid;

use crate::application::port::{ListenerGuard, MessageEvent, Subscription};

type Senders = HashMap<Uuid, UnboundedSender<MessageEvent>>;

/// The set of active listeners of one window.
///
/// Cloning shares the same set.
#[derive(Clone, Default)]
pub struct ListenerTable {
    inner: Arc<Mutex<Senders>>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener.  It is removed when the returned subscription's guard
    /// is dropped.
    pub fn subscribe(&self) -> Subscription {
        // Each listener gets its own unbounded channel: delivery happens on
        // the reader task and must never wait for a slow listener.
        let id = Uuid::new_v4();
        let (tx, rx) = unbounded_channel();
        lock(&self.inner).insert(id, tx);
        debug!("listener {id} added");

        // A weak reference lets a guard outlive its window without keeping
        // the table alive.
        let table = Arc::downgrade(&self.inner);
        let guard = ListenerGuard::new(id, move || {
            // `None` means the window is already gone, so there is nothing
            // left to remove from.
            if let Some(table) = table.upgrade() {
                if lock(&table).remove(&id).is_some() {
                    debug!("listener {id} removed");
                }
            }
        });

        Subscription::new(rx, guard)
    }

    /// Hands `event` to every listener and returns how many received it.
    ///
    /// Listeners whose receiving side is gone are pruned on the way.
    pub fn deliver(&self, event: &MessageEvent) -> usize {
        // The lock is held across the whole pass so a listener added or
        // removed concurrently is either fully in or fully out.  `send` on an
        // unbounded channel never blocks, so holding it is short.
        let mut senders = lock(&self.inner);
        // A failed send means the receiver was dropped without dropping the
        // guard; forget that listener.
        senders.retain(|_, tx| tx.send(event.clone()).is_ok());
        senders.len()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Locks the table, recovering from poisoning: a panic elsewhere leaves the
/// map itself consistent.
fn lock(senders: &Mutex<Senders>) -> MutexGuard<'_, Senders> {
    senders.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
