//! [`MessageBridge`]: the object an embedded application holds for its whole
//! lifetime.
//!
//! # Lifecycle
//!
//! ```text
//! MessageBridge::new()  ──►  Active  ──destroy()──►  Destroyed
//!                            │  on_*_request()   register handlers
//!                            │  loaded()         {name:"loaded"}
//!                            │  changed()        {name:"documentChange"}
//!                            └─ listener task    validate + dispatch + reply
//! ```
//!
//! `destroy()` consumes the bridge, so there is no way back to Active and no
//! way to post through a destroyed bridge.

use std::future::Future;
use std::sync::{Arc, Mutex};

use cantoo_core::{DocumentPayload, OriginPolicy, OutgoingMessage, RequestKind};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::application::dispatch::{lock_handlers, BridgeError, Dispatcher, SharedHandlers};
use crate::application::handlers::HandlerRegistry;
use crate::application::port::{ListenerGuard, MessageWindow};

/// Messaging adapter between an embedded application and its host window.
///
/// # Example
///
/// ```no_run
/// use cantoo_bridge::application::MessageBridge;
/// use cantoo_bridge::infrastructure::local_window;
/// use cantoo_core::{DocumentPayload, OriginPolicy};
///
/// # async fn example() -> anyhow::Result<()> {
/// let (window, _host) = local_window();
/// let bridge = MessageBridge::new(window, OriginPolicy::default());
/// bridge.on_document_request(|| async { Ok(DocumentPayload::with_svg("doc", "<svg/>")) });
/// bridge.loaded()?;
/// // ...
/// bridge.destroy()?;
/// # Ok(())
/// # }
/// ```
pub struct MessageBridge {
    window: Arc<dyn MessageWindow>,
    handlers: SharedHandlers,
    guard: Option<ListenerGuard>,
    listener: Option<JoinHandle<()>>,
}

impl MessageBridge {
    /// Subscribes to `window` and starts the listener task.
    ///
    /// No handlers are registered yet; requests arriving before registration
    /// are answered with an error reply.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(window: Arc<dyn MessageWindow>, policy: OriginPolicy) -> Self {
        let handlers: SharedHandlers = Arc::new(Mutex::new(HandlerRegistry::new()));
        let dispatcher = Dispatcher::new(policy, Arc::clone(&handlers));

        let (mut events, guard) = window.subscribe().split();
        let listener_id = guard.id();
        info!("message bridge listening (listener {listener_id})");

        let listener = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Some(pending) = dispatcher.accept(event) {
                    // Each request completes on its own task so a slow handler
                    // does not hold up validation of later events.
                    let kind = pending.kind();
                    tokio::spawn(async move {
                        let outcome = pending.complete().await;
                        debug!("{kind} request finished: {outcome:?}");
                    });
                }
            }
            debug!("listener {listener_id} stopped");
        });

        Self {
            window,
            handlers,
            guard: Some(guard),
            listener: Some(listener),
        }
    }

    /// Registers the handler producing the document and its illustration
    /// when the host asks for them (`wantDocument`).
    pub fn on_document_request<F, Fut>(&self, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<DocumentPayload>> + Send + 'static,
    {
        lock_handlers(&self.handlers).set_document_provider(handler);
    }

    /// Registers the handler that discards the current state and prepares a
    /// new empty one (`clear`).  It should resolve once the new document is
    /// ready.
    pub fn on_clear_request<F, Fut>(&self, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        lock_handlers(&self.handlers).set_clearer(handler);
    }

    /// Registers the handler that loads a document (`openDocument`).
    ///
    /// The string is whatever the document provider returned in
    /// [`DocumentPayload::doc`].  It should resolve once the document is fully
    /// loaded.
    pub fn on_load_document_request<F, Fut>(&self, handler: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        lock_handlers(&self.handlers).set_loader(handler);
    }

    /// Whether a handler is registered for `kind`.
    pub fn has_handler(&self, kind: RequestKind) -> bool {
        lock_handlers(&self.handlers).is_registered(kind)
    }

    /// Tells the host the application is fully loaded.
    pub fn loaded(&self) -> Result<(), BridgeError> {
        self.post(&OutgoingMessage::Loaded)
    }

    /// Tells the host the application state changed in a way the user might
    /// want to save.
    pub fn changed(&self) -> Result<(), BridgeError> {
        self.post(&OutgoingMessage::DocumentChange)
    }

    /// Removes the listener, then tells the host the bridge is gone.
    ///
    /// Handlers already running are not cancelled; their replies are still
    /// posted when they finish.
    pub fn destroy(mut self) -> Result<(), BridgeError> {
        self.release();
        self.post(&OutgoingMessage::Destroyed)?;
        info!("message bridge destroyed");
        Ok(())
    }

    fn post(&self, message: &OutgoingMessage) -> Result<(), BridgeError> {
        debug!("posting {}", message.wire_name());
        self.window.post_message(message)?;
        Ok(())
    }

    fn release(&mut self) {
        // Dropping the guard removes the listener from the window right away;
        // aborting the task discards events that were already queued.
        if let Some(guard) = self.guard.take() {
            debug!("removing listener {}", guard.id());
        }
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl Drop for MessageBridge {
    fn drop(&mut self) {
        self.release();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::local_window;

    #[tokio::test]
    async fn test_new_bridge_has_no_handlers() {
        let (window, _host) = local_window();
        let bridge = MessageBridge::new(window, OriginPolicy::default());
        for kind in RequestKind::ALL {
            assert!(!bridge.has_handler(kind));
        }
    }

    #[tokio::test]
    async fn test_registration_fills_matching_slot_only() {
        let (window, _host) = local_window();
        let bridge = MessageBridge::new(window, OriginPolicy::default());

        bridge.on_clear_request(|| async { Ok(()) });

        assert!(bridge.has_handler(RequestKind::Clear));
        assert!(!bridge.has_handler(RequestKind::WantDocument));
        assert!(!bridge.has_handler(RequestKind::OpenDocument));
    }

    #[tokio::test]
    async fn test_bridge_subscribes_exactly_once() {
        let (window, host) = local_window();
        let _bridge = MessageBridge::new(window, OriginPolicy::default());
        assert_eq!(host.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_dropping_bridge_removes_listener() {
        // Arrange
        let (window, host) = local_window();
        let bridge = MessageBridge::new(window, OriginPolicy::default());

        // Act
        drop(bridge);

        // Assert: nothing is posted on drop, but the listener is gone
        assert_eq!(host.listener_count(), 0);
    }
}
