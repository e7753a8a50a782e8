//! Per-event dispatch: validate, run the handler, post the correlated reply.
//!
//! Handling one event happens in two phases:
//!
//! ```text
//! accept()    synchronous, in arrival order
//!             origin check → payload check → name → handler slot lookup
//! complete()  asynchronous, one task per request
//!             call handler → await it → post {name:"done", source, result|error}
//! ```
//!
//! Splitting the phases lets the listener validate events strictly in order
//! while slow handlers run concurrently.  Replies of overlapping requests may
//! therefore be posted out of arrival order.
//!
//! No application code runs in `accept()`.  The handler is called from
//! `complete()`, behind `catch_unwind`, so a panicking handler costs one
//! error reply and never the listener itself.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cantoo_core::{decode_request, MessageError, OriginPolicy, OutgoingMessage, RequestKind};
use futures_util::FutureExt;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::application::handlers::{HandlerCall, HandlerRegistry};
use crate::application::port::{ChannelError, MessageEvent, MessagePort};

/// Errors surfaced by the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A request arrived for a handler slot that was never filled.
    #[error("no handler registered for {0}")]
    HandlerMissing(RequestKind),

    /// The request name is known but its fields are not usable.
    #[error("invalid {kind} request: {reason}")]
    InvalidRequest { kind: RequestKind, reason: String },

    /// A registered handler returned an error.
    #[error("{kind} handler failed: {reason}")]
    HandlerFailed { kind: RequestKind, reason: String },

    /// A registered handler panicked.
    #[error("{0} handler panicked")]
    HandlerPanicked(RequestKind),

    /// Posting a message failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// What happened to one accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler succeeded.  `replied` is `false` when the event had no
    /// reply channel or posting the reply failed.
    Completed { replied: bool },
    /// The request was invalid, or its handler failed, panicked, or was
    /// never registered.
    Failed { replied: bool },
}

/// Shared, mutable handler slots.
pub type SharedHandlers = Arc<Mutex<HandlerRegistry>>;

/// Locks the handler slots, recovering from a poisoned lock.
///
/// The registry only holds `Option<Arc<..>>` fields, so a panic while it was
/// locked cannot leave it half-updated.
pub fn lock_handlers(handlers: &SharedHandlers) -> MutexGuard<'_, HandlerRegistry> {
    handlers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Validates inbound events and turns them into [`PendingReply`] values.
#[derive(Clone)]
pub struct Dispatcher {
    policy: Arc<OriginPolicy>,
    handlers: SharedHandlers,
}

impl Dispatcher {
    pub fn new(policy: OriginPolicy, handlers: SharedHandlers) -> Self {
        Self {
            policy: Arc::new(policy),
            handlers,
        }
    }

    /// Synchronous phase: validates `event` and resolves its handler.
    ///
    /// Returns `None` when the event is dropped.  Drops are logged here:
    /// rejected origins at `debug` (foreign frames post messages all the
    /// time), malformed payloads and unknown names at `error`.  A request
    /// with a known name but unusable fields is not dropped: it is returned
    /// so that the sender gets an error reply.
    pub fn accept(&self, event: MessageEvent) -> Option<PendingReply> {
        let MessageEvent {
            origin,
            data,
            source,
        } = event;

        let (kind, handler) = match decode_request(origin.as_deref(), data.as_ref(), &self.policy)
        {
            Ok(request) => {
                let kind = request.kind();
                // The lock is held only while the slot's `Arc` is cloned.
                let handler = lock_handlers(&self.handlers).prepare(request);
                (kind, handler)
            }
            Err(MessageError::RejectedOrigin { origin }) => {
                debug!("ignoring message from disallowed origin {origin:?}");
                return None;
            }
            Err(MessageError::InvalidRequest { kind, reason, .. }) => {
                (kind, Err(BridgeError::InvalidRequest { kind, reason }))
            }
            Err(e) => {
                error!("{e}");
                return None;
            }
        };

        let origin = origin.unwrap_or_default();
        debug!("dispatching {kind} from {origin}");

        Some(PendingReply {
            kind,
            origin,
            // Every accepted event had a payload with a recognised name.
            payload: data.unwrap_or(Value::Null),
            reply_to: source,
            handler,
        })
    }
}

/// An accepted request whose handler has not been called yet.
pub struct PendingReply {
    kind: RequestKind,
    origin: String,
    payload: Value,
    reply_to: Option<Arc<dyn MessagePort>>,
    handler: Result<HandlerCall, BridgeError>,
}

impl PendingReply {
    /// The request being served.
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Asynchronous phase: runs the handler and posts the `done` reply.
    pub async fn complete(self) -> DispatchOutcome {
        let PendingReply {
            kind,
            origin,
            payload,
            reply_to,
            handler,
        } = self;

        let outcome = match handler {
            Ok(call) => run_guarded(call).await,
            Err(e) => Err(e),
        };

        let (reply, succeeded) = match outcome {
            Ok(result) => (OutgoingMessage::done(payload, result), true),
            Err(e) => {
                error!("{e} (request from {origin})");
                (OutgoingMessage::failed(payload, e.to_string()), false)
            }
        };

        let replied = match reply_to {
            Some(port) => match port.post_message(&reply) {
                Ok(()) => true,
                Err(e) => {
                    warn!("could not reply to {kind} from {origin}: {e}");
                    false
                }
            },
            None => {
                debug!("{kind} from {origin} has no reply channel");
                false
            }
        };

        if succeeded {
            DispatchOutcome::Completed { replied }
        } else {
            DispatchOutcome::Failed { replied }
        }
    }
}

/// Calls the handler and awaits it, turning errors and panics into
/// [`BridgeError`] values.
async fn run_guarded(call: HandlerCall) -> Result<Option<Value>, BridgeError> {
    let kind = call.kind();

    // The synchronous part of the callback runs here, before the first poll.
    let Ok(future) = panic::catch_unwind(AssertUnwindSafe(|| call.start())) else {
        return Err(BridgeError::HandlerPanicked(kind));
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result.map_err(|e| BridgeError::HandlerFailed {
            kind,
            reason: format!("{e:#}"),
        }),
        Err(_) => Err(BridgeError::HandlerPanicked(kind)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
