//! Application layer for cantoo-bridge.
//!
//! The application layer knows *what* to do with a message event, but
//! delegates *how* events arrive and replies leave to the infrastructure
//! layer, through the [`MessagePort`] / [`MessageWindow`] traits.
//!
//! # Responsibilities
//!
//! - Holding the three handler slots ([`HandlerRegistry`])
//! - Validating inbound events and dispatching them ([`Dispatcher`])
//! - Owning the window subscription and the outbound notifications
//!   ([`MessageBridge`])
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or accepting connections (that is infrastructure)
//! - WebSocket framing (handled by tokio-tungstenite)
//! - JSON shapes of the messages (that is `cantoo-core`)

pub mod bridge;
pub mod dispatch;
pub mod handlers;
pub mod port;

// Re-export so callers can write `application::MessageBridge` instead of
// `application::bridge::MessageBridge`.
pub use bridge::MessageBridge;
pub use dispatch::{BridgeError, DispatchOutcome, Dispatcher, PendingReply};
pub use handlers::{HandlerCall, HandlerFuture, HandlerRegistry};
pub use port::{ChannelError, ListenerGuard, MessageEvent, MessagePort, MessageWindow, Subscription};
