//! cantoo-bridge library crate.
//!
//! Lets an embedded document-editing application exchange messages with the
//! host window that embeds it: the host asks for, loads, or clears the
//! document; the application announces that it loaded, that the document
//! changed, and that it is going away.
//!
//! # Architecture
//!
//! ```text
//! Host window (JSON messages tagged by origin)
//!         ↕
//! [cantoo-bridge]
//!   ├── domain/           BridgeConfig
//!   ├── application/      MessageBridge, handler registry, dispatcher,
//!   │                     the MessagePort / MessageWindow seam
//!   └── infrastructure/
//!         ├── local_window/ in-process window with a host handle
//!         ├── ws_server/    hosts connected over WebSocket
//!         └── config_file/  optional TOML configuration
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` depends on `domain` and `cantoo-core`, and reaches the
//!   outside world only through the traits in `application::port`.
//! - `infrastructure` implements those traits with `tokio` and `tungstenite`.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: the message bridge and its dispatch logic.
pub mod application;

/// Infrastructure layer: concrete windows and config loading.
pub mod infrastructure;
