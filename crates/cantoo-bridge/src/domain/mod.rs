//! Domain layer for cantoo-bridge.
//!
//! Pure configuration types with no dependencies on I/O, sockets, or a
//! runtime.  The message vocabulary itself lives in `cantoo-core`, shared
//! with anything else that speaks the protocol.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading

pub mod config;

pub use config::BridgeConfig;
