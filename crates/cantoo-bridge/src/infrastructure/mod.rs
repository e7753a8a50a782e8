//! Infrastructure layer for cantoo-bridge.
//!
//! The infrastructure layer provides the concrete windows a `MessageBridge`
//! talks through, and reads the optional configuration file.
//!
//! # Responsibilities
//!
//! - Keeping the listener set of a window ([`listeners`])
//! - An in-process window with a scriptable host side ([`local_window`])
//! - Accepting host windows over WebSocket ([`ws_server`])
//! - Loading TOML configuration ([`config_file`])
//!
//! # What does NOT belong here?
//!
//! - Origin and message validation (that is `cantoo-core`)
//! - Handler dispatch and the reply protocol (that is the application layer)

pub mod config_file;
pub mod listeners;
pub mod local_window;
pub mod ws_server;

pub use config_file::{load_config, ConfigError, ConfigFile};
pub use listeners::ListenerTable;
pub use local_window::{local_window, HostHandle, LocalWindow};
pub use ws_server::{bind, run_host_server, WsWindow};
