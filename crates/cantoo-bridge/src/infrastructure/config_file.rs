//! Optional TOML configuration file.
//!
//! Every field may be omitted; missing fields fall back to the same defaults
//! as [`BridgeConfig::default`].  Example:
//!
//! ```toml
//! [server]
//! bind_address = "127.0.0.1"
//! port = 24810
//!
//! [origin]
//! scheme = "https"
//! subdomains = ["develop", "preprod"]
//! domain = "cantoo.fr"
//! ```
//!
//! The `[origin]` table replaces the allowlist as a whole, so a staging setup
//! can point the bridge at its own domain without rebuilding.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use cantoo_core::OriginPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{BridgeConfig, DEFAULT_WS_BIND, DEFAULT_WS_PORT};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `server.bind_address` is not an IP address.
    #[error("invalid bind address: {0:?}")]
    InvalidAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level layout of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub origin: OriginPolicy,
}

/// Where the WebSocket listener for host windows binds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSection {
    /// IP address to bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_address() -> String {
    DEFAULT_WS_BIND.to_string()
}
fn default_port() -> u16 {
    DEFAULT_WS_PORT
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl ConfigFile {
    /// Converts the file contents into a [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `server.bind_address` does
    /// not parse as an IP address.
    pub fn into_bridge_config(self) -> Result<BridgeConfig, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.server.bind_address.clone()))?;

        Ok(BridgeConfig {
            ws_bind_addr: SocketAddr::new(ip, self.server.port),
            origin_policy: self.origin,
        })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses configuration from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed or a field has the
/// wrong type.
pub fn parse_config(text: &str) -> Result<ConfigFile, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Reads and parses the configuration file at `path`.
///
/// Unlike a default config location, an explicitly named file must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if its content is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_default_bridge_config() {
        // Arrange / Act
        let cfg = parse_config("").unwrap().into_bridge_config().unwrap();

        // Assert
        assert_eq!(cfg, BridgeConfig::default());
    }

    #[test]
    fn test_server_section_overrides_address() {
        let text = r#"
            [server]
            bind_address = "0.0.0.0"
            port = 9001
        "#;

        let cfg = parse_config(text).unwrap().into_bridge_config().unwrap();

        assert_eq!(cfg.ws_bind_addr, "0.0.0.0:9001".parse().unwrap());
        assert_eq!(cfg.origin_policy, OriginPolicy::default());
    }

    #[test]
    fn test_partial_server_section_keeps_default_port() {
        let text = r#"
            [server]
            bind_address = "::1"
        "#;

        let cfg = parse_config(text).unwrap().into_bridge_config().unwrap();

        assert_eq!(cfg.ws_bind_addr.port(), DEFAULT_WS_PORT);
        assert!(cfg.ws_bind_addr.is_ipv6());
    }

    #[test]
    fn test_origin_section_replaces_allowlist() {
        // Arrange
        let text = r#"
            [origin]
            scheme = "http"
            subdomains = []
            domain = "localhost"
        "#;

        // Act
        let cfg = parse_config(text).unwrap().into_bridge_config().unwrap();

        // Assert
        assert!(cfg.origin_policy.is_allowed("http://localhost:8080"));
        assert!(!cfg.origin_policy.is_allowed("https://cantoo.fr"));
    }

    #[test]
    fn test_partial_origin_section_keeps_other_defaults() {
        let text = r#"
            [origin]
            domain = "cantoo.test"
        "#;

        let cfg = parse_config(text).unwrap().into_bridge_config().unwrap();

        assert!(cfg.origin_policy.is_allowed("https://develop.cantoo.test"));
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let text = r#"
            [server]
            bind_address = "not-an-ip"
        "#;

        let result = parse_config(text).unwrap().into_bridge_config();

        assert!(matches!(result, Err(ConfigError::InvalidAddress(addr)) if addr == "not-an-ip"));
    }

    #[test]
    fn test_wrong_field_type_is_a_parse_error() {
        let result = parse_config("[server]\nport = \"high\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join(format!("cantoo-missing-{}.toml", uuid::Uuid::new_v4()));

        let result = load_config(&path);

        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_config_reads_file_from_disk() {
        // Arrange
        let path = std::env::temp_dir().join(format!("cantoo-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[server]\nport = 4242\n").unwrap();

        // Act
        let result = load_config(&path);
        std::fs::remove_file(&path).unwrap();

        // Assert
        assert_eq!(result.unwrap().server.port, 4242);
    }
}
