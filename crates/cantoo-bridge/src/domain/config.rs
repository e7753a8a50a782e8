//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is built from defaults, optionally overlaid with a TOML file (see
//! `infrastructure::config_file`) and finally with CLI arguments.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use cantoo_core::OriginPolicy;

/// Default TCP port host windows connect to.
pub const DEFAULT_WS_PORT: u16 = 24810;

/// Default interface the WebSocket listener binds to.
///
/// Loopback only: the host window normally runs on the same machine.
pub const DEFAULT_WS_BIND: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// All runtime configuration for the bridge.
///
/// # Example
///
/// ```rust
/// use cantoo_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.ws_bind_addr.port(), 24810);
/// assert!(cfg.origin_policy.is_allowed("https://cantoo.fr"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Address the WebSocket listener for host windows binds to.
    pub ws_bind_addr: SocketAddr,

    /// Which sender origins may drive the application.
    pub origin_policy: OriginPolicy,
}

impl Default for BridgeConfig {
    /// | Field          | Default                                        |
    /// |----------------|------------------------------------------------|
    /// | ws_bind_addr   | `127.0.0.1:24810`                              |
    /// | origin_policy  | the Cantoo allowlist (`OriginPolicy::default`) |
    fn default() -> Self {
        Self {
            ws_bind_addr: SocketAddr::new(DEFAULT_WS_BIND, DEFAULT_WS_PORT),
            origin_policy: OriginPolicy::default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ws_port_is_24810() {
        // Arrange / Act
        let cfg = BridgeConfig::default();
        // Assert
        assert_eq!(cfg.ws_bind_addr.port(), 24810);
    }

    #[test]
    fn test_default_bind_is_loopback() {
        let cfg = BridgeConfig::default();
        assert!(cfg.ws_bind_addr.ip().is_loopback());
    }

    #[test]
    fn test_default_policy_is_cantoo_allowlist() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.origin_policy, OriginPolicy::default());
    }

    #[test]
    fn test_config_custom_values() {
        let cfg = BridgeConfig {
            ws_bind_addr: "0.0.0.0:9000".parse().unwrap(),
            origin_policy: OriginPolicy {
                scheme: "http".to_string(),
                subdomains: vec![],
                domain: "localhost".to_string(),
            },
        };
        assert_eq!(cfg.ws_bind_addr.port(), 9000);
        assert!(cfg.origin_policy.is_allowed("http://localhost:3000"));
    }
}
