//! Sender-origin allowlist.
//!
//! Every inbound message carries the origin of the window that sent it
//! (`scheme://host[:port]`).  Only the Cantoo hosts are allowed to drive the
//! embedded application:
//!
//! ```text
//! https://cantoo.fr
//! https://develop.cantoo.fr
//! https://preprod.cantoo.fr
//! ```
//!
//! The check is a prefix match equivalent to
//! `^https://(develop\.|preprod\.)?cantoo\.fr`, not a general origin parser.

use serde::{Deserialize, Serialize};

/// Scheme every accepted origin must use.
pub const DEFAULT_SCHEME: &str = "https";
/// Registered domain of the host application.
pub const DEFAULT_DOMAIN: &str = "cantoo.fr";
/// Deployment subdomains allowed in front of [`DEFAULT_DOMAIN`].
pub const DEFAULT_SUBDOMAINS: [&str; 2] = ["develop", "preprod"];

/// Decides which sender origins may talk to the bridge.
///
/// # Example
///
/// ```rust
/// use cantoo_core::OriginPolicy;
///
/// let policy = OriginPolicy::default();
/// assert!(policy.is_allowed("https://preprod.cantoo.fr"));
/// assert!(!policy.is_allowed("http://cantoo.fr"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginPolicy {
    /// Required scheme, without `://`.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Optional single-label prefixes allowed in front of `domain`.
    #[serde(default = "default_subdomains")]
    pub subdomains: Vec<String>,

    /// Domain the rest of the origin must start with.
    #[serde(default = "default_domain")]
    pub domain: String,
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            subdomains: default_subdomains(),
            domain: default_domain(),
        }
    }
}

impl OriginPolicy {
    /// Returns `true` when `origin` is non-empty and matches the allowlist.
    pub fn is_allowed(&self, origin: &str) -> bool {
        if origin.is_empty() {
            return false;
        }

        let Some(rest) = origin
            .strip_prefix(self.scheme.as_str())
            .and_then(|rest| rest.strip_prefix("://"))
        else {
            return false;
        };

        // At most one deployment prefix is removed.
        let host = self
            .subdomains
            .iter()
            .find_map(|sub| {
                rest.strip_prefix(sub.as_str())
                    .and_then(|after| after.strip_prefix('.'))
            })
            .unwrap_or(rest);

        host.starts_with(self.domain.as_str())
    }

    /// Same as [`is_allowed`](Self::is_allowed) for an origin that may be absent.
    pub fn accepts(&self, origin: Option<&str>) -> bool {
        origin.is_some_and(|o| self.is_allowed(o))
    }
}

fn default_scheme() -> String {
    DEFAULT_SCHEME.to_string()
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

fn default_subdomains() -> Vec<String> {
    DEFAULT_SUBDOMAINS.iter().map(|s| s.to_string()).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
