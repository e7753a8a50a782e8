//! Cantoo bridge demo application: entry point.
//!
//! A minimal embedded application that keeps one text document in memory
//! and exposes it to host windows through a [`MessageBridge`].  Host windows
//! connect over WebSocket; the `Origin` header of the handshake is checked
//! against the allowlist exactly like a browser `message` event origin.
//!
//! # Usage
//!
//! ```text
//! cantoo-bridge [OPTIONS]
//!
//! Options:
//!   --ws-bind <IP>      Interface to listen on       [default: 127.0.0.1]
//!   --ws-port <PORT>    Port to listen on            [default: 24810]
//!   --config  <PATH>    TOML configuration file
//!   --doc     <TEXT>    Initial document content     [default: untitled]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable         | Description                 |
//! |------------------|-----------------------------|
//! | `CANTOO_WS_BIND` | WebSocket listener address  |
//! | `CANTOO_WS_PORT` | WebSocket listener port     |
//! | `CANTOO_CONFIG`  | Path of the TOML config     |
//!
//! Settings are layered: built-in defaults, then the config file, then CLI
//! arguments (or their environment variables).

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use cantoo_bridge::application::MessageBridge;
use cantoo_bridge::domain::BridgeConfig;
use cantoo_bridge::infrastructure::{bind, load_config, run_host_server, WsWindow};
use cantoo_core::DocumentPayload;
use clap::Parser;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Demo embedded application for the Cantoo message bridge.
#[derive(Debug, Parser)]
#[command(
    name = "cantoo-bridge",
    about = "Demo embedded application speaking the Cantoo window message protocol",
    version
)]
struct Cli {
    /// IP address to bind the WebSocket listener to.
    #[arg(long, env = "CANTOO_WS_BIND")]
    ws_bind: Option<String>,

    /// TCP port host windows connect to.
    #[arg(long, env = "CANTOO_WS_PORT")]
    ws_port: Option<u16>,

    /// TOML configuration file.  Values given on the command line win.
    #[arg(long, env = "CANTOO_CONFIG")]
    config: Option<PathBuf>,

    /// Initial content of the in-memory document.
    #[arg(long, default_value = "untitled")]
    doc: String,
}

impl Cli {
    /// Builds the effective [`BridgeConfig`]: defaults, then the config file,
    /// then command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or `--ws-bind` is
    /// not a valid IP address.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config {}", path.display()))?
                .into_bridge_config()
                .with_context(|| format!("invalid config {}", path.display()))?,
            None => BridgeConfig::default(),
        };

        if let Some(bind) = &self.ws_bind {
            let ip: IpAddr = bind
                .parse()
                .with_context(|| format!("invalid WebSocket bind address: '{bind}'"))?;
            config.ws_bind_addr.set_ip(ip);
        }
        if let Some(port) = self.ws_port {
            config.ws_bind_addr.set_port(port);
        }

        Ok(config)
    }
}

// ── Demo document ─────────────────────────────────────────────────────────────

/// Renders `text` as a small SVG card.
fn render_preview(text: &str) -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"400\" height=\"100\">\
         <text x=\"10\" y=\"50\">{}</text></svg>",
        escape_xml(text)
    )
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Registers the three request handlers against a shared in-memory document.
fn register_handlers(bridge: &MessageBridge, document: Arc<Mutex<String>>) {
    let current = Arc::clone(&document);
    bridge.on_document_request(move || {
        let current = Arc::clone(&current);
        async move {
            let doc = current.lock().await.clone();
            let svg = render_preview(&doc);
            Ok(DocumentPayload::with_svg(doc, svg))
        }
    });

    let target = Arc::clone(&document);
    bridge.on_load_document_request(move |doc| {
        let target = Arc::clone(&target);
        async move {
            info!("loading document ({} bytes)", doc.len());
            *target.lock().await = doc;
            Ok(())
        }
    });

    bridge.on_clear_request(move || {
        let document = Arc::clone(&document);
        async move {
            info!("clearing document");
            document.lock().await.clear();
            Ok(())
        }
    });
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `RUST_LOG` controls verbosity; `info` when absent or invalid.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let initial_doc = cli.doc.clone();
    let config = cli.into_bridge_config()?;
    let ws_bind_addr: SocketAddr = config.ws_bind_addr;

    info!("Cantoo bridge demo starting, ws={ws_bind_addr}");

    let listener = bind(ws_bind_addr).await?;
    let window = Arc::new(WsWindow::new());
    let running = Arc::new(AtomicBool::new(true));

    let server = tokio::spawn(run_host_server(
        listener,
        Arc::clone(&window),
        Arc::clone(&running),
    ));

    let bridge = MessageBridge::new(window, config.origin_policy);
    register_handlers(&bridge, Arc::new(Mutex::new(initial_doc)));
    bridge.loaded().context("failed to announce load")?;

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
    }

    // Order matters: `destroyed` is queued on every session first, then the
    // accept loop stops and flushes those queues before closing the sockets.
    // Awaiting the server keeps the runtime alive until that flush is done.
    bridge.destroy().context("failed to announce shutdown")?;
    running.store(false, Ordering::Relaxed);
    server.await.context("host server task panicked")??;

    info!("Cantoo bridge demo stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
