//! WebSocket window: host windows connect over WebSocket instead of sharing a
//! browser frame tree.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming connections from host windows.
//! 3. Upgrading each connection to a WebSocket session, recording the
//!    handshake `Origin` header as the origin of every event on that session.
//! 4. Running two concurrent tasks per session:
//!    - **Host → Client**: reads JSON text frames and delivers them as
//!      message events, with the session itself as the reply channel.
//!    - **Client → Host**: writes replies and global posts as text frames.
//! 5. Stopping the accept loop when the `running` flag is cleared, then
//!    flushing and closing every open session.
//!
//! Global posts (`loaded`, `documentChange`, `destroyed`) are broadcast to
//! every connected host; `done` replies go only to the session that sent the
//! request.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use std::time::Duration;

use anyhow::Context;
use cantoo_core::{encode_message, OutgoingMessage};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::header::ORIGIN,
        Error as WsError, Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::port::{
    ChannelError, MessageEvent, MessagePort, MessageWindow, Subscription,
};
use crate::infrastructure::listeners::ListenerTable;

/// How often the accept loop wakes up to look at the `running` flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Upper bound on the time spent flushing open sessions at shutdown.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ── Window ────────────────────────────────────────────────────────────────────

/// Reply channel of one connected host session.
///
/// Posting only queues the value; the session's writer task turns it into a
/// text frame.
struct SessionPort {
    session_id: Uuid,
    tx: UnboundedSender<Value>,
}

impl MessagePort for SessionPort {
    fn post_message(&self, message: &OutgoingMessage) -> Result<(), ChannelError> {
        let value = encode_message(message)?;
        self.tx.send(value).map_err(|_| {
            debug!("session {}: writer is gone", self.session_id);
            ChannelError::Closed
        })
    }
}

/// A window whose host frames are WebSocket sessions.
pub struct WsWindow {
    listeners: ListenerTable,
    sessions: Mutex<HashMap<Uuid, Arc<SessionPort>>>,
    /// Flipped to `true` once; every session writer watches it.
    closing: watch::Sender<bool>,
}

impl Default for WsWindow {
    fn default() -> Self {
        Self {
            listeners: ListenerTable::new(),
            sessions: Mutex::new(HashMap::new()),
            closing: watch::Sender::new(false),
        }
    }
}

impl WsWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of host sessions currently connected.
    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    /// Asks every session to write out what is already queued, send a Close
    /// frame, and end.
    pub fn close_sessions(&self) {
        // `send_replace` stores the value even when no session is listening,
        // so sessions that finish their handshake later still see it.
        self.closing.send_replace(true);
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<SessionPort>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MessagePort for WsWindow {
    /// Broadcasts `message` to every connected host.
    ///
    /// Having no host connected is not an error: the browser equivalent is a
    /// frame posting to a parent that ignores it.
    fn post_message(&self, message: &OutgoingMessage) -> Result<(), ChannelError> {
        // Encode once; every session receives a clone of the same value.
        let value = encode_message(message)?;
        let sessions = self.sessions();
        if sessions.is_empty() {
            debug!("no host connected; {} not delivered", message.wire_name());
        }
        for port in sessions.values() {
            // A failed send means that session is shutting down; the others
            // still get the message.
            if port.tx.send(value.clone()).is_err() {
                debug!("session {}: dropped {}", port.session_id, message.wire_name());
            }
        }
        Ok(())
    }
}

impl MessageWindow for WsWindow {
    fn subscribe(&self) -> Subscription {
        self.listeners.subscribe()
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds the TCP listener host windows connect to.
///
/// # Errors
///
/// Returns an error if the address cannot be bound (e.g., the port is already
/// in use or the process lacks permission to bind).
pub async fn bind(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    // `TcpListener::bind` is the async equivalent of `bind()` + `listen()`.
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {addr}"))
}

/// Runs the accept loop until `running` is set to `false`.
///
/// Each accepted connection is handed off to a dedicated Tokio task so that
/// one slow host never blocks others.  On the way out, open sessions are
/// asked to flush and close, and the function waits (bounded by a short
/// timeout) until they did, so a final `destroyed` post reaches the hosts.
///
/// # Errors
///
/// Returns an error if the listener's local address cannot be read.
pub async fn run_host_server(
    listener: TcpListener,
    window: Arc<WsWindow>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let local_addr = listener
        .local_addr()
        .context("failed to read WebSocket listener address")?;
    info!("waiting for host windows on {local_addr}");

    // Session tasks are kept in a `JoinSet` so shutdown can wait for them.
    let mut session_tasks = JoinSet::new();

    loop {
        // Check the shutdown flag before each accept attempt.
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Reap sessions that already ended so the set does not grow forever.
        while session_tasks.try_join_next().is_some() {}

        // A short timeout lets the loop notice the shutdown flag even when no
        // host is connecting.  Without it the loop would block on `accept()`.
        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new connection from {peer_addr}");
                // Each session owns a handle to the shared window: it registers
                // itself as a reply target and delivers events to its listeners.
                let window = Arc::clone(&window);
                session_tasks.spawn(handle_host_session(stream, peer_addr, window));
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., too many open file descriptors).
                // Log it and keep accepting rather than stopping the server.
                error!("accept error: {e}");
            }
            Err(_) => {
                // No connection in the last poll interval; loop back to check
                // the `running` flag.
            }
        }
    }

    // ── Shutdown: flush and close open sessions ───────────────────────────────
    window.close_sessions();
    let drained = timeout(SESSION_DRAIN_TIMEOUT, async {
        while session_tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("host sessions did not close within {SESSION_DRAIN_TIMEOUT:?}; aborting them");
        session_tasks.abort_all();
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Top-level handler for a single host session.
///
/// Wraps [`run_session`] so the inner function can use `?` while the outcome
/// is logged here.
async fn handle_host_session(raw_stream: TcpStream, peer_addr: SocketAddr, window: Arc<WsWindow>) {
    match run_session(raw_stream, peer_addr, window).await {
        Ok(()) => info!("host session {peer_addr} closed"),
        Err(e) => warn!("host session {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of a single host session.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    window: Arc<WsWindow>,
) -> anyhow::Result<()> {
    // ── Step 1: Complete the handshake, capturing the Origin header ──────────
    //
    // `accept_hdr_async` hands the HTTP Upgrade request to the callback before
    // answering "101 Switching Protocols".  The browser sets `Origin` itself,
    // so it plays the role of a `message` event's origin.  A missing header
    // leaves the origin absent, which the allowlist rejects.
    let mut origin: Option<String> = None;
    let record_origin = |req: &Request, resp: Response| {
        origin = req
            .headers()
            .get(ORIGIN)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        Ok::<Response, ErrorResponse>(resp)
    };
    let ws_stream = accept_hdr_async(raw_stream, record_origin)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let session_id = Uuid::new_v4();
    info!(
        "host session {session_id} established from {peer_addr} (origin {})",
        origin.as_deref().unwrap_or("<none>")
    );

    // ── Step 2: Register the session as a reply target ───────────────────────
    //
    // Splitting gives independently owned read and write halves, one per task.
    // Outbound values go through a channel so that posting from any task
    // (the bridge, a handler's reply) never touches the socket directly.
    let (ws_tx, mut ws_rx) = ws_stream.split();
    let (out_tx, mut out_rx) = unbounded_channel::<Value>();
    let port = Arc::new(SessionPort {
        session_id,
        tx: out_tx,
    });
    window.sessions().insert(session_id, Arc::clone(&port));

    // ── Task A: Client → Host writer ─────────────────────────────────────────
    //
    // Forwards queued values as text frames until the host disconnects or the
    // window starts closing.  On close it writes out everything still queued
    // before sending a Close frame.
    let mut closing = window.closing.subscribe();
    let mut writer_task = tokio::spawn(async move {
        let mut ws_tx = ws_tx;
        loop {
            tokio::select! {
                // Queued messages win over the close signal.
                biased;

                next = out_rx.recv() => {
                    let Some(value) = next else { break };
                    if ws_tx.send(WsMessage::Text(value.to_string())).await.is_err() {
                        debug!("session {session_id}: send failed (host disconnected)");
                        break;
                    }
                }

                // A dropped sender means the window itself is gone: close too.
                _ = async { closing.wait_for(|closing| *closing).await.is_ok() } => {
                    while let Ok(value) = out_rx.try_recv() {
                        if ws_tx.send(WsMessage::Text(value.to_string())).await.is_err() {
                            break;
                        }
                    }
                    if let Err(e) = ws_tx.send(WsMessage::Close(None)).await {
                        debug!("session {session_id}: close frame not sent: {e}");
                    }
                    break;
                }
            }
        }
    });

    // ── Task B: Host → Client reader ─────────────────────────────────────────
    //
    // Reads frames from the host and delivers each text frame to every
    // listener of the window.  The session port travels with each event as its
    // `source`, so replies find their way back to this socket only.
    let listeners = window.listeners.clone();
    let reply_port: Arc<dyn MessagePort> = port;
    let mut reader_task = tokio::spawn(async move {
        loop {
            // `next()` returns `None` when the stream is closed.
            let frame = match ws_rx.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                    debug!("session {session_id}: closed");
                    break;
                }
                Some(Err(e)) => {
                    warn!("session {session_id}: WebSocket error: {e}");
                    break;
                }
                None => break,
            };

            match frame {
                WsMessage::Text(text) => {
                    // Text that is not JSON is delivered without a payload, so
                    // the dispatcher reports it as malformed.  The session
                    // stays open for the next message.
                    let data = match serde_json::from_str::<Value>(&text) {
                        Ok(value) => Some(value),
                        Err(e) => {
                            warn!("session {session_id}: invalid JSON from host: {e}");
                            None
                        }
                    };
                    let event = MessageEvent::new(origin.clone(), data)
                        .with_source(Arc::clone(&reply_port));
                    if listeners.deliver(&event) == 0 {
                        debug!("session {session_id}: no listener for inbound message");
                    }
                }
                WsMessage::Binary(_) => {
                    // The host protocol is JSON-only.
                    warn!("session {session_id}: unexpected binary frame (ignored)");
                }
                WsMessage::Close(_) => {
                    debug!("session {session_id}: close frame received");
                    break;
                }
                // tokio-tungstenite answers pings on its own.
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
            }
        }
    });

    // ── Step 3: The session ends when either direction ends ──────────────────
    //
    // `&mut` keeps ownership of both handles so the surviving task can be
    // aborted; otherwise a writer could outlive its socket.
    tokio::select! {
        _ = &mut writer_task => debug!("session {session_id}: writer ended"),
        _ = &mut reader_task => debug!("session {session_id}: reader ended"),
    }
    writer_task.abort();
    reader_task.abort();

    window.sessions().remove(&session_id);
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_without_hosts_is_not_an_error() {
        let window = WsWindow::new();
        assert!(window.post_message(&OutgoingMessage::Loaded).is_ok());
        assert_eq!(window.session_count(), 0);
    }

    #[tokio::test]
    async fn test_post_is_broadcast_to_every_session() {
        // Arrange: two fake sessions without sockets
        let window = WsWindow::new();
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        for tx in [tx_a, tx_b] {
            let session_id = Uuid::new_v4();
            window
                .sessions()
                .insert(session_id, Arc::new(SessionPort { session_id, tx }));
        }

        // Act
        window.post_message(&OutgoingMessage::DocumentChange).unwrap();

        // Assert
        assert_eq!(rx_a.recv().await, Some(json!({"name": "documentChange"})));
        assert_eq!(rx_b.recv().await, Some(json!({"name": "documentChange"})));
    }

    #[test]
    fn test_session_port_reports_closed_writer() {
        let (tx, rx) = unbounded_channel();
        drop(rx);
        let port = SessionPort {
            session_id: Uuid::new_v4(),
            tx,
        };

        let result = port.post_message(&OutgoingMessage::Loaded);

        assert!(matches!(result, Err(ChannelError::Closed)));
    }

    #[test]
    fn test_subscribe_registers_listener() {
        let window = WsWindow::new();
        let _sub = window.subscribe();
        assert_eq!(window.listeners.len(), 1);
    }

    #[test]
    fn test_close_signal_is_seen_by_late_subscribers() {
        // Arrange
        let window = WsWindow::new();

        // Act: close before any session subscribed
        window.close_sessions();

        // Assert
        assert!(*window.closing.subscribe().borrow());
    }
}
