//! # cantoo-core
//!
//! Shared protocol definitions for the Cantoo cross-window message bridge.
//!
//! An application embedded in Cantoo Scribe talks to its host window with a
//! handful of named JSON messages.  This crate defines that vocabulary and
//! nothing else: it has no dependencies on sockets, runtimes, or windows.
//!
//! - **`protocol::messages`** – The request, reply, and notification types,
//!   plus [`DocumentPayload`], the document/preview pair the host stores.
//!
//! - **`protocol::origin`** – [`OriginPolicy`], the allowlist deciding which
//!   sender origins may drive the application.
//!
//! - **`protocol::codec`** – [`decode_request`] validates an inbound envelope
//!   (origin first, then payload shape, then name) and [`encode_message`]
//!   turns an outbound message into JSON.

pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `cantoo_core::InboundRequest` instead of the full module path.
pub use protocol::codec::{decode_request, encode_message, MessageError};
pub use protocol::messages::{
    DocumentPayload, InboundRequest, OutgoingMessage, Preview, RequestKind,
};
pub use protocol::origin::OriginPolicy;
