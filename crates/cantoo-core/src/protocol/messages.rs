//! Message types exchanged between an embedded application and its host window.
//!
//! The host (Cantoo Scribe) embeds the application in a frame and talks to it
//! through the browser's cross-window messaging primitive.  Every message is a
//! plain JSON object whose `"name"` field identifies the variant:
//!
//! ```text
//! Host   → Client:  {"name":"openDocument","doc":"..."}   InboundRequest::OpenDocument
//!                   {"name":"wantDocument"}               InboundRequest::WantDocument
//!                   {"name":"clear"}                      InboundRequest::Clear
//!
//! Client → Host:    {"name":"done","source":{..},"result":..}
//!                   {"name":"loaded"}
//!                   {"name":"documentChange"}
//!                   {"name":"destroyed"}
//! ```
//!
//! Inbound and outbound messages are separate enums so that the compiler
//! rejects any attempt to send a request the host never understands.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Wire names ────────────────────────────────────────────────────────────────

/// Wire name of the "load this document" request.
pub const OPEN_DOCUMENT: &str = "openDocument";
/// Wire name of the "give me your document" request.
pub const WANT_DOCUMENT: &str = "wantDocument";
/// Wire name of the "start a new empty document" request.
pub const CLEAR: &str = "clear";

// ── Document payload ──────────────────────────────────────────────────────────

/// Preview image attached to a [`DocumentPayload`].
///
/// Exactly one of the two forms is present on the wire, as either an `"svg"`
/// or a `"png"` key next to `"doc"`.  Both are opaque strings (serialized SVG
/// markup, or an encoded raster such as a data URL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preview {
    /// Vector preview.
    Svg(String),
    /// Raster preview.
    Png(String),
}

/// The document and its illustration, produced by the document-request
/// handler when the host asks for the current application state.
///
/// # Serde representation
///
/// ```json
/// {"doc":"d1","svg":"<svg/>"}
/// {"doc":"d1","png":"data:image/png;base64,iVBOR..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPayload {
    /// Opaque document identifier or serialized content.
    ///
    /// The host hands the very same string back in a later `openDocument`.
    pub doc: String,

    /// The illustration shown by the host next to the document.
    #[serde(flatten)]
    pub preview: Preview,
}

impl DocumentPayload {
    /// Builds a payload with a vector preview.
    pub fn with_svg(doc: impl Into<String>, svg: impl Into<String>) -> Self {
        Self {
            doc: doc.into(),
            preview: Preview::Svg(svg.into()),
        }
    }

    /// Builds a payload with a raster preview.
    pub fn with_png(doc: impl Into<String>, png: impl Into<String>) -> Self {
        Self {
            doc: doc.into(),
            preview: Preview::Png(png.into()),
        }
    }
}

// ── Host → Client requests ────────────────────────────────────────────────────

/// Every request the host may send to the embedded application.
///
/// This enum is closed: a name outside of it is reported as an unknown event
/// by [`crate::protocol::codec::decode_request`] instead of silently falling
/// through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum InboundRequest {
    /// Load `doc` into the application, replacing the current state.
    OpenDocument {
        /// The string previously produced in [`DocumentPayload::doc`].
        doc: String,
    },

    /// Produce the current document and its preview.
    WantDocument,

    /// Discard the current state and prepare a new empty document.
    Clear,
}

impl InboundRequest {
    /// Returns which handler slot this request is dispatched to.
    pub fn kind(&self) -> RequestKind {
        match self {
            InboundRequest::OpenDocument { .. } => RequestKind::OpenDocument,
            InboundRequest::WantDocument => RequestKind::WantDocument,
            InboundRequest::Clear => RequestKind::Clear,
        }
    }
}

/// Field-less discriminant of [`InboundRequest`].
///
/// Used in log lines and error values so they never carry document content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    OpenDocument,
    WantDocument,
    Clear,
}

impl RequestKind {
    /// All request kinds, in wire order.
    pub const ALL: [RequestKind; 3] = [
        RequestKind::OpenDocument,
        RequestKind::WantDocument,
        RequestKind::Clear,
    ];

    /// The `"name"` value used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            RequestKind::OpenDocument => OPEN_DOCUMENT,
            RequestKind::WantDocument => WANT_DOCUMENT,
            RequestKind::Clear => CLEAR,
        }
    }

    /// Looks up a request kind by its wire name.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.wire_name() == name)
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ── Client → Host messages ────────────────────────────────────────────────────

/// Every message the embedded application sends to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum OutgoingMessage {
    /// Correlated reply to an [`InboundRequest`].
    ///
    /// `source` is the inbound payload exactly as it was received, so the host
    /// can match the reply to its request.  On success `result` carries the
    /// handler's value (absent for requests that produce nothing); on failure
    /// `error` carries a description and `result` is absent.
    Done {
        source: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// The application finished initialising.
    Loaded,

    /// The application state changed in a way the host should treat as unsaved.
    DocumentChange,

    /// The bridge was torn down; no further replies will be sent.
    Destroyed,
}

impl OutgoingMessage {
    /// Builds a successful `done` reply.
    pub fn done(source: Value, result: Option<Value>) -> Self {
        OutgoingMessage::Done {
            source,
            result,
            error: None,
        }
    }

    /// Builds a failed `done` reply.
    pub fn failed(source: Value, error: impl Into<String>) -> Self {
        OutgoingMessage::Done {
            source,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Wire name of this message, for log lines.
    pub fn wire_name(&self) -> &'static str {
        match self {
            OutgoingMessage::Done { .. } => "done",
            OutgoingMessage::Loaded => "loaded",
            OutgoingMessage::DocumentChange => "documentChange",
            OutgoingMessage::Destroyed => "destroyed",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
