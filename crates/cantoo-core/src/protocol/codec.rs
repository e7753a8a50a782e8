//! Decoding of inbound message events and encoding of outbound messages.
//!
//! Inbound validation runs in a fixed order, and the first failing step wins:
//!
//! ```text
//! 1. origin   → MessageError::RejectedOrigin
//! 2. payload  → MessageError::Malformed      (absent, not an object, no `name`)
//! 3. name     → MessageError::UnknownName    (not one of the request names)
//! 4. fields   → MessageError::InvalidRequest (e.g. openDocument without `doc`)
//! ```
//!
//! Only steps 1 to 3 drop a message outright.  A message that fails step 4
//! carries a recognised name, so the host is waiting for an answer to it:
//! [`MessageError::is_answerable`] tells the caller to reply with an error.

use serde_json::Value;
use thiserror::Error;
use tracing::trace;

use crate::protocol::messages::{InboundRequest, OutgoingMessage, RequestKind};
use crate::protocol::origin::OriginPolicy;

/// Reasons an inbound message is dropped instead of dispatched.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The sender origin is absent or outside the allowlist.
    #[error("rejected message from origin {}", .origin.as_deref().unwrap_or("<none>"))]
    RejectedOrigin { origin: Option<String> },

    /// The payload is absent or does not have the shape of a request.
    #[error("malformed message from {origin}: {reason}")]
    Malformed { origin: String, reason: String },

    /// The payload names an event this bridge does not handle.
    #[error("received unknown {name} event from {origin}")]
    UnknownName { name: String, origin: String },

    /// The name is recognised but the other fields do not fit the request.
    #[error("invalid {kind} request from {origin}: {reason}")]
    InvalidRequest {
        kind: RequestKind,
        origin: String,
        reason: String,
    },

    /// An outbound message could not be turned into JSON.
    #[error("failed to encode {name} message: {source}")]
    Encode {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl MessageError {
    /// Whether the sender should still get a `done` reply for this failure.
    pub fn is_answerable(&self) -> bool {
        matches!(self, MessageError::InvalidRequest { .. })
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Validates one inbound message and decodes it into an [`InboundRequest`].
///
/// `origin` and `data` are the two halves of the transport envelope: the
/// sender's origin string and the structured payload.
///
/// # Errors
///
/// See the module documentation for the order of checks.
///
/// # Examples
///
/// ```rust
/// use cantoo_core::{decode_request, InboundRequest, OriginPolicy};
/// use serde_json::json;
///
/// let data = json!({"name": "openDocument", "doc": "XYZ"});
/// let request = decode_request(Some("https://cantoo.fr"), Some(&data), &OriginPolicy::default())
///     .unwrap();
/// assert_eq!(request, InboundRequest::OpenDocument { doc: "XYZ".into() });
/// ```
pub fn decode_request(
    origin: Option<&str>,
    data: Option<&Value>,
    policy: &OriginPolicy,
) -> Result<InboundRequest, MessageError> {
    let origin = match origin {
        Some(o) if policy.is_allowed(o) => o,
        other => {
            trace!("origin {other:?} is not in the allowlist");
            return Err(MessageError::RejectedOrigin {
                origin: other.map(str::to_owned),
            });
        }
    };

    let malformed = |reason: String| MessageError::Malformed {
        origin: origin.to_owned(),
        reason,
    };

    let Some(data) = data else {
        return Err(malformed("missing payload".to_string()));
    };

    let name = match data.get("name") {
        Some(Value::String(name)) if !name.is_empty() => name,
        _ => return Err(malformed(format!("missing name in {data}"))),
    };

    let Some(kind) = RequestKind::from_wire_name(name) else {
        return Err(MessageError::UnknownName {
            name: name.clone(),
            origin: origin.to_owned(),
        });
    };

    serde_json::from_value(data.clone()).map_err(|e| MessageError::InvalidRequest {
        kind,
        origin: origin.to_owned(),
        reason: e.to_string(),
    })
}

/// Encodes an outbound message into the JSON value posted to the host.
///
/// # Errors
///
/// Returns [`MessageError::Encode`] if serialization fails.
pub fn encode_message(msg: &OutgoingMessage) -> Result<Value, MessageError> {
    serde_json::to_value(msg).map_err(|source| MessageError::Encode {
        name: msg.wire_name(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CANTOO: Option<&str> = Some("https://cantoo.fr");

    fn decode(origin: Option<&str>, data: Value) -> Result<InboundRequest, MessageError> {
        decode_request(origin, Some(&data), &OriginPolicy::default())
    }

    #[test]
    fn test_decode_want_document() {
        let request = decode(CANTOO, json!({"name": "wantDocument"})).unwrap();
        assert_eq!(request, InboundRequest::WantDocument);
    }

    #[test]
    fn test_decode_clear_from_develop() {
        let request = decode(
            Some("https://develop.cantoo.fr"),
            json!({"name": "clear"}),
        )
        .unwrap();
        assert_eq!(request, InboundRequest::Clear);
    }

    #[test]
    fn test_decode_open_document_carries_doc() {
        let request = decode(CANTOO, json!({"name": "openDocument", "doc": "XYZ"})).unwrap();
        assert_eq!(
            request,
            InboundRequest::OpenDocument {
                doc: "XYZ".to_string()
            }
        );
    }

    #[test]
    fn test_rejected_origin_is_checked_before_payload() {
        // Arrange: both the origin and the payload are wrong
        let result = decode_request(Some("https://evil.fr"), None, &OriginPolicy::default());

        // Assert: the origin failure wins
        assert!(matches!(
            result,
            Err(MessageError::RejectedOrigin { origin: Some(ref o) }) if o == "https://evil.fr"
        ));
    }

    #[test]
    fn test_absent_origin_is_rejected() {
        let result = decode(None, json!({"name": "clear"}));
        assert!(matches!(
            result,
            Err(MessageError::RejectedOrigin { origin: None })
        ));
    }

    #[test]
    fn test_missing_payload_is_malformed() {
        let result = decode_request(CANTOO, None, &OriginPolicy::default());
        assert!(matches!(result, Err(MessageError::Malformed { .. })));
    }

    #[test]
    fn test_missing_name_is_malformed() {
        let result = decode(CANTOO, json!({"doc": "XYZ"}));
        assert!(matches!(result, Err(MessageError::Malformed { .. })));
    }

    #[test]
    fn test_empty_or_non_string_name_is_malformed() {
        assert!(matches!(
            decode(CANTOO, json!({"name": ""})),
            Err(MessageError::Malformed { .. })
        ));
        assert!(matches!(
            decode(CANTOO, json!({"name": 5})),
            Err(MessageError::Malformed { .. })
        ));
    }

    #[test]
    fn test_non_object_payload_is_malformed() {
        let result = decode(CANTOO, json!("wantDocument"));
        assert!(matches!(result, Err(MessageError::Malformed { .. })));
    }

    #[test]
    fn test_malformed_error_includes_origin() {
        let err = decode(CANTOO, json!({})).unwrap_err();
        assert!(err.to_string().contains("https://cantoo.fr"));
    }

    #[test]
    fn test_unknown_name_is_reported_with_origin() {
        // Act
        let err = decode(CANTOO, json!({"name": "unknownThing"})).unwrap_err();

        // Assert
        assert!(matches!(err, MessageError::UnknownName { ref name, .. } if name == "unknownThing"));
        assert_eq!(
            err.to_string(),
            "received unknown unknownThing event from https://cantoo.fr"
        );
    }

    #[test]
    fn test_open_document_without_doc_is_an_answerable_invalid_request() {
        // Act
        let err = decode(CANTOO, json!({"name": "openDocument"})).unwrap_err();

        // Assert: the name was recognised, so the sender is owed a reply
        assert!(matches!(
            err,
            MessageError::InvalidRequest {
                kind: RequestKind::OpenDocument,
                ..
            }
        ));
        assert!(err.is_answerable());
    }

    #[test]
    fn test_open_document_with_non_string_doc_is_invalid() {
        let err = decode(CANTOO, json!({"name": "openDocument", "doc": 7})).unwrap_err();
        assert!(matches!(err, MessageError::InvalidRequest { .. }));
    }

    #[test]
    fn test_dropped_messages_are_not_answerable() {
        assert!(!decode(CANTOO, json!({"name": "unknownThing"})).unwrap_err().is_answerable());
        assert!(!decode(CANTOO, json!({"doc": "x"})).unwrap_err().is_answerable());
        assert!(!decode(None, json!({"name": "clear"})).unwrap_err().is_answerable());
    }

    #[test]
    fn test_encode_message_produces_named_object() {
        let value = encode_message(&OutgoingMessage::DocumentChange).unwrap();
        assert_eq!(value, json!({"name": "documentChange"}));
    }
}
