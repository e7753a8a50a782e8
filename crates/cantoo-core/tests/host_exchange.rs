//! Integration tests for the cantoo-core public API.
//!
//! These tests replay a host session through the crate root exports: raw JSON
//! events are validated and decoded, and the replies the client would send are
//! encoded back to the exact objects the host expects.

use cantoo_core::{
    decode_request, encode_message, DocumentPayload, InboundRequest, MessageError,
    OriginPolicy, OutgoingMessage,
};
use serde_json::{json, Value};

fn decode(origin: &str, raw: &str) -> Result<InboundRequest, MessageError> {
    let data: Value = serde_json::from_str(raw).expect("fixture must be valid JSON");
    decode_request(Some(origin), Some(&data), &OriginPolicy::default())
}

#[test]
fn test_want_document_reply_matches_host_contract() {
    // Arrange
    let raw = r#"{"name":"wantDocument"}"#;
    let source: Value = serde_json::from_str(raw).unwrap();
    let request = decode("https://cantoo.fr", raw).unwrap();
    assert_eq!(request, InboundRequest::WantDocument);

    // Act: the application answers with its document and an SVG preview
    let payload = serde_json::to_value(DocumentPayload::with_svg("d1", "<svg/>")).unwrap();
    let reply = encode_message(&OutgoingMessage::done(source, Some(payload))).unwrap();

    // Assert
    assert_eq!(
        reply,
        json!({
            "name": "done",
            "source": {"name": "wantDocument"},
            "result": {"doc": "d1", "svg": "<svg/>"}
        })
    );
}

#[test]
fn test_document_round_trips_through_open_document() {
    // The host stores `doc` from a wantDocument reply and sends it back later.
    let payload = DocumentPayload::with_png("{\"pages\":3}", "data:image/png;base64,AA==");
    let stored = serde_json::to_value(&payload).unwrap();

    let open = json!({"name": "openDocument", "doc": stored["doc"]});
    let request = decode_request(
        Some("https://preprod.cantoo.fr"),
        Some(&open),
        &OriginPolicy::default(),
    )
    .unwrap();

    assert_eq!(
        request,
        InboundRequest::OpenDocument {
            doc: payload.doc.clone()
        }
    );
}

#[test]
fn test_every_allowed_origin_reaches_name_matching() {
    for origin in [
        "https://cantoo.fr",
        "https://develop.cantoo.fr",
        "https://preprod.cantoo.fr",
    ] {
        let err = decode(origin, r#"{"name":"unknownThing"}"#).unwrap_err();
        assert!(
            matches!(err, MessageError::UnknownName { .. }),
            "{origin} must pass the origin check, got {err}"
        );
    }
}

#[test]
fn test_every_foreign_origin_is_rejected() {
    for origin in ["https://evil.fr", "http://cantoo.fr", ""] {
        let err = decode(origin, r#"{"name":"clear"}"#).unwrap_err();
        assert!(
            matches!(err, MessageError::RejectedOrigin { .. }),
            "{origin:?} must be rejected, got {err}"
        );
    }
}
