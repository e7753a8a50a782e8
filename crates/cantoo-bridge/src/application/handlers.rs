//! The three handler slots an embedded application can fill.
//!
//! | slot                | request        | callback                                   |
//! |---------------------|----------------|--------------------------------------------|
//! | document provider   | `wantDocument` | `Fn() -> Future<Result<DocumentPayload>>`  |
//! | clearer             | `clear`        | `Fn() -> Future<Result<()>>`               |
//! | loader              | `openDocument` | `Fn(String) -> Future<Result<()>>`         |
//!
//! Each slot holds at most one callback; registering again replaces it.  An
//! empty slot is a normal, checkable state: dispatching to it yields
//! [`BridgeError::HandlerMissing`] instead of calling nothing.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use cantoo_core::{DocumentPayload, InboundRequest, RequestKind};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::application::dispatch::BridgeError;

/// Future returned by a stored handler.
pub type HandlerFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

pub type DocumentRequestFn = Arc<dyn Fn() -> HandlerFuture<DocumentPayload> + Send + Sync>;
pub type ClearFn = Arc<dyn Fn() -> HandlerFuture<()> + Send + Sync>;
pub type LoadDocumentFn = Arc<dyn Fn(String) -> HandlerFuture<()> + Send + Sync>;

/// The capability set {document provider, clearer, loader}.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    document_provider: Option<DocumentRequestFn>,
    clearer: Option<ClearFn>,
    loader: Option<LoadDocumentFn>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills the `wantDocument` slot.
    pub fn set_document_provider<F, Fut>(&mut self, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<DocumentPayload>> + Send + 'static,
    {
        self.document_provider = Some(Arc::new(move || handler().boxed()));
    }

    /// Fills the `clear` slot.
    pub fn set_clearer<F, Fut>(&mut self, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.clearer = Some(Arc::new(move || handler().boxed()));
    }

    /// Fills the `openDocument` slot.
    pub fn set_loader<F, Fut>(&mut self, handler: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.loader = Some(Arc::new(move |doc| handler(doc).boxed()));
    }

    /// Whether the slot serving `kind` is filled.
    pub fn is_registered(&self, kind: RequestKind) -> bool {
        match kind {
            RequestKind::OpenDocument => self.loader.is_some(),
            RequestKind::WantDocument => self.document_provider.is_some(),
            RequestKind::Clear => self.clearer.is_some(),
        }
    }

    /// Picks the handler serving `request` without calling it.
    ///
    /// Only the stored `Arc` is cloned, so the caller can release the
    /// registry lock before any application code runs.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::HandlerMissing`] if the slot is empty.
    pub fn prepare(&self, request: InboundRequest) -> Result<HandlerCall, BridgeError> {
        let kind = request.kind();
        let missing = || BridgeError::HandlerMissing(kind);

        let call = match request {
            InboundRequest::OpenDocument { doc } => {
                let loader = self.loader.clone().ok_or_else(missing)?;
                HandlerCall::Load(loader, doc)
            }
            InboundRequest::WantDocument => {
                HandlerCall::Provide(self.document_provider.clone().ok_or_else(missing)?)
            }
            InboundRequest::Clear => HandlerCall::Clear(self.clearer.clone().ok_or_else(missing)?),
        };

        Ok(call)
    }
}

/// A resolved handler together with its arguments, not yet started.
pub enum HandlerCall {
    Load(LoadDocumentFn, String),
    Provide(DocumentRequestFn),
    Clear(ClearFn),
}

impl HandlerCall {
    /// The request this call serves.
    pub fn kind(&self) -> RequestKind {
        match self {
            HandlerCall::Load(..) => RequestKind::OpenDocument,
            HandlerCall::Provide(_) => RequestKind::WantDocument,
            HandlerCall::Clear(_) => RequestKind::Clear,
        }
    }

    /// Calls the handler.
    ///
    /// The callback runs right away, but the returned future only makes
    /// progress when polled.  It resolves to the JSON value to put in the
    /// `result` field of the reply, `None` for handlers that produce nothing.
    pub fn start(self) -> HandlerFuture<Option<Value>> {
        match self {
            HandlerCall::Load(loader, doc) => loader(doc).map(|res| res.map(|()| None)).boxed(),
            HandlerCall::Provide(provider) => provider()
                .map(|res| -> anyhow::Result<Option<Value>> {
                    let payload = res?;
                    Ok(Some(serde_json::to_value(payload)?))
                })
                .boxed(),
            HandlerCall::Clear(clearer) => clearer().map(|res| res.map(|()| None)).boxed(),
        }
    }
}

impl fmt::Debug for HandlerCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerCall").field(&self.kind()).finish()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("document_provider", &self.document_provider.is_some())
            .field("clearer", &self.clearer.is_some())
            .field("loader", &self.loader.is_some())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_new_registry_has_no_handlers() {
        let registry = HandlerRegistry::new();
        for kind in RequestKind::ALL {
            assert!(!registry.is_registered(kind), "{kind} must start empty");
        }
    }

    #[test]
    fn test_prepare_empty_slot_returns_handler_missing() {
        let registry = HandlerRegistry::new();
        let result = registry.prepare(InboundRequest::WantDocument);
        assert!(matches!(
            result,
            Err(BridgeError::HandlerMissing(RequestKind::WantDocument))
        ));
    }

    #[tokio::test]
    async fn test_document_provider_result_is_json_payload() {
        // Arrange
        let mut registry = HandlerRegistry::new();
        registry.set_document_provider(|| async { Ok(DocumentPayload::with_svg("d1", "<svg/>")) });

        // Act
        let result = registry
            .prepare(InboundRequest::WantDocument)
            .unwrap()
            .start()
            .await
            .unwrap();

        // Assert
        assert_eq!(result, Some(json!({"doc": "d1", "svg": "<svg/>"})));
    }

    #[tokio::test]
    async fn test_loader_receives_doc_and_yields_no_result() {
        // Arrange
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut registry = HandlerRegistry::new();
        registry.set_loader(move |doc| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(doc);
                Ok(())
            }
        });

        // Act
        let result = registry
            .prepare(InboundRequest::OpenDocument {
                doc: "XYZ".to_string(),
            })
            .unwrap()
            .start()
            .await
            .unwrap();

        // Assert
        assert_eq!(result, None);
        assert_eq!(*seen.lock().unwrap(), vec!["XYZ".to_string()]);
    }

    #[tokio::test]
    async fn test_clearer_error_is_propagated() {
        let mut registry = HandlerRegistry::new();
        registry.set_clearer(|| async { Err(anyhow::anyhow!("unsaved work")) });

        let err = registry
            .prepare(InboundRequest::Clear)
            .unwrap()
            .start()
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "unsaved work");
    }

    #[tokio::test]
    async fn test_second_registration_replaces_first() {
        // Arrange
        let mut registry = HandlerRegistry::new();
        registry.set_document_provider(|| async { Ok(DocumentPayload::with_svg("first", "")) });
        registry.set_document_provider(|| async { Ok(DocumentPayload::with_png("second", "")) });

        // Act
        let result = registry
            .prepare(InboundRequest::WantDocument)
            .unwrap()
            .start()
            .await
            .unwrap();

        // Assert: only the latest registration is in effect
        assert_eq!(result, Some(json!({"doc": "second", "png": ""})));
    }

    #[test]
    fn test_prepare_does_not_call_the_handler() {
        // Arrange
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = HandlerRegistry::new();
        registry.set_clearer(move || {
            *counter.lock().unwrap() += 1;
            async { Ok(()) }
        });

        // Act
        let call = registry.prepare(InboundRequest::Clear).unwrap();

        // Assert: nothing ran until the call is started
        assert_eq!(call.kind(), RequestKind::Clear);
        assert_eq!(*calls.lock().unwrap(), 0);
        drop(call.start());
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_debug_lists_filled_slots() {
        let mut registry = HandlerRegistry::new();
        registry.set_clearer(|| async { Ok(()) });
        let text = format!("{registry:?}");
        assert!(text.contains("clearer: true"));
        assert!(text.contains("loader: false"));
    }
}
