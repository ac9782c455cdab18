//! External collaborator contracts: notification delivery and invoice
//! document rendering.
//!
//! Both are fire-and-forget from the core's perspective: callers log
//! failures and never let them roll back a financial write.

use crate::domain::{ActorType, Deal, DealItem, Invoice, PersonId};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod http;
pub mod mock;

pub use http::{HttpDocumentRenderer, LogNotifier, NullRenderer, WebhookNotifier};
pub use mock::{MockNotifier, MockRenderer};

/// One notification to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub user_id: PersonId,
    pub user_type: ActorType,
    pub kind: String,
    pub title: String,
    pub message: String,
    /// Entity the notification links to, e.g. a deal id.
    pub related_entity: String,
}

/// Everything the renderer needs to produce an invoice document.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub invoice: Invoice,
    pub deal: Deal,
    pub items: Vec<DealItem>,
}

/// Result of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub document_url: String,
    pub verification_code_url: Option<String>,
}

/// Error type for collaborator calls. Always recovered by the caller.
#[derive(Debug, Clone, Error)]
pub enum CollabError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Collaborator not configured: {0}")]
    Unconfigured(String),
}

/// Notification sink. Delivery is best-effort; there is no retry.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    async fn notify(&self, notification: &Notification) -> Result<(), CollabError>;
}

/// Invoice document renderer (PDF + verification QR, hosted externally).
#[async_trait]
pub trait DocumentRenderer: Send + Sync + fmt::Debug {
    async fn render_invoice(&self, request: &RenderRequest)
        -> Result<RenderedDocument, CollabError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collab_error_display() {
        let err = CollabError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: connection refused");

        let err = CollabError::Http {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 502: bad gateway");

        let err = CollabError::Unconfigured("RENDERER_URL".to_string());
        assert_eq!(
            err.to_string(),
            "Collaborator not configured: RENDERER_URL"
        );
    }
}
