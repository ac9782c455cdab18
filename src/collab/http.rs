//! HTTP-backed collaborator implementations, plus log-only fallbacks used
//! when no endpoint is configured.

use super::{
    CollabError, DocumentRenderer, Notification, Notifier, RenderRequest, RenderedDocument,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Posts notifications to a webhook endpoint.
#[derive(Debug)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        WebhookNotifier {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), CollabError> {
        let body = json!({
            "userId": notification.user_id.as_str(),
            "userType": notification.user_type.as_str(),
            "kind": notification.kind,
            "title": notification.title,
            "message": notification.message,
            "relatedEntity": notification.related_entity,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollabError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CollabError::Http {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }
}

/// Fallback notifier used when `NOTIFY_WEBHOOK_URL` is unset: logs and
/// succeeds, so the rest of the pipeline behaves identically.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), CollabError> {
        info!(
            user_id = %notification.user_id,
            user_type = %notification.user_type,
            kind = %notification.kind,
            "Notification (no webhook configured): {}",
            notification.title
        );
        Ok(())
    }
}

/// Calls the external invoice rendering service.
#[derive(Debug)]
pub struct HttpDocumentRenderer {
    client: reqwest::Client,
    url: String,
}

impl HttpDocumentRenderer {
    pub fn new(url: String) -> Self {
        HttpDocumentRenderer {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderResponse {
    document_url: String,
    verification_code_url: Option<String>,
}

#[async_trait]
impl DocumentRenderer for HttpDocumentRenderer {
    async fn render_invoice(
        &self,
        request: &RenderRequest,
    ) -> Result<RenderedDocument, CollabError> {
        let body = json!({
            "invoice": request.invoice,
            "deal": request.deal,
            "items": request.items,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollabError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CollabError::Http {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: RenderResponse = response
            .json()
            .await
            .map_err(|e| CollabError::Parse(e.to_string()))?;

        Ok(RenderedDocument {
            document_url: parsed.document_url,
            verification_code_url: parsed.verification_code_url,
        })
    }
}

/// Fallback renderer used when `RENDERER_URL` is unset. Always errors; the
/// caller logs it and the invoice persists without a document reference.
#[derive(Debug, Default)]
pub struct NullRenderer;

#[async_trait]
impl DocumentRenderer for NullRenderer {
    async fn render_invoice(
        &self,
        _request: &RenderRequest,
    ) -> Result<RenderedDocument, CollabError> {
        Err(CollabError::Unconfigured("RENDERER_URL".to_string()))
    }
}
