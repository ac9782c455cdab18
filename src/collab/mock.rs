//! Recording collaborator doubles for tests.

use super::{
    CollabError, DocumentRenderer, Notification, Notifier, RenderRequest, RenderedDocument,
};
use async_trait::async_trait;
use std::sync::Mutex;

/// Records every notification; can be told to fail to exercise the
/// best-effort paths.
#[derive(Debug, Default)]
pub struct MockNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        MockNotifier {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("mutex poisoned").len()
    }

    pub fn sent_to(&self, user_id: &str) -> Vec<Notification> {
        self.sent
            .lock()
            .expect("mutex poisoned")
            .iter()
            .filter(|n| n.user_id.as_str() == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), CollabError> {
        if self.fail {
            return Err(CollabError::Network("mock failure".to_string()));
        }
        self.sent
            .lock()
            .expect("mutex poisoned")
            .push(notification.clone());
        Ok(())
    }
}

/// Returns deterministic document URLs and counts calls.
#[derive(Debug, Default)]
pub struct MockRenderer {
    pub calls: Mutex<usize>,
    pub fail: bool,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        MockRenderer {
            calls: Mutex::new(0),
            fail: true,
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().expect("mutex poisoned")
    }
}

#[async_trait]
impl DocumentRenderer for MockRenderer {
    async fn render_invoice(
        &self,
        request: &RenderRequest,
    ) -> Result<RenderedDocument, CollabError> {
        *self.calls.lock().expect("mutex poisoned") += 1;
        if self.fail {
            return Err(CollabError::Http {
                status: 500,
                message: "mock renderer down".to_string(),
            });
        }
        Ok(RenderedDocument {
            document_url: format!("https://docs.example/invoices/{}.pdf", request.invoice.id),
            verification_code_url: Some(format!(
                "https://docs.example/qr/{}.png",
                request.invoice.invoice_number
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActorType, PersonId};

    fn note() -> Notification {
        Notification {
            user_id: PersonId::new("u1".into()),
            user_type: ActorType::Client,
            kind: "DEAL_APPROVED".into(),
            title: "Deal approved".into(),
            message: "Your deal was approved".into(),
            related_entity: "deal-1".into(),
        }
    }

    #[tokio::test]
    async fn test_mock_notifier_records() {
        let notifier = MockNotifier::new();
        notifier.notify(&note()).await.unwrap();
        assert_eq!(notifier.sent_count(), 1);
        assert_eq!(notifier.sent_to("u1").len(), 1);
        assert!(notifier.sent_to("u2").is_empty());
    }

    #[tokio::test]
    async fn test_failing_notifier_errors() {
        let notifier = MockNotifier::failing();
        assert!(notifier.notify(&note()).await.is_err());
        assert_eq!(notifier.sent_count(), 0);
    }
}
