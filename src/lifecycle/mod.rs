//! Deal lifecycle orchestration: guards, engine calls, persistence, and
//! post-commit side effects for every operation on a deal.

pub mod settlement;
pub mod transitions;

pub use settlement::{SubmitPaymentRequest, VerificationOutcome};
pub use transitions::{DealView, NewDealRequest, NewItemSpec};

use crate::collab::{DocumentRenderer, Notification, Notifier};
use crate::db::Repository;
use crate::domain::{
    Actor, ActorType, Deal, DealId, DealStatus, Decimal, PersonId, StatusHistoryEntry, TimeMs,
};
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Orchestrates deal operations over the repository and collaborators.
#[derive(Clone)]
pub struct DealLifecycle {
    repo: Arc<Repository>,
    notifier: Arc<dyn Notifier>,
    renderer: Arc<dyn DocumentRenderer>,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    InvalidAmount(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Caller-supplied amount override for the approval endpoint, assembled from
/// the request body, then the query string, then the `x-negotiated-amount`
/// header. Raw strings are kept so rejection messages can echo exactly what
/// was received.
#[derive(Debug, Clone, Default)]
pub struct AmountHints {
    pub body: Option<Decimal>,
    pub query: Option<Decimal>,
    pub header: Option<String>,
}

impl AmountHints {
    /// First parsable hint in body -> query -> header order.
    pub fn resolved(&self) -> Option<Decimal> {
        self.body
            .or(self.query)
            .or_else(|| self.header.as_deref().and_then(|h| h.parse().ok()))
    }

    /// Human-readable echo of everything received, for InvalidAmount
    /// diagnostics.
    pub fn describe(&self) -> String {
        format!(
            "body: {}, query: {}, header: {}",
            self.body
                .map(|d| d.to_canonical_string())
                .unwrap_or_else(|| "none".to_string()),
            self.query
                .map(|d| d.to_canonical_string())
                .unwrap_or_else(|| "none".to_string()),
            self.header.as_deref().unwrap_or("none"),
        )
    }
}

impl DealLifecycle {
    pub fn new(
        repo: Arc<Repository>,
        notifier: Arc<dyn Notifier>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        DealLifecycle {
            repo,
            notifier,
            renderer,
        }
    }

    pub fn repo(&self) -> &Arc<Repository> {
        &self.repo
    }

    pub(crate) fn renderer(&self) -> &Arc<dyn DocumentRenderer> {
        &self.renderer
    }

    /// Fetch a deal or fail with NotFound.
    pub(crate) async fn require_deal(&self, id: &DealId) -> Result<Deal, LifecycleError> {
        self.repo
            .get_deal(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("Deal {} not found", id)))
    }

    /// The actor must be one of the deal's parties (or an admin).
    pub(crate) fn ensure_party(&self, deal: &Deal, actor: &Actor) -> Result<(), LifecycleError> {
        let allowed = match actor.actor_type {
            ActorType::Client => deal.client_id == actor.id,
            ActorType::Trader => deal.trader_id == actor.id,
            ActorType::Employee => deal.employee_id == actor.id,
            ActorType::Admin => true,
            ActorType::System => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(LifecycleError::Forbidden(
                "You are not a party to this deal".to_string(),
            ))
        }
    }

    pub(crate) fn history_entry(
        deal_id: &DealId,
        status: DealStatus,
        description: impl Into<String>,
        actor: &Actor,
        now: TimeMs,
    ) -> StatusHistoryEntry {
        let changed_by = match actor.actor_type {
            ActorType::System => None,
            _ => Some(actor.id.clone()),
        };
        StatusHistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            deal_id: deal_id.clone(),
            status,
            description: description.into(),
            changed_by,
            changed_by_type: actor.actor_type,
            created_at: now,
        }
    }

    /// Fan out notifications concurrently. Failures are logged, never raised.
    pub(crate) async fn notify_all(&self, notifications: Vec<Notification>) {
        let futures = notifications
            .iter()
            .map(|n| self.notifier.notify(n))
            .collect::<Vec<_>>();

        for (result, notification) in join_all(futures).await.into_iter().zip(&notifications) {
            if let Err(e) = result {
                warn!(
                    user_id = %notification.user_id,
                    kind = %notification.kind,
                    error = %e,
                    "Notification delivery failed"
                );
            }
        }
    }

    /// Best-effort activity record; failures are logged, never raised.
    pub(crate) async fn log_activity(
        &self,
        actor_type: ActorType,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        description: &str,
        metadata: Option<serde_json::Value>,
        now: TimeMs,
    ) {
        if let Err(e) = self
            .repo
            .record_activity(
                actor_type,
                action,
                entity_type,
                entity_id,
                description,
                metadata.as_ref(),
                now,
            )
            .await
        {
            warn!(action = action, entity_id = entity_id, error = %e, "Activity log write failed");
        }
    }

    pub(crate) fn notification(
        user_id: &PersonId,
        user_type: ActorType,
        kind: &str,
        title: &str,
        message: String,
        related_entity: &str,
    ) -> Notification {
        Notification {
            user_id: user_id.clone(),
            user_type,
            kind: kind.to_string(),
            title: title.to_string(),
            message,
            related_entity: related_entity.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_hints_precedence() {
        let hints = AmountHints {
            body: Some(Decimal::from_i64(100)),
            query: Some(Decimal::from_i64(200)),
            header: Some("300".to_string()),
        };
        assert_eq!(hints.resolved(), Some(Decimal::from_i64(100)));

        let hints = AmountHints {
            body: None,
            query: Some(Decimal::from_i64(200)),
            header: Some("300".to_string()),
        };
        assert_eq!(hints.resolved(), Some(Decimal::from_i64(200)));

        let hints = AmountHints {
            body: None,
            query: None,
            header: Some("300".to_string()),
        };
        assert_eq!(hints.resolved(), Some(Decimal::from_i64(300)));
    }

    #[test]
    fn test_amount_hints_bad_header_ignored() {
        let hints = AmountHints {
            body: None,
            query: None,
            header: Some("not-a-number".to_string()),
        };
        assert_eq!(hints.resolved(), None);
        assert!(hints.describe().contains("not-a-number"));
    }

    #[test]
    fn test_amount_hints_describe_echoes_all() {
        let hints = AmountHints {
            body: Some(Decimal::from_i64(1)),
            query: None,
            header: Some("7".to_string()),
        };
        let echo = hints.describe();
        assert!(echo.contains("body: 1"));
        assert!(echo.contains("query: none"));
        assert!(echo.contains("header: 7"));
    }
}
