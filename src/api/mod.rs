pub mod admin;
pub mod deals;
pub mod health;
pub mod payments;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{Actor, ActorType, PersonId};
use crate::error::AppError;
use crate::lifecycle::DealLifecycle;
use axum::http::HeaderMap;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub lifecycle: Arc<DealLifecycle>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, lifecycle: Arc<DealLifecycle>) -> Self {
        Self {
            repo,
            config,
            lifecycle,
        }
    }
}

/// Resolve the calling actor from the auth headers set by the upstream proxy.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AppError> {
    let id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing x-actor-id header".into()))?;

    let raw_type = headers
        .get("x-actor-type")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing x-actor-type header".into()))?;
    let actor_type = ActorType::parse(raw_type)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown actor type: {}", raw_type)))?;

    Ok(Actor {
        id: PersonId::new(id.to_string()),
        actor_type,
    })
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/deals", post(deals::create_deal).get(deals::list_deals))
        .route("/v1/deals/:id", get(deals::get_deal))
        .route("/v1/deals/:id/items", put(deals::replace_items))
        .route(
            "/v1/deals/:id/messages",
            post(deals::post_message).get(deals::get_messages),
        )
        .route("/v1/deals/:id/history", get(deals::get_history))
        .route("/v1/deals/:id/quote", post(deals::send_quote))
        .route("/v1/deals/:id/approve", post(deals::approve_deal))
        .route("/v1/deals/:id/accept", post(deals::accept_deal))
        .route("/v1/deals/:id/reject", post(deals::reject_deal))
        .route("/v1/deals/:id/cancel", post(deals::cancel_deal))
        .route("/v1/deals/:id/payments", post(payments::submit_payment))
        .route("/v1/deals/:id/settle", post(payments::settle_deal))
        .route(
            "/v1/deals/:id/invoice",
            get(payments::get_invoice).post(payments::regenerate_invoice),
        )
        .route("/v1/payments/:id/verify", post(payments::verify_payment))
        .route(
            "/v1/settings",
            get(admin::get_settings).put(admin::update_settings),
        )
        .route("/v1/employees/:id/rate", put(admin::set_employee_rate))
        .route("/v1/offer-items", post(admin::create_offer_item))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_actor_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-actor-id", HeaderValue::from_static("cli-1"));
        headers.insert("x-actor-type", HeaderValue::from_static("CLIENT"));

        let actor = actor_from_headers(&headers).unwrap();
        assert_eq!(actor.id.as_str(), "cli-1");
        assert_eq!(actor.actor_type, ActorType::Client);
    }

    #[test]
    fn test_actor_from_headers_missing_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-actor-type", HeaderValue::from_static("CLIENT"));
        assert!(matches!(
            actor_from_headers(&headers),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_actor_from_headers_bad_type() {
        let mut headers = HeaderMap::new();
        headers.insert("x-actor-id", HeaderValue::from_static("cli-1"));
        headers.insert("x-actor-type", HeaderValue::from_static("WIZARD"));
        assert!(matches!(
            actor_from_headers(&headers),
            Err(AppError::BadRequest(_))
        ));
    }
}
