use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{actor_from_headers, AppState};
use crate::db::OfferItemRow;
use crate::domain::{Actor, ActorType, CommissionMethod, Decimal, PlatformSettings, TimeMs};
use crate::error::AppError;

fn require_admin(actor: &Actor) -> Result<(), AppError> {
    if actor.actor_type == ActorType::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Admin access required".to_string(),
        ))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDto {
    pub platform_commission_rate: Decimal,
    pub shipping_commission_rate: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cbm_rate: Option<Decimal>,
    pub commission_method: String,
}

pub async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SettingsDto>, AppError> {
    let actor = actor_from_headers(&headers)?;
    require_admin(&actor)?;

    let settings = state.repo.get_platform_settings().await?;
    Ok(Json(SettingsDto {
        platform_commission_rate: settings.platform_commission_rate,
        shipping_commission_rate: settings.shipping_commission_rate,
        cbm_rate: settings.cbm_rate,
        commission_method: settings.commission_method.as_str().to_string(),
    }))
}

pub async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SettingsDto>,
) -> Result<Json<SettingsDto>, AppError> {
    let actor = actor_from_headers(&headers)?;
    require_admin(&actor)?;

    let method = CommissionMethod::parse(&body.commission_method).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Unknown commission method: {}",
            body.commission_method
        ))
    })?;
    let settings = PlatformSettings {
        platform_commission_rate: body.platform_commission_rate,
        shipping_commission_rate: body.shipping_commission_rate,
        cbm_rate: body.cbm_rate,
        commission_method: method,
    };

    state
        .repo
        .update_platform_settings(&settings, TimeMs::now())
        .await?;
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRateRequest {
    pub commission_rate: Decimal,
}

pub async fn set_employee_rate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<EmployeeRateRequest>,
) -> Result<StatusCode, AppError> {
    let actor = actor_from_headers(&headers)?;
    require_admin(&actor)?;

    if !body.commission_rate.is_positive() {
        return Err(AppError::BadRequest(
            "commissionRate must be positive".to_string(),
        ));
    }
    state.repo.set_employee_rate(&id, body.commission_rate).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferItemRequest {
    pub id: Option<String>,
    pub name: String,
    pub unit_price: Decimal,
    pub cartons: i64,
    pub cbm: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferItemDto {
    pub id: String,
    pub name: String,
    pub unit_price: String,
    pub cartons: i64,
    pub cbm: String,
}

/// Catalog entries come from traders (their stock) or admins.
pub async fn create_offer_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateOfferItemRequest>,
) -> Result<(StatusCode, Json<OfferItemDto>), AppError> {
    let actor = actor_from_headers(&headers)?;
    if !matches!(actor.actor_type, ActorType::Trader | ActorType::Admin) {
        return Err(AppError::Forbidden(
            "Only traders or admins may create offer items".to_string(),
        ));
    }
    if !body.unit_price.is_positive() {
        return Err(AppError::BadRequest("unitPrice must be positive".to_string()));
    }

    let row = OfferItemRow {
        id: body.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        name: body.name,
        unit_price: body.unit_price,
        cartons: body.cartons,
        cbm: body.cbm,
    };
    state.repo.insert_offer_item(&row).await?;

    Ok((
        StatusCode::CREATED,
        Json(OfferItemDto {
            id: row.id,
            name: row.name,
            unit_price: row.unit_price.to_canonical_string(),
            cartons: row.cartons,
            cbm: row.cbm.to_canonical_string(),
        }),
    ))
}
