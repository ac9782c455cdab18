use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{actor_from_headers, AppState};
use crate::domain::{Deal, DealId, DealItem, Decimal, NegotiationMessage, PersonId, ShippingType};
use crate::error::AppError;
use crate::lifecycle::{AmountHints, DealView, NewDealRequest, NewItemSpec};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealDto {
    pub id: String,
    pub deal_number: String,
    pub trader_id: String,
    pub client_id: String,
    pub employee_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_company_id: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negotiated_amount: Option<String>,
    pub total_cartons: i64,
    pub total_cbm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_sent_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    pub created_at: i64,
}

impl DealDto {
    pub fn from_deal(deal: &Deal) -> Self {
        DealDto {
            id: deal.id.as_str().to_string(),
            deal_number: deal.deal_number.clone(),
            trader_id: deal.trader_id.as_str().to_string(),
            client_id: deal.client_id.as_str().to_string(),
            employee_id: deal.employee_id.as_str().to_string(),
            shipping_company_id: deal
                .shipping_company_id
                .as_ref()
                .map(|p| p.as_str().to_string()),
            status: deal.status.as_str().to_string(),
            negotiated_amount: deal.negotiated_amount.map(|d| d.to_canonical_string()),
            total_cartons: deal.total_cartons,
            total_cbm: deal.total_cbm.to_canonical_string(),
            shipping_type: deal.shipping_type.map(|s| s.as_str().to_string()),
            invoice_number: deal.invoice_number.clone(),
            barcode: deal.barcode.clone(),
            qr_code_url: deal.qr_code_url.clone(),
            quote_sent_at: deal.quote_sent_at.map(|t| t.as_i64()),
            approved_at: deal.approved_at.map(|t| t.as_i64()),
            paid_at: deal.paid_at.map(|t| t.as_i64()),
            settled_at: deal.settled_at.map(|t| t.as_i64()),
            cancelled_at: deal.cancelled_at.map(|t| t.as_i64()),
            cancellation_reason: deal.cancellation_reason.clone(),
            created_at: deal.created_at.as_i64(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealItemDto {
    pub id: String,
    pub offer_item_id: String,
    pub quantity: i64,
    pub cartons: i64,
    pub cbm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negotiated_price: Option<String>,
    pub unit_price: String,
    pub line_total: String,
}

impl DealItemDto {
    fn from_item(item: &DealItem) -> Self {
        DealItemDto {
            id: item.id.clone(),
            offer_item_id: item.offer_item_id.clone(),
            quantity: item.quantity,
            cartons: item.cartons,
            cbm: item.cbm.to_canonical_string(),
            negotiated_price: item.negotiated_price.map(|d| d.to_canonical_string()),
            unit_price: item.unit_price.to_canonical_string(),
            line_total: item.line_total().to_canonical_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealViewDto {
    #[serde(flatten)]
    pub deal: DealDto,
    pub items: Vec<DealItemDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_amount: Option<String>,
}

impl DealViewDto {
    fn from_view(view: &DealView) -> Self {
        DealViewDto {
            deal: DealDto::from_deal(&view.deal),
            items: view.items.iter().map(DealItemDto::from_item).collect(),
            display_amount: view.display_amount.map(|d| d.to_canonical_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSpecDto {
    pub offer_item_id: String,
    pub quantity: i64,
    pub negotiated_price: Option<Decimal>,
}

impl ItemSpecDto {
    fn into_spec(self) -> NewItemSpec {
        NewItemSpec {
            offer_item_id: self.offer_item_id,
            quantity: self.quantity,
            negotiated_price: self.negotiated_price,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDealRequest {
    pub trader_id: String,
    pub client_id: Option<String>,
    pub employee_id: String,
    pub shipping_company_id: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemSpecDto>,
}

pub async fn create_deal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateDealRequest>,
) -> Result<(StatusCode, Json<DealDto>), AppError> {
    let actor = actor_from_headers(&headers)?;
    let request = NewDealRequest {
        trader_id: PersonId::new(body.trader_id),
        client_id: body.client_id.map(PersonId::new),
        employee_id: PersonId::new(body.employee_id),
        shipping_company_id: body.shipping_company_id.map(PersonId::new),
        items: body.items.into_iter().map(ItemSpecDto::into_spec).collect(),
    };

    let deal = state.lifecycle.create_deal(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(DealDto::from_deal(&deal))))
}

pub async fn get_deal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DealViewDto>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let view = state
        .lifecycle
        .get_deal_view(&actor, &DealId::new(id))
        .await?;
    Ok(Json(DealViewDto::from_view(&view)))
}

pub async fn list_deals(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<DealViewDto>>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let views = state.lifecycle.list_deals(&actor).await?;
    Ok(Json(views.iter().map(DealViewDto::from_view).collect()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceItemsRequest {
    pub items: Vec<ItemSpecDto>,
}

pub async fn replace_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ReplaceItemsRequest>,
) -> Result<Json<Vec<DealItemDto>>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let items = state
        .lifecycle
        .replace_items(
            &actor,
            &DealId::new(id),
            body.items.into_iter().map(ItemSpecDto::into_spec).collect(),
        )
        .await?;
    Ok(Json(items.iter().map(DealItemDto::from_item).collect()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub sender_type: String,
    pub sender_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_quantity: Option<i64>,
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<i64>,
    pub created_at: i64,
}

impl MessageDto {
    fn from_message(msg: &NegotiationMessage) -> Self {
        MessageDto {
            id: msg.id.clone(),
            sender_type: msg.sender_type.as_str().to_string(),
            sender_id: msg.sender_id.as_str().to_string(),
            message: msg.message.clone(),
            proposed_price: msg.proposed_price.map(|d| d.to_canonical_string()),
            proposed_quantity: msg.proposed_quantity,
            is_read: msg.is_read,
            read_at: msg.read_at.map(|t| t.as_i64()),
            created_at: msg.created_at.as_i64(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub message: Option<String>,
    pub proposed_price: Option<Decimal>,
    pub proposed_quantity: Option<i64>,
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<MessageDto>), AppError> {
    let actor = actor_from_headers(&headers)?;
    let msg = state
        .lifecycle
        .post_message(
            &actor,
            &DealId::new(id),
            body.message,
            body.proposed_price,
            body.proposed_quantity,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(MessageDto::from_message(&msg))))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<MessageDto>>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let messages = state.lifecycle.get_messages(&actor, &DealId::new(id)).await?;
    Ok(Json(messages.iter().map(MessageDto::from_message).collect()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDto {
    pub status: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<String>,
    pub changed_by_type: String,
    pub created_at: i64,
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<HistoryDto>>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let deal_id = DealId::new(id);
    let view = state.lifecycle.get_deal_view(&actor, &deal_id).await?;

    let entries = state.repo.get_status_history(&view.deal.id).await?;
    Ok(Json(
        entries
            .iter()
            .map(|e| HistoryDto {
                status: e.status.as_str().to_string(),
                description: e.description.clone(),
                changed_by: e.changed_by.as_ref().map(|p| p.as_str().to_string()),
                changed_by_type: e.changed_by_type.as_str().to_string(),
                created_at: e.created_at.as_i64(),
            })
            .collect(),
    ))
}

pub async fn send_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DealDto>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let deal = state.lifecycle.send_quote(&actor, &DealId::new(id)).await?;
    Ok(Json(DealDto::from_deal(&deal)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub negotiated_amount: Option<Decimal>,
    pub shipping_type: Option<ShippingType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveQuery {
    pub negotiated_amount: Option<Decimal>,
}

pub async fn approve_deal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ApproveQuery>,
    headers: HeaderMap,
    body: Option<Json<ApproveRequest>>,
) -> Result<Json<DealDto>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let body = body.map(|Json(b)| b);

    let hints = AmountHints {
        body: body.as_ref().and_then(|b| b.negotiated_amount),
        query: query.negotiated_amount,
        header: headers
            .get("x-negotiated-amount")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
    };
    let shipping_type = body.and_then(|b| b.shipping_type);

    let deal = state
        .lifecycle
        .approve_deal(&actor, &DealId::new(id), hints, shipping_type)
        .await?;
    Ok(Json(DealDto::from_deal(&deal)))
}

pub async fn accept_deal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DealDto>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let deal = state.lifecycle.accept_deal(&actor, &DealId::new(id)).await?;
    Ok(Json(DealDto::from_deal(&deal)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

pub async fn reject_deal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<ReasonRequest>>,
) -> Result<Json<DealDto>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let reason = body.and_then(|Json(b)| b.reason);
    let deal = state
        .lifecycle
        .reject_deal(&actor, &DealId::new(id), reason)
        .await?;
    Ok(Json(DealDto::from_deal(&deal)))
}

pub async fn cancel_deal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<ReasonRequest>>,
) -> Result<Json<DealDto>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let reason = body.and_then(|Json(b)| b.reason);
    let deal = state
        .lifecycle
        .cancel_deal(&actor, &DealId::new(id), reason)
        .await?;
    Ok(Json(DealDto::from_deal(&deal)))
}
