use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::deals::DealDto;
use crate::api::{actor_from_headers, AppState};
use crate::domain::{DealId, Decimal, Invoice, Payment, PaymentId};
use crate::error::AppError;
use crate::lifecycle::{SubmitPaymentRequest, VerificationOutcome};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDto {
    pub id: String,
    pub deal_id: String,
    pub amount: String,
    pub method: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    pub created_at: i64,
}

impl PaymentDto {
    fn from_payment(payment: &Payment) -> Self {
        PaymentDto {
            id: payment.id.as_str().to_string(),
            deal_id: payment.deal_id.as_str().to_string(),
            amount: payment.amount.to_canonical_string(),
            method: payment.method.clone(),
            status: payment.status.as_str().to_string(),
            transaction_ref: payment.transaction_ref.clone(),
            receipt_url: payment.receipt_url.clone(),
            verified_at: payment.verified_at.map(|t| t.as_i64()),
            verified_by: payment.verified_by.as_ref().map(|p| p.as_str().to_string()),
            created_at: payment.created_at.as_i64(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDto {
    pub id: String,
    pub deal_id: String,
    pub transaction_id: String,
    pub invoice_number: String,
    pub deal_amount: String,
    pub platform_commission: String,
    pub shipping_commission: String,
    pub employee_commission: String,
    pub total_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_code_url: Option<String>,
    pub created_at: i64,
}

impl InvoiceDto {
    fn from_invoice(invoice: &Invoice) -> Self {
        InvoiceDto {
            id: invoice.id.clone(),
            deal_id: invoice.deal_id.as_str().to_string(),
            transaction_id: invoice.transaction_id.clone(),
            invoice_number: invoice.invoice_number.clone(),
            deal_amount: invoice.deal_amount.to_canonical_string(),
            platform_commission: invoice.platform_commission.to_canonical_string(),
            shipping_commission: invoice.shipping_commission.to_canonical_string(),
            employee_commission: invoice.employee_commission.to_canonical_string(),
            total_amount: invoice.total_amount.to_canonical_string(),
            document_url: invoice.document_url.clone(),
            verification_code_url: invoice.verification_code_url.clone(),
            created_at: invoice.created_at.as_i64(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPaymentBody {
    pub amount: Decimal,
    pub method: String,
    pub transaction_ref: Option<String>,
    pub receipt_url: Option<String>,
}

pub async fn submit_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SubmitPaymentBody>,
) -> Result<(StatusCode, Json<PaymentDto>), AppError> {
    let actor = actor_from_headers(&headers)?;
    let payment = state
        .lifecycle
        .submit_payment(
            &actor,
            &DealId::new(id),
            SubmitPaymentRequest {
                amount: body.amount,
                method: body.method,
                transaction_ref: body.transaction_ref,
                receipt_url: body.receipt_url,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(PaymentDto::from_payment(&payment))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub verified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub outcome: String,
    pub payment: PaymentDto,
}

pub async fn verify_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let payment_id = PaymentId::new(id);

    let outcome = state
        .lifecycle
        .verify_payment(&actor, &payment_id, body.verified)
        .await?;

    let payment = state
        .repo
        .get_payment(&payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment_id)))?;

    Ok(Json(VerifyResponse {
        outcome: match outcome {
            VerificationOutcome::Completed => "COMPLETED".to_string(),
            VerificationOutcome::Rejected => "REJECTED".to_string(),
        },
        payment: PaymentDto::from_payment(&payment),
    }))
}

pub async fn settle_deal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DealDto>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let deal = state.lifecycle.settle_deal(&actor, &DealId::new(id)).await?;
    Ok(Json(DealDto::from_deal(&deal)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<InvoiceDto>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let deal_id = DealId::new(id);

    // Ownership check happens in the view fetch.
    let view = state.lifecycle.get_deal_view(&actor, &deal_id).await?;
    let invoice = state
        .repo
        .get_invoice(&view.deal.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No invoice exists for deal {}", deal_id)))?;

    Ok(Json(InvoiceDto::from_invoice(&invoice)))
}

pub async fn regenerate_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<InvoiceDto>, AppError> {
    let actor = actor_from_headers(&headers)?;
    let invoice = state
        .lifecycle
        .regenerate_invoice(&actor, &DealId::new(id))
        .await?;
    Ok(Json(InvoiceDto::from_invoice(&invoice)))
}
