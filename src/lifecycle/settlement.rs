//! Money-side operations: payment submission, guarantor verification with
//! the all-or-nothing ledger write, and final settlement.

use super::{DealLifecycle, LifecycleError};
use crate::collab::RenderRequest;
use crate::domain::{
    default_employee_rate, Actor, ActorType, Deal, DealId, DealStatus, Decimal,
    FinancialTransaction, Invoice, Payment, PaymentId, PaymentStatus, TimeMs,
};
use crate::engine::{self, CommissionBreakdown, CommissionInputs};
use tracing::warn;

/// Client-submitted payment details.
#[derive(Debug, Clone)]
pub struct SubmitPaymentRequest {
    pub amount: Decimal,
    pub method: String,
    pub transaction_ref: Option<String>,
    pub receipt_url: Option<String>,
}

/// What a verification call resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    /// The payment completed and the deal is now PAID.
    Completed,
    /// The guarantor rejected the payment; it is now FAILED.
    Rejected,
}

impl DealLifecycle {
    // =========================================================================
    // Payment submission
    // =========================================================================

    /// Client submits a payment against an APPROVED deal. The amount must
    /// match the commission-inclusive buyer total within tolerance; the
    /// payment lands as PENDING until the guarantor verifies it.
    pub async fn submit_payment(
        &self,
        actor: &Actor,
        deal_id: &DealId,
        request: SubmitPaymentRequest,
    ) -> Result<Payment, LifecycleError> {
        let deal = self.require_deal(deal_id).await?;
        self.ensure_party(&deal, actor)?;
        if deal.status != DealStatus::Approved {
            return Err(LifecycleError::InvalidState(format!(
                "Deal must be APPROVED to accept payments, currently {}",
                deal.status
            )));
        }

        let breakdown = self.expected_breakdown(&deal, None).await?;
        if !engine::amount_matches(request.amount, breakdown.total_buyer_paid) {
            return Err(LifecycleError::InvalidAmount(format!(
                "Payment amount {} does not match the expected total {} (deal amount plus commissions)",
                request.amount, breakdown.total_buyer_paid
            )));
        }

        let now = TimeMs::now();
        let payment = Payment {
            id: PaymentId::generate(),
            deal_id: deal_id.clone(),
            amount: request.amount,
            method: request.method,
            status: PaymentStatus::Pending,
            transaction_ref: request.transaction_ref,
            receipt_url: request.receipt_url,
            verified_at: None,
            verified_by: None,
            created_at: now,
        };
        self.repo().insert_payment(&payment).await?;

        self.log_activity(
            actor.actor_type,
            "SUBMIT_PAYMENT",
            "payment",
            payment.id.as_str(),
            &format!("Payment of {} submitted for deal {}", payment.amount, deal.deal_number),
            None,
            now,
        )
        .await;

        self.notify_all(vec![Self::notification(
            &deal.employee_id,
            ActorType::Employee,
            "PAYMENT_SUBMITTED",
            "Payment awaiting verification",
            format!(
                "A payment of {} for deal {} needs your verification",
                payment.amount, deal.deal_number
            ),
            deal.id.as_str(),
        )])
        .await;

        Ok(payment)
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Guarantor verdict on a PENDING payment. Only the deal's assigned
    /// employee (or an admin) may verify. A positive verdict runs the whole
    /// settlement unit of work; post-commit side effects never roll it back.
    pub async fn verify_payment(
        &self,
        actor: &Actor,
        payment_id: &PaymentId,
        verified: bool,
    ) -> Result<VerificationOutcome, LifecycleError> {
        let payment = self
            .repo()
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| {
                LifecycleError::NotFound(format!("Payment {} not found", payment_id))
            })?;
        let deal = self.require_deal(&payment.deal_id).await?;

        let allowed = match actor.actor_type {
            ActorType::Employee => deal.employee_id == actor.id,
            ActorType::Admin => true,
            _ => false,
        };
        if !allowed {
            return Err(LifecycleError::Forbidden(
                "Only the deal's assigned employee may verify payments".to_string(),
            ));
        }
        if payment.status != PaymentStatus::Pending {
            return Err(LifecycleError::InvalidState(format!(
                "Payment has already been verified, status is {}",
                payment.status
            )));
        }

        let now = TimeMs::now();
        if !verified {
            let failed = self.repo().fail_payment(payment_id, &actor.id, now).await?;
            if !failed {
                return Err(LifecycleError::Conflict(
                    "Payment was verified concurrently".to_string(),
                ));
            }
            self.log_activity(
                actor.actor_type,
                "VERIFY_PAYMENT",
                "payment",
                payment_id.as_str(),
                &format!("Payment rejected for deal {}", deal.deal_number),
                Some(serde_json::json!({"verified": false})),
                now,
            )
            .await;
            self.notify_all(vec![Self::notification(
                &deal.client_id,
                ActorType::Client,
                "PAYMENT_REJECTED",
                "Payment rejected",
                format!("Your payment for deal {} could not be verified", deal.deal_number),
                deal.id.as_str(),
            )])
            .await;
            return Ok(VerificationOutcome::Rejected);
        }

        self.complete_payment(actor, &deal, &payment, now).await?;
        Ok(VerificationOutcome::Completed)
    }

    /// The positive-verdict path: compute the split, build the transaction,
    /// ledger entries, and invoice, and commit them with the two status flips
    /// in one transaction.
    async fn complete_payment(
        &self,
        actor: &Actor,
        deal: &Deal,
        payment: &Payment,
        now: TimeMs,
    ) -> Result<(), LifecycleError> {
        // A positive stored amount wins; otherwise the split is derived from
        // what the client actually paid.
        let deal_amount = deal
            .negotiated_amount
            .filter(|a| a.is_positive())
            .unwrap_or(payment.amount);
        let breakdown = self.expected_breakdown(deal, Some(deal_amount)).await?;

        let txn = FinancialTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            deal_id: deal.id.clone(),
            payment_id: payment.id.clone(),
            employee_id: deal.employee_id.clone(),
            trader_id: deal.trader_id.clone(),
            amount: breakdown.total_buyer_paid,
            platform_commission: breakdown.platform_commission,
            shipping_commission: breakdown.shipping_commission,
            employee_commission: breakdown.employee_commission,
            trader_amount: breakdown.trader_payout,
            created_at: now,
        };
        let entries = engine::build_entries(&txn, &deal.client_id, &deal.deal_number, now);

        let invoice = Invoice {
            id: uuid::Uuid::new_v4().to_string(),
            deal_id: deal.id.clone(),
            transaction_id: txn.id.clone(),
            invoice_number: deal
                .invoice_number
                .clone()
                .unwrap_or_else(|| format!("INV-{}", deal.deal_number)),
            deal_amount,
            platform_commission: breakdown.platform_commission,
            shipping_commission: breakdown.shipping_commission,
            employee_commission: breakdown.employee_commission,
            total_amount: breakdown.total_buyer_paid,
            document_url: None,
            verification_code_url: None,
            created_at: now,
        };
        let history = Self::history_entry(
            &deal.id,
            DealStatus::Paid,
            format!("Payment of {} verified", payment.amount),
            actor,
            now,
        );

        let applied = self
            .repo()
            .settle_verified_payment_atomic(
                &payment.id,
                &deal.id,
                &actor.id,
                &txn,
                &entries,
                &invoice,
                &history,
                now,
            )
            .await?;
        if !applied {
            return Err(LifecycleError::Conflict(
                "Payment was verified concurrently".to_string(),
            ));
        }

        self.log_activity(
            actor.actor_type,
            "VERIFY_PAYMENT",
            "payment",
            payment.id.as_str(),
            &format!("Payment verified for deal {}", deal.deal_number),
            Some(serde_json::json!({"verified": true, "transactionId": txn.id})),
            now,
        )
        .await;

        self.render_invoice_document(deal, &invoice).await;

        self.notify_all(vec![
            Self::notification(
                &deal.client_id,
                ActorType::Client,
                "PAYMENT_COMPLETED",
                "Payment confirmed",
                format!("Your payment for deal {} has been verified", deal.deal_number),
                deal.id.as_str(),
            ),
            Self::notification(
                &deal.trader_id,
                ActorType::Trader,
                "PAYMENT_COMPLETED",
                "Payment received",
                format!(
                    "Deal {} is paid; {} is credited to your account",
                    deal.deal_number, breakdown.trader_payout
                ),
                deal.id.as_str(),
            ),
            Self::notification(
                &deal.employee_id,
                ActorType::Employee,
                "COMMISSION_EARNED",
                "Commission earned",
                format!(
                    "You earned {} on deal {}",
                    breakdown.employee_commission, deal.deal_number
                ),
                deal.id.as_str(),
            ),
        ])
        .await;

        Ok(())
    }

    /// Re-render the invoice document and attach the fresh URLs. Used after
    /// verification and by the explicit regeneration endpoint. Best-effort.
    pub(crate) async fn render_invoice_document(&self, deal: &Deal, invoice: &Invoice) {
        let items = match self.repo().get_deal_items(&deal.id).await {
            Ok(items) => items,
            Err(e) => {
                warn!(deal_id = %deal.id, error = %e, "Skipping invoice render, items unavailable");
                return;
            }
        };
        let request = RenderRequest {
            invoice: invoice.clone(),
            deal: deal.clone(),
            items,
        };

        match self.renderer().render_invoice(&request).await {
            Ok(doc) => {
                if let Err(e) = self
                    .repo()
                    .set_invoice_document(
                        &invoice.id,
                        &doc.document_url,
                        doc.verification_code_url.as_deref(),
                    )
                    .await
                {
                    warn!(invoice_id = %invoice.id, error = %e, "Failed to store invoice document URL");
                }
            }
            Err(e) => {
                warn!(invoice_id = %invoice.id, error = %e, "Invoice render failed");
            }
        }
    }

    /// Regenerate the invoice document for a PAID or SETTLED deal. Replaces
    /// only the document references; the stored amounts stay untouched.
    pub async fn regenerate_invoice(
        &self,
        actor: &Actor,
        deal_id: &DealId,
    ) -> Result<Invoice, LifecycleError> {
        let deal = self.require_deal(deal_id).await?;
        self.ensure_party(&deal, actor)?;
        let invoice = self.repo().get_invoice(deal_id).await?.ok_or_else(|| {
            LifecycleError::NotFound(format!("No invoice exists for deal {}", deal_id))
        })?;

        self.render_invoice_document(&deal, &invoice).await;
        self.repo().get_invoice(deal_id).await?.ok_or_else(|| {
            LifecycleError::NotFound(format!("No invoice exists for deal {}", deal_id))
        })
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Close out a PAID deal. Requires at least one COMPLETED payment on
    /// record; the status guard in the update keeps double settlement out.
    pub async fn settle_deal(
        &self,
        actor: &Actor,
        deal_id: &DealId,
    ) -> Result<Deal, LifecycleError> {
        let deal = self.require_deal(deal_id).await?;
        let allowed = match actor.actor_type {
            ActorType::Employee => deal.employee_id == actor.id,
            ActorType::Admin => true,
            _ => false,
        };
        if !allowed {
            return Err(LifecycleError::Forbidden(
                "Only the deal's assigned employee may settle it".to_string(),
            ));
        }

        if deal.status != DealStatus::Paid
            || !self.repo().has_completed_payment(deal_id).await?
        {
            return Err(LifecycleError::InvalidState(
                "Deal must be paid before settlement".to_string(),
            ));
        }

        let now = TimeMs::now();
        let history = Self::history_entry(
            deal_id,
            DealStatus::Settled,
            "Deal settled",
            actor,
            now,
        );
        let settled = self.repo().settle_deal_atomic(deal_id, &history, now).await?;
        if !settled {
            return Err(LifecycleError::Conflict(
                "Deal was settled concurrently".to_string(),
            ));
        }

        self.log_activity(
            actor.actor_type,
            "SETTLE_DEAL",
            "deal",
            deal_id.as_str(),
            &format!("Deal {} settled", deal.deal_number),
            None,
            now,
        )
        .await;

        self.notify_all(vec![
            Self::notification(
                &deal.client_id,
                ActorType::Client,
                "DEAL_SETTLED",
                "Deal settled",
                format!("Deal {} is complete", deal.deal_number),
                deal.id.as_str(),
            ),
            Self::notification(
                &deal.trader_id,
                ActorType::Trader,
                "DEAL_SETTLED",
                "Deal settled",
                format!("Deal {} is complete", deal.deal_number),
                deal.id.as_str(),
            ),
        ])
        .await;

        self.require_deal(deal_id).await
    }

    // =========================================================================
    // Shared computation
    // =========================================================================

    /// The commission split the platform currently expects for this deal.
    /// Settings and the employee rate are re-read on every call so a rate
    /// change applies to the next computation immediately.
    async fn expected_breakdown(
        &self,
        deal: &Deal,
        deal_amount: Option<Decimal>,
    ) -> Result<CommissionBreakdown, LifecycleError> {
        let amount = match deal_amount.or_else(|| {
            deal.negotiated_amount.filter(|a| a.is_positive())
        }) {
            Some(a) => a,
            None => {
                return Err(LifecycleError::InvalidAmount(
                    "Deal has no resolvable amount to compute commissions from".to_string(),
                ))
            }
        };

        let settings = self.repo().get_platform_settings().await?;
        let employee_rate = self
            .repo()
            .get_employee_rate(deal.employee_id.as_str())
            .await?
            .unwrap_or_else(default_employee_rate);

        Ok(engine::calculate(&CommissionInputs {
            deal_amount: amount,
            total_cbm: deal.total_cbm,
            platform_rate: settings.platform_commission_rate,
            shipping_rate: settings.shipping_commission_rate,
            employee_rate,
            cbm_rate: settings.cbm_rate,
            method: settings.commission_method,
        }))
    }
}
