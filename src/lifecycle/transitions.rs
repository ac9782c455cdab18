//! Negotiation-side operations: creation, reads with the lazy expiry sweep,
//! item replacement, the negotiation log, quoting, approval, acceptance, and
//! client-side cancellation.

use super::{AmountHints, DealLifecycle, LifecycleError};
use crate::db::DealApproval;
use crate::domain::{
    Actor, ActorType, Deal, DealId, DealItem, DealStatus, Decimal, NegotiationMessage, PersonId,
    ShippingType, TimeMs,
};
use crate::engine::{self, AmountSources};
use sha2::{Digest, Sha256};

pub const CLIENT_REJECT_REASON: &str = "Client rejected the price quote.";
pub const CLIENT_CANCEL_REASON: &str = "Client cancelled the deal.";

/// Request to open a deal against an offer.
#[derive(Debug, Clone)]
pub struct NewDealRequest {
    pub trader_id: PersonId,
    /// Required unless the caller is the client themselves.
    pub client_id: Option<PersonId>,
    pub employee_id: PersonId,
    pub shipping_company_id: Option<PersonId>,
    pub items: Vec<NewItemSpec>,
}

/// One requested line item.
#[derive(Debug, Clone)]
pub struct NewItemSpec {
    pub offer_item_id: String,
    pub quantity: i64,
    pub negotiated_price: Option<Decimal>,
}

/// A deal plus its items and the best-guess display amount. Read paths never
/// fail on an unresolvable amount; they render it as absent.
#[derive(Debug, Clone)]
pub struct DealView {
    pub deal: Deal,
    pub items: Vec<DealItem>,
    pub display_amount: Option<Decimal>,
}

impl DealLifecycle {
    // =========================================================================
    // Creation
    // =========================================================================

    pub async fn create_deal(
        &self,
        actor: &Actor,
        request: NewDealRequest,
    ) -> Result<Deal, LifecycleError> {
        let client_id = match actor.actor_type {
            ActorType::Client => actor.id.clone(),
            _ => request.client_id.clone().ok_or_else(|| {
                LifecycleError::InvalidState("clientId is required".to_string())
            })?,
        };

        let now = TimeMs::now();
        let deal_id = DealId::generate();
        let items = self.build_items(&deal_id, &request.items).await?;

        let deal = Deal {
            id: deal_id.clone(),
            deal_number: String::new(),
            trader_id: request.trader_id.clone(),
            client_id: client_id.clone(),
            employee_id: request.employee_id.clone(),
            shipping_company_id: request.shipping_company_id.clone(),
            status: DealStatus::Negotiation,
            negotiated_amount: None,
            total_cartons: items.iter().map(|i| i.cartons).sum(),
            total_cbm: items
                .iter()
                .fold(Decimal::zero(), |acc, i| acc + i.cbm),
            shipping_type: None,
            invoice_number: None,
            barcode: None,
            qr_code_url: None,
            quote_sent_at: None,
            approved_at: None,
            paid_at: None,
            settled_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: now,
        };

        let history = Self::history_entry(
            &deal_id,
            DealStatus::Negotiation,
            "Deal created",
            actor,
            now,
        );
        let deal = self.repo().create_deal_atomic(&deal, &items, &history).await?;

        self.log_activity(
            actor.actor_type,
            "CREATE_DEAL",
            "deal",
            deal.id.as_str(),
            &format!("Deal {} created", deal.deal_number),
            None,
            now,
        )
        .await;

        self.notify_all(vec![
            Self::notification(
                &deal.trader_id,
                ActorType::Trader,
                "DEAL_CREATED",
                "New deal request",
                format!("A client opened deal {}", deal.deal_number),
                deal.id.as_str(),
            ),
            Self::notification(
                &deal.employee_id,
                ActorType::Employee,
                "DEAL_CREATED",
                "New deal assigned",
                format!("You are the guarantor for deal {}", deal.deal_number),
                deal.id.as_str(),
            ),
        ])
        .await;

        Ok(deal)
    }

    // =========================================================================
    // Reads (with the lazy expiry sweep)
    // =========================================================================

    /// Fetch one deal, sweeping an expired quote first. The caller sees the
    /// post-sweep state in the same response.
    pub async fn get_deal_view(
        &self,
        actor: &Actor,
        deal_id: &DealId,
    ) -> Result<DealView, LifecycleError> {
        let deal = self.require_deal(deal_id).await?;
        self.ensure_party(&deal, actor)?;

        let deal = self.sweep_if_expired(deal).await?;
        let items = self.repo().get_deal_items(&deal.id).await?;
        let display_amount = self.display_amount(&deal, &items).await?;

        Ok(DealView {
            deal,
            items,
            display_amount,
        })
    }

    pub async fn list_deals(&self, actor: &Actor) -> Result<Vec<DealView>, LifecycleError> {
        let deals = self.repo().list_deals_for_actor(actor).await?;
        let mut views = Vec::with_capacity(deals.len());
        for deal in deals {
            let items = self.repo().get_deal_items(&deal.id).await?;
            let display_amount = self.display_amount(&deal, &items).await?;
            views.push(DealView {
                deal,
                items,
                display_amount,
            });
        }
        Ok(views)
    }

    /// Cancel the deal if its quote expired; otherwise return it unchanged.
    async fn sweep_if_expired(&self, deal: Deal) -> Result<Deal, LifecycleError> {
        let now = TimeMs::now();
        let expired = deal.status == DealStatus::Negotiation
            && deal
                .quote_sent_at
                .map(|sent| engine::quote_expired(sent, now))
                .unwrap_or(false);
        if !expired {
            return Ok(deal);
        }

        let history = Self::history_entry(
            &deal.id,
            DealStatus::Cancelled,
            engine::EXPIRY_REASON,
            &Actor::system(),
            now,
        );
        // The status guard makes this a no-op if a concurrent accept won.
        let cancelled = self
            .repo()
            .cancel_deal_atomic(&deal.id, engine::EXPIRY_REASON, &history, now)
            .await?;
        if cancelled {
            self.log_activity(
                ActorType::System,
                "EXPIRE_DEAL",
                "deal",
                deal.id.as_str(),
                engine::EXPIRY_REASON,
                None,
                now,
            )
            .await;
        }

        self.require_deal(&deal.id).await
    }

    async fn display_amount(
        &self,
        deal: &Deal,
        items: &[DealItem],
    ) -> Result<Option<Decimal>, LifecycleError> {
        let latest = self.repo().latest_proposed_price(&deal.id).await?;
        Ok(engine::resolve_amount(&AmountSources {
            items,
            stored_amount: deal.negotiated_amount,
            override_amount: None,
            latest_proposed_price: latest,
        }))
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Replace the item set wholesale. Items freeze once the deal leaves
    /// NEGOTIATION.
    pub async fn replace_items(
        &self,
        actor: &Actor,
        deal_id: &DealId,
        specs: Vec<NewItemSpec>,
    ) -> Result<Vec<DealItem>, LifecycleError> {
        let deal = self.require_deal(deal_id).await?;
        self.ensure_party(&deal, actor)?;
        if deal.status != DealStatus::Negotiation {
            return Err(LifecycleError::InvalidState(
                "Deal items can only be changed during negotiation".to_string(),
            ));
        }

        let items = self.build_items(deal_id, &specs).await?;
        self.repo().replace_deal_items(deal_id, &items).await?;
        Ok(items)
    }

    async fn build_items(
        &self,
        deal_id: &DealId,
        specs: &[NewItemSpec],
    ) -> Result<Vec<DealItem>, LifecycleError> {
        let mut items = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.quantity <= 0 {
                return Err(LifecycleError::InvalidAmount(format!(
                    "Item quantity must be positive, got {}",
                    spec.quantity
                )));
            }
            let offer = self
                .repo()
                .get_offer_item(&spec.offer_item_id)
                .await?
                .ok_or_else(|| {
                    LifecycleError::NotFound(format!(
                        "Offer item {} not found",
                        spec.offer_item_id
                    ))
                })?;

            items.push(DealItem {
                id: uuid::Uuid::new_v4().to_string(),
                deal_id: deal_id.clone(),
                offer_item_id: offer.id.clone(),
                quantity: spec.quantity,
                cartons: offer.cartons * spec.quantity,
                cbm: offer.cbm * Decimal::from_i64(spec.quantity),
                negotiated_price: spec.negotiated_price,
                unit_price: offer.unit_price,
            });
        }
        Ok(items)
    }

    // =========================================================================
    // Negotiation log
    // =========================================================================

    pub async fn post_message(
        &self,
        actor: &Actor,
        deal_id: &DealId,
        message: Option<String>,
        proposed_price: Option<Decimal>,
        proposed_quantity: Option<i64>,
    ) -> Result<NegotiationMessage, LifecycleError> {
        let deal = self.require_deal(deal_id).await?;
        self.ensure_party(&deal, actor)?;
        if deal.status != DealStatus::Negotiation {
            return Err(LifecycleError::InvalidState(
                "Messages can only be sent while the deal is in negotiation".to_string(),
            ));
        }

        let msg = NegotiationMessage {
            id: uuid::Uuid::new_v4().to_string(),
            deal_id: deal_id.clone(),
            sender_type: actor.actor_type,
            sender_id: actor.id.clone(),
            message,
            proposed_price,
            proposed_quantity,
            is_read: false,
            read_at: None,
            created_at: TimeMs::now(),
        };
        self.repo().insert_message(&msg).await?;
        Ok(msg)
    }

    /// List the log, marking the counterpart's messages read for this reader.
    pub async fn get_messages(
        &self,
        actor: &Actor,
        deal_id: &DealId,
    ) -> Result<Vec<NegotiationMessage>, LifecycleError> {
        let deal = self.require_deal(deal_id).await?;
        self.ensure_party(&deal, actor)?;

        self.repo()
            .mark_messages_read(deal_id, actor.actor_type, TimeMs::now())
            .await?;
        Ok(self.repo().list_messages(deal_id).await?)
    }

    // =========================================================================
    // Quote, approval, acceptance, cancellation
    // =========================================================================

    /// Trader or employee sends the quote to the client, starting the 72h
    /// acceptance window.
    pub async fn send_quote(
        &self,
        actor: &Actor,
        deal_id: &DealId,
    ) -> Result<Deal, LifecycleError> {
        let deal = self.require_deal(deal_id).await?;
        self.ensure_trader_side(&deal, actor)?;

        let now = TimeMs::now();
        let marked = self.repo().mark_quote_sent(deal_id, now).await?;
        if !marked {
            return Err(LifecycleError::InvalidState(
                "A quote can only be sent while the deal is in negotiation".to_string(),
            ));
        }

        self.notify_all(vec![Self::notification(
            &deal.client_id,
            ActorType::Client,
            "QUOTE_SENT",
            "Price quote received",
            format!(
                "You have 72 hours to accept the quote for deal {}",
                deal.deal_number
            ),
            deal.id.as_str(),
        )])
        .await;

        self.require_deal(deal_id).await
    }

    /// Trader/employee approval: the "official" quote. Mints the invoice
    /// artifacts; client acceptance does not.
    pub async fn approve_deal(
        &self,
        actor: &Actor,
        deal_id: &DealId,
        hints: AmountHints,
        shipping_type: Option<ShippingType>,
    ) -> Result<Deal, LifecycleError> {
        let deal = self.require_deal(deal_id).await?;
        self.ensure_trader_side(&deal, actor)?;
        if deal.status != DealStatus::Negotiation {
            return Err(LifecycleError::InvalidState(format!(
                "Deal must be in NEGOTIATION to be approved, currently {}",
                deal.status
            )));
        }

        let items = self.repo().get_deal_items(deal_id).await?;
        let latest = self.repo().latest_proposed_price(deal_id).await?;
        let amount = engine::resolve_amount(&AmountSources {
            items: &items,
            stored_amount: deal.negotiated_amount,
            override_amount: hints.resolved(),
            latest_proposed_price: latest,
        })
        .ok_or_else(|| {
            LifecycleError::InvalidAmount(format!(
                "Unable to resolve a positive deal amount ({})",
                hints.describe()
            ))
        })?;

        let now = TimeMs::now();
        let (invoice_number, barcode, qr_code_url) = mint_invoice_artifacts(&deal, now);
        let approval = DealApproval {
            negotiated_amount: amount,
            total_cartons: items.iter().map(|i| i.cartons).sum(),
            total_cbm: items.iter().fold(Decimal::zero(), |acc, i| acc + i.cbm),
            shipping_type,
            invoice_number: Some(invoice_number),
            barcode: Some(barcode),
            qr_code_url: Some(qr_code_url),
        };
        let history = Self::history_entry(
            deal_id,
            DealStatus::Approved,
            format!("Deal approved at {}", amount),
            actor,
            now,
        );

        let applied = self
            .repo()
            .approve_deal_atomic(deal_id, &approval, &history, now)
            .await?;
        if !applied {
            return Err(LifecycleError::Conflict(
                "Deal left negotiation while approving".to_string(),
            ));
        }

        self.log_activity(
            actor.actor_type,
            "APPROVE_DEAL",
            "deal",
            deal_id.as_str(),
            &format!("Deal {} approved at {}", deal.deal_number, amount),
            None,
            now,
        )
        .await;

        self.notify_all(vec![
            Self::notification(
                &deal.client_id,
                ActorType::Client,
                "DEAL_APPROVED",
                "Deal approved",
                format!("Deal {} was approved at {}", deal.deal_number, amount),
                deal.id.as_str(),
            ),
            Self::notification(
                &deal.employee_id,
                ActorType::Employee,
                "DEAL_APPROVED",
                "Deal approved",
                format!("Deal {} was approved at {}", deal.deal_number, amount),
                deal.id.as_str(),
            ),
        ])
        .await;

        self.require_deal(deal_id).await
    }

    /// Client accepts a previously sent quote. Re-validates expiry inside the
    /// same code path that flips the status; an expired quote is cancelled as
    /// a side effect of the rejected accept.
    pub async fn accept_deal(
        &self,
        actor: &Actor,
        deal_id: &DealId,
    ) -> Result<Deal, LifecycleError> {
        let deal = self.require_deal(deal_id).await?;
        self.ensure_client(&deal, actor)?;
        if deal.status != DealStatus::Negotiation {
            return Err(LifecycleError::InvalidState(format!(
                "Deal must be in NEGOTIATION to be accepted, currently {}",
                deal.status
            )));
        }
        let quote_sent_at = deal.quote_sent_at.ok_or_else(|| {
            LifecycleError::InvalidState("No quote has been sent for this deal".to_string())
        })?;

        let now = TimeMs::now();
        if engine::quote_expired(quote_sent_at, now) {
            let history = Self::history_entry(
                deal_id,
                DealStatus::Cancelled,
                engine::EXPIRY_REASON,
                &Actor::system(),
                now,
            );
            self.repo()
                .cancel_deal_atomic(deal_id, engine::EXPIRY_REASON, &history, now)
                .await?;
            return Err(LifecycleError::InvalidState(
                "The quote has expired".to_string(),
            ));
        }

        let items = self.repo().get_deal_items(deal_id).await?;
        let latest = self.repo().latest_proposed_price(deal_id).await?;
        let amount = engine::resolve_amount(&AmountSources {
            items: &items,
            stored_amount: deal.negotiated_amount,
            override_amount: None,
            latest_proposed_price: latest,
        })
        .ok_or_else(|| {
            LifecycleError::InvalidAmount(
                "Unable to resolve a positive deal amount for acceptance".to_string(),
            )
        })?;

        // Confirmation of an already-sent quote: no artifact minting here.
        let approval = DealApproval {
            negotiated_amount: amount,
            total_cartons: items.iter().map(|i| i.cartons).sum(),
            total_cbm: items.iter().fold(Decimal::zero(), |acc, i| acc + i.cbm),
            shipping_type: None,
            invoice_number: None,
            barcode: None,
            qr_code_url: None,
        };
        let history = Self::history_entry(
            deal_id,
            DealStatus::Approved,
            "Client accepted the quote",
            actor,
            now,
        );

        let applied = self
            .repo()
            .approve_deal_atomic(deal_id, &approval, &history, now)
            .await?;
        if !applied {
            return Err(LifecycleError::Conflict(
                "Deal left negotiation while accepting".to_string(),
            ));
        }

        self.notify_all(vec![
            Self::notification(
                &deal.trader_id,
                ActorType::Trader,
                "DEAL_ACCEPTED",
                "Quote accepted",
                format!("The client accepted deal {}", deal.deal_number),
                deal.id.as_str(),
            ),
            Self::notification(
                &deal.employee_id,
                ActorType::Employee,
                "DEAL_ACCEPTED",
                "Quote accepted",
                format!("The client accepted deal {}", deal.deal_number),
                deal.id.as_str(),
            ),
        ])
        .await;

        self.require_deal(deal_id).await
    }

    /// Client rejects the quote.
    pub async fn reject_deal(
        &self,
        actor: &Actor,
        deal_id: &DealId,
        reason: Option<String>,
    ) -> Result<Deal, LifecycleError> {
        self.cancel_in_negotiation(
            actor,
            deal_id,
            reason.unwrap_or_else(|| CLIENT_REJECT_REASON.to_string()),
        )
        .await
    }

    /// Client cancels the deal outright.
    pub async fn cancel_deal(
        &self,
        actor: &Actor,
        deal_id: &DealId,
        reason: Option<String>,
    ) -> Result<Deal, LifecycleError> {
        self.cancel_in_negotiation(
            actor,
            deal_id,
            reason.unwrap_or_else(|| CLIENT_CANCEL_REASON.to_string()),
        )
        .await
    }

    async fn cancel_in_negotiation(
        &self,
        actor: &Actor,
        deal_id: &DealId,
        reason: String,
    ) -> Result<Deal, LifecycleError> {
        let deal = self.require_deal(deal_id).await?;
        self.ensure_client(&deal, actor)?;

        let now = TimeMs::now();
        let history =
            Self::history_entry(deal_id, DealStatus::Cancelled, reason.clone(), actor, now);
        let cancelled = self
            .repo()
            .cancel_deal_atomic(deal_id, &reason, &history, now)
            .await?;
        if !cancelled {
            return Err(LifecycleError::InvalidState(format!(
                "Deal can only be cancelled during negotiation, currently {}",
                deal.status
            )));
        }

        self.notify_all(vec![
            Self::notification(
                &deal.trader_id,
                ActorType::Trader,
                "DEAL_CANCELLED",
                "Deal cancelled",
                format!("Deal {}: {}", deal.deal_number, reason),
                deal.id.as_str(),
            ),
            Self::notification(
                &deal.employee_id,
                ActorType::Employee,
                "DEAL_CANCELLED",
                "Deal cancelled",
                format!("Deal {}: {}", deal.deal_number, reason),
                deal.id.as_str(),
            ),
        ])
        .await;

        self.require_deal(deal_id).await
    }

    // =========================================================================
    // Actor guards
    // =========================================================================

    fn ensure_trader_side(&self, deal: &Deal, actor: &Actor) -> Result<(), LifecycleError> {
        let allowed = match actor.actor_type {
            ActorType::Trader => deal.trader_id == actor.id,
            ActorType::Employee => deal.employee_id == actor.id,
            ActorType::Admin => true,
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(LifecycleError::Forbidden(
                "Only the deal's trader or assigned employee may do this".to_string(),
            ))
        }
    }

    fn ensure_client(&self, deal: &Deal, actor: &Actor) -> Result<(), LifecycleError> {
        let allowed = match actor.actor_type {
            ActorType::Client => deal.client_id == actor.id,
            ActorType::Admin => true,
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(LifecycleError::Forbidden(
                "Only the deal's client may do this".to_string(),
            ))
        }
    }
}

/// Derive the invoice number, barcode, and verification URL minted at trader
/// approval. The barcode is a truncated SHA-256 of the deal number, so it is
/// reproducible from the deal alone.
fn mint_invoice_artifacts(deal: &Deal, now: TimeMs) -> (String, String, String) {
    let short_id: String = deal
        .id
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_uppercase();
    let invoice_number = format!("INV-{}-{}", now.year(), short_id);

    let digest = Sha256::digest(deal.deal_number.as_bytes());
    let barcode: String = hex::encode(digest).chars().take(24).collect();

    let qr_code_url = format!("/verify/{}", barcode);
    (invoice_number, barcode, qr_code_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal_for_mint() -> Deal {
        Deal {
            id: DealId::new("a1b2c3d4-e5f6-7890-abcd-ef1234567890".into()),
            deal_number: "DEAL-2026-000042".into(),
            trader_id: PersonId::new("trd".into()),
            client_id: PersonId::new("cli".into()),
            employee_id: PersonId::new("emp".into()),
            shipping_company_id: None,
            status: DealStatus::Negotiation,
            negotiated_amount: None,
            total_cartons: 0,
            total_cbm: Decimal::zero(),
            shipping_type: None,
            invoice_number: None,
            barcode: None,
            qr_code_url: None,
            quote_sent_at: None,
            approved_at: None,
            paid_at: None,
            settled_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            created_at: TimeMs::new(0),
        }
    }

    #[test]
    fn test_mint_invoice_artifacts_deterministic() {
        let deal = deal_for_mint();
        let now = TimeMs::new(1_767_225_600_000); // 2026
        let (inv1, bar1, qr1) = mint_invoice_artifacts(&deal, now);
        let (inv2, bar2, qr2) = mint_invoice_artifacts(&deal, now);

        assert_eq!(inv1, inv2);
        assert_eq!(bar1, bar2);
        assert_eq!(qr1, qr2);

        assert_eq!(inv1, "INV-2026-A1B2C3D4");
        assert_eq!(bar1.len(), 24);
        assert!(bar1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(qr1, format!("/verify/{}", bar1));
    }

    #[test]
    fn test_barcode_differs_per_deal_number() {
        let mut a = deal_for_mint();
        let b = deal_for_mint();
        a.deal_number = "DEAL-2026-000043".into();
        let now = TimeMs::new(0);
        assert_ne!(
            mint_invoice_artifacts(&a, now).1,
            mint_invoice_artifacts(&b, now).1
        );
    }
}
