//! Deal aggregate: the central negotiation/sale entity and its status machine.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ActorType, Decimal, DealId, PersonId, TimeMs};

/// Lifecycle state of a deal.
///
/// Legality of a transition is decided by [`DealStatus::can_transition_to`],
/// never by inspecting which timestamps happen to be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealStatus {
    Negotiation,
    Approved,
    Paid,
    Settled,
    Cancelled,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Negotiation => "NEGOTIATION",
            DealStatus::Approved => "APPROVED",
            DealStatus::Paid => "PAID",
            DealStatus::Settled => "SETTLED",
            DealStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEGOTIATION" => Some(DealStatus::Negotiation),
            "APPROVED" => Some(DealStatus::Approved),
            "PAID" => Some(DealStatus::Paid),
            "SETTLED" => Some(DealStatus::Settled),
            "CANCELLED" => Some(DealStatus::Cancelled),
            _ => None,
        }
    }

    /// The transition table.
    ///
    /// Cancellation is only reachable from NEGOTIATION here; once a deal is
    /// approved there is no cancellation path on this surface.
    pub fn can_transition_to(&self, next: DealStatus) -> bool {
        matches!(
            (self, next),
            (DealStatus::Negotiation, DealStatus::Approved)
                | (DealStatus::Negotiation, DealStatus::Cancelled)
                | (DealStatus::Approved, DealStatus::Paid)
                | (DealStatus::Paid, DealStatus::Settled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DealStatus::Settled | DealStatus::Cancelled)
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the goods travel once approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingType {
    Land,
    Sea,
}

impl ShippingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingType::Land => "LAND",
            ShippingType::Sea => "SEA",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LAND" => Some(ShippingType::Land),
            "SEA" => Some(ShippingType::Sea),
            _ => None,
        }
    }
}

/// The deal aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    /// Human-readable sequential number, `DEAL-<year>-<6-digit-seq>`.
    pub deal_number: String,
    pub trader_id: PersonId,
    pub client_id: PersonId,
    /// The accountable guarantor; only they (or an admin) verify payments.
    pub employee_id: PersonId,
    pub shipping_company_id: Option<PersonId>,
    pub status: DealStatus,
    /// Agreed product price, excluding all commissions.
    pub negotiated_amount: Option<Decimal>,
    pub total_cartons: i64,
    pub total_cbm: Decimal,
    pub shipping_type: Option<ShippingType>,
    pub invoice_number: Option<String>,
    pub barcode: Option<String>,
    pub qr_code_url: Option<String>,
    pub quote_sent_at: Option<TimeMs>,
    pub approved_at: Option<TimeMs>,
    pub paid_at: Option<TimeMs>,
    pub settled_at: Option<TimeMs>,
    pub cancelled_at: Option<TimeMs>,
    pub cancellation_reason: Option<String>,
    pub created_at: TimeMs,
}

/// One line item on a deal, snapshotting a catalog offer item.
///
/// Replaced wholesale during NEGOTIATION; frozen once the deal leaves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealItem {
    pub id: String,
    pub deal_id: DealId,
    pub offer_item_id: String,
    pub quantity: i64,
    pub cartons: i64,
    pub cbm: Decimal,
    /// Unit price agreed during negotiation; overrides the catalog price.
    pub negotiated_price: Option<Decimal>,
    /// Catalog unit price at snapshot time.
    pub unit_price: Decimal,
}

impl DealItem {
    /// The unit price used for amount resolution: negotiated if set and
    /// positive, catalog price otherwise.
    pub fn effective_unit_price(&self) -> Decimal {
        match self.negotiated_price {
            Some(p) if p.is_positive() => p,
            _ => self.unit_price,
        }
    }

    /// `quantity × effective unit price`.
    pub fn line_total(&self) -> Decimal {
        Decimal::from_i64(self.quantity) * self.effective_unit_price()
    }
}

/// One entry in the append-only negotiation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationMessage {
    pub id: String,
    pub deal_id: DealId,
    pub sender_type: ActorType,
    pub sender_id: PersonId,
    pub message: Option<String>,
    pub proposed_price: Option<Decimal>,
    pub proposed_quantity: Option<i64>,
    pub is_read: bool,
    pub read_at: Option<TimeMs>,
    pub created_at: TimeMs,
}

/// One immutable audit row written on every successful status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: String,
    pub deal_id: DealId,
    pub status: DealStatus,
    pub description: String,
    /// None when the transition was system-driven (e.g. quote expiry).
    pub changed_by: Option<PersonId>,
    pub changed_by_type: ActorType,
    pub created_at: TimeMs,
}
