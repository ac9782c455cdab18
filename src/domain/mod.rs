//! Domain model: money, ids, the deal aggregate, payments, and settings.

pub mod deal;
pub mod decimal;
pub mod payment;
pub mod primitives;
pub mod settings;

pub use deal::{Deal, DealItem, DealStatus, NegotiationMessage, ShippingType, StatusHistoryEntry};
pub use decimal::Decimal;
pub use payment::{
    EntryType, FinancialTransaction, Invoice, LedgerAccount, LedgerEntry, Payment, PaymentStatus,
};
pub use primitives::{Actor, ActorType, DealId, PaymentId, PersonId, TimeMs};
pub use settings::{default_employee_rate, CommissionMethod, PlatformSettings};
