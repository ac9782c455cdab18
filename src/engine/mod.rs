//! Pure computation: amount resolution, commission math, ledger building,
//! and the quote-expiry rule. No I/O lives here.

pub mod amount;
pub mod commission;
pub mod expiry;
pub mod ledger;

pub use amount::{resolve_amount, sum_items, AmountSources};
pub use commission::{
    amount_matches, amount_tolerance, calculate, CommissionBreakdown, CommissionInputs,
};
pub use expiry::{quote_expired, EXPIRY_REASON, QUOTE_TTL_MS};
pub use ledger::{build_entries, verify_balanced};
