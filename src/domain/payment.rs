//! Payments, financial transactions, ledger entries, and invoices.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Decimal, DealId, PaymentId, PersonId, TimeMs};

/// State of one payment attempt. PENDING moves to COMPLETED or FAILED
/// exactly once; re-verification of a non-PENDING payment is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attempt to pay a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub deal_id: DealId,
    /// The full buyer total: deal amount plus all three commissions.
    pub amount: Decimal,
    pub method: String,
    pub status: PaymentStatus,
    pub transaction_ref: Option<String>,
    pub receipt_url: Option<String>,
    pub verified_at: Option<TimeMs>,
    pub verified_by: Option<PersonId>,
    pub created_at: TimeMs,
}

/// One row per successfully verified payment. Written exactly once, inside
/// the settlement transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialTransaction {
    pub id: String,
    pub deal_id: DealId,
    pub payment_id: PaymentId,
    pub employee_id: PersonId,
    pub trader_id: PersonId,
    /// Total the buyer pays: deal amount + all commissions.
    pub amount: Decimal,
    pub platform_commission: Decimal,
    pub shipping_commission: Decimal,
    pub employee_commission: Decimal,
    /// What the trader receives: the deal amount exactly, commissions are
    /// never deducted from the trader's proceeds.
    pub trader_amount: Decimal,
    pub created_at: TimeMs,
}

/// The account a ledger entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerAccount {
    Client,
    Platform,
    Employee,
    Trader,
}

impl LedgerAccount {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerAccount::Client => "CLIENT",
            LedgerAccount::Platform => "PLATFORM",
            LedgerAccount::Employee => "EMPLOYEE",
            LedgerAccount::Trader => "TRADER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CLIENT" => Some(LedgerAccount::Client),
            "PLATFORM" => Some(LedgerAccount::Platform),
            "EMPLOYEE" => Some(LedgerAccount::Employee),
            "TRADER" => Some(LedgerAccount::Trader),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "DEBIT",
            EntryType::Credit => "CREDIT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DEBIT" => Some(EntryType::Debit),
            "CREDIT" => Some(EntryType::Credit),
            _ => None,
        }
    }
}

/// One immutable DEBIT or CREDIT record tied to a financial transaction.
///
/// `balance_before`/`balance_after` are recorded as zero: the ledger tracks
/// per-transaction commission splits, not running account balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub transaction_id: String,
    pub account: LedgerAccount,
    /// Whose account, when the account is a person (None for PLATFORM).
    pub account_holder_id: Option<PersonId>,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub description: String,
    /// Deal number cross-reference for auditors.
    pub deal_number: String,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub created_at: TimeMs,
}

/// One invoice per deal; regenerable (rendering may be replaced).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub deal_id: DealId,
    pub transaction_id: String,
    pub invoice_number: String,
    pub deal_amount: Decimal,
    pub platform_commission: Decimal,
    pub shipping_commission: Decimal,
    pub employee_commission: Decimal,
    pub total_amount: Decimal,
    pub document_url: Option<String>,
    pub verification_code_url: Option<String>,
    pub created_at: TimeMs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_status_roundtrip() {
        for s in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
        ] {
            assert_eq!(PaymentStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(PaymentStatus::parse("REFUNDED"), None);
    }

    #[test]
    fn test_ledger_enums_roundtrip() {
        for a in [
            LedgerAccount::Client,
            LedgerAccount::Platform,
            LedgerAccount::Employee,
            LedgerAccount::Trader,
        ] {
            assert_eq!(LedgerAccount::parse(a.as_str()), Some(a));
        }
        assert_eq!(EntryType::parse("DEBIT"), Some(EntryType::Debit));
        assert_eq!(EntryType::parse("CREDIT"), Some(EntryType::Credit));
        assert_eq!(EntryType::parse("debit"), None);
    }
}
