//! Ledger entry construction for settled payments.
//!
//! Every verified payment produces exactly five entries: one DEBIT from the
//! client for the full buyer total, and four CREDITs distributing it
//! (platform commission and shipping commission to PLATFORM, employee
//! commission to EMPLOYEE, the deal amount to TRADER). The set always
//! balances to the cent.

use crate::domain::{
    Decimal, EntryType, FinancialTransaction, LedgerAccount, LedgerEntry, PersonId, TimeMs,
};

/// Build the five entries for one transaction.
///
/// Running balances are not tracked; `balance_before`/`balance_after` are
/// recorded as zero on every entry.
pub fn build_entries(
    txn: &FinancialTransaction,
    client_id: &PersonId,
    deal_number: &str,
    now: TimeMs,
) -> Vec<LedgerEntry> {
    let entry = |account: LedgerAccount,
                 holder: Option<PersonId>,
                 entry_type: EntryType,
                 amount: Decimal,
                 description: String| LedgerEntry {
        id: uuid::Uuid::new_v4().to_string(),
        transaction_id: txn.id.clone(),
        account,
        account_holder_id: holder,
        entry_type,
        amount,
        description,
        deal_number: deal_number.to_string(),
        balance_before: Decimal::zero(),
        balance_after: Decimal::zero(),
        created_at: now,
    };

    vec![
        entry(
            LedgerAccount::Client,
            Some(client_id.clone()),
            EntryType::Debit,
            txn.amount,
            format!("Payment for deal {}", deal_number),
        ),
        entry(
            LedgerAccount::Platform,
            None,
            EntryType::Credit,
            txn.platform_commission,
            format!("Platform commission for deal {}", deal_number),
        ),
        entry(
            LedgerAccount::Platform,
            None,
            EntryType::Credit,
            txn.shipping_commission,
            format!("Shipping commission for deal {}", deal_number),
        ),
        entry(
            LedgerAccount::Employee,
            Some(txn.employee_id.clone()),
            EntryType::Credit,
            txn.employee_commission,
            format!("Employee commission for deal {}", deal_number),
        ),
        entry(
            LedgerAccount::Trader,
            Some(txn.trader_id.clone()),
            EntryType::Credit,
            txn.trader_amount,
            format!("Trader proceeds for deal {}", deal_number),
        ),
    ]
}

/// Check the ledger invariant: sum(DEBIT) == sum(CREDIT) == `expected_total`.
pub fn verify_balanced(entries: &[LedgerEntry], expected_total: Decimal) -> bool {
    let mut debits = Decimal::zero();
    let mut credits = Decimal::zero();

    for e in entries {
        match e.entry_type {
            EntryType::Debit => debits = debits + e.amount,
            EntryType::Credit => credits = credits + e.amount,
        }
    }

    debits == credits && debits == expected_total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DealId, PaymentId};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn txn() -> FinancialTransaction {
        FinancialTransaction {
            id: "txn-1".into(),
            deal_id: DealId::new("d-1".into()),
            payment_id: PaymentId::new("p-1".into()),
            employee_id: PersonId::new("emp-1".into()),
            trader_id: PersonId::new("trd-1".into()),
            amount: dec("1085"),
            platform_commission: dec("25"),
            shipping_commission: dec("50"),
            employee_commission: dec("10"),
            trader_amount: dec("1000"),
            created_at: TimeMs::new(0),
        }
    }

    #[test]
    fn test_five_entries_one_debit() {
        let entries = build_entries(
            &txn(),
            &PersonId::new("cli-1".into()),
            "DEAL-2026-000001",
            TimeMs::new(0),
        );
        assert_eq!(entries.len(), 5);
        assert_eq!(
            entries
                .iter()
                .filter(|e| e.entry_type == EntryType::Debit)
                .count(),
            1
        );
        assert!(entries.iter().all(|e| e.deal_number == "DEAL-2026-000001"));
        assert!(entries.iter().all(|e| e.transaction_id == "txn-1"));
    }

    #[test]
    fn test_entries_balance() {
        let entries = build_entries(
            &txn(),
            &PersonId::new("cli-1".into()),
            "DEAL-2026-000001",
            TimeMs::new(0),
        );
        assert!(verify_balanced(&entries, dec("1085")));
        assert!(!verify_balanced(&entries, dec("1084")));
    }

    #[test]
    fn test_platform_gets_two_credits() {
        let entries = build_entries(
            &txn(),
            &PersonId::new("cli-1".into()),
            "DEAL-2026-000001",
            TimeMs::new(0),
        );
        let platform: Vec<_> = entries
            .iter()
            .filter(|e| e.account == LedgerAccount::Platform)
            .collect();
        assert_eq!(platform.len(), 2);
        assert_eq!(platform[0].amount + platform[1].amount, dec("75"));
        assert!(platform.iter().all(|e| e.account_holder_id.is_none()));
    }

    #[test]
    fn test_balances_recorded_as_zero() {
        let entries = build_entries(
            &txn(),
            &PersonId::new("cli-1".into()),
            "DEAL-2026-000001",
            TimeMs::new(0),
        );
        assert!(entries
            .iter()
            .all(|e| e.balance_before.is_zero() && e.balance_after.is_zero()));
    }

    #[test]
    fn test_unbalanced_set_detected() {
        let mut entries = build_entries(
            &txn(),
            &PersonId::new("cli-1".into()),
            "DEAL-2026-000001",
            TimeMs::new(0),
        );
        entries.pop();
        assert!(!verify_balanced(&entries, dec("1085")));
    }
}
