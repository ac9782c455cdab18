//! Repository layer for database operations.
//!
//! Methods are organized across submodules by domain:
//! - `deals.rs` - deal aggregate, items, messages, status history
//! - `payments.rs` - payments, transactions, ledger entries, invoices
//! - `settings.rs` - platform settings, employee rates, activity log
//!
//! The cross-domain settlement unit of work lives here: one sqlx transaction
//! covering the payment flip, the deal flip, history, the financial
//! transaction, the five ledger entries, and the invoice record.

mod deals;
mod payments;
mod settings;

use crate::domain::{
    Deal, DealId, Decimal, FinancialTransaction, Invoice, LedgerEntry, PaymentId, PersonId,
    StatusHistoryEntry, TimeMs,
};
use sqlx::sqlite::SqlitePool;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Parse a stored decimal string, logging and defaulting to zero on
    /// corruption rather than failing the whole read.
    pub(crate) fn parse_decimal(value: &str, field: &str) -> Decimal {
        Decimal::from_str_canonical(value).unwrap_or_else(|e| {
            warn!(field = field, value = value, error = %e, "Failed to parse stored decimal, using zero");
            Decimal::zero()
        })
    }

    /// Apply one verified payment as a single all-or-nothing unit of work.
    ///
    /// Steps, in order, inside one transaction:
    /// 1. Payment PENDING -> COMPLETED (optimistic status check; zero rows
    ///    affected means another verifier won the race and we return `false`).
    /// 2. Deal APPROVED -> PAID with `paid_at`.
    /// 3. Status history append.
    /// 4. FinancialTransaction insert.
    /// 5. Five ledger entry inserts.
    /// 6. Invoice record insert.
    ///
    /// Returns `Ok(false)` without writing anything when either status guard
    /// fails; the caller surfaces that as a Conflict.
    #[allow(clippy::too_many_arguments)]
    pub async fn settle_verified_payment_atomic(
        &self,
        payment_id: &PaymentId,
        deal_id: &DealId,
        verifier: &PersonId,
        txn: &FinancialTransaction,
        entries: &[LedgerEntry],
        invoice: &Invoice,
        history: &StatusHistoryEntry,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'COMPLETED', verified_at = ?, verified_by = ?
            WHERE id = ? AND status = 'PENDING'
            "#,
        )
        .bind(now.as_i64())
        .bind(verifier.as_str())
        .bind(payment_id.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let result = sqlx::query(
            r#"
            UPDATE deals
            SET status = 'PAID', paid_at = ?
            WHERE id = ? AND status = 'APPROVED'
            "#,
        )
        .bind(now.as_i64())
        .bind(deal_id.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        Self::insert_history_tx(&mut tx, history).await?;

        sqlx::query(
            r#"
            INSERT INTO financial_transactions
            (id, deal_id, payment_id, employee_id, trader_id, txn_type, status,
             amount, platform_commission, shipping_commission, employee_commission,
             trader_amount, created_at)
            VALUES (?, ?, ?, ?, ?, 'DEPOSIT', 'COMPLETED', ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&txn.id)
        .bind(txn.deal_id.as_str())
        .bind(txn.payment_id.as_str())
        .bind(txn.employee_id.as_str())
        .bind(txn.trader_id.as_str())
        .bind(txn.amount.to_canonical_string())
        .bind(txn.platform_commission.to_canonical_string())
        .bind(txn.shipping_commission.to_canonical_string())
        .bind(txn.employee_commission.to_canonical_string())
        .bind(txn.trader_amount.to_canonical_string())
        .bind(txn.created_at.as_i64())
        .execute(&mut *tx)
        .await?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO ledger_entries
                (id, transaction_id, account, account_holder_id, entry_type, amount,
                 description, deal_number, balance_before, balance_after, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.transaction_id)
            .bind(entry.account.as_str())
            .bind(entry.account_holder_id.as_ref().map(|p| p.as_str().to_string()))
            .bind(entry.entry_type.as_str())
            .bind(entry.amount.to_canonical_string())
            .bind(&entry.description)
            .bind(&entry.deal_number)
            .bind(entry.balance_before.to_canonical_string())
            .bind(entry.balance_after.to_canonical_string())
            .bind(entry.created_at.as_i64())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO invoices
            (id, deal_id, transaction_id, invoice_number, deal_amount,
             platform_commission, shipping_commission, employee_commission,
             total_amount, document_url, verification_code_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?)
            "#,
        )
        .bind(&invoice.id)
        .bind(invoice.deal_id.as_str())
        .bind(&invoice.transaction_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.deal_amount.to_canonical_string())
        .bind(invoice.platform_commission.to_canonical_string())
        .bind(invoice.shipping_commission.to_canonical_string())
        .bind(invoice.employee_commission.to_canonical_string())
        .bind(invoice.total_amount.to_canonical_string())
        .bind(invoice.created_at.as_i64())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Append a status history row inside an already-open transaction.
    pub(crate) async fn insert_history_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        entry: &StatusHistoryEntry,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO deal_status_history
            (id, deal_id, status, description, changed_by, changed_by_type, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.deal_id.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.description)
        .bind(entry.changed_by.as_ref().map(|p| p.as_str().to_string()))
        .bind(entry.changed_by_type.as_str())
        .bind(entry.created_at.as_i64())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

pub use deals::{DealApproval, OfferItemRow};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::{
        ActorType, DealStatus, EntryType, LedgerAccount, Payment, PaymentStatus,
    };
    use crate::engine;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    async fn seed_paid_ready_deal(repo: &Repository) -> (Deal, Payment) {
        let now = TimeMs::new(1_767_225_600_000);
        let deal = Deal {
            id: crate::domain::DealId::generate(),
            deal_number: String::new(),
            trader_id: PersonId::new("trd-1".into()),
            client_id: PersonId::new("cli-1".into()),
            employee_id: PersonId::new("emp-1".into()),
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
            created_at: now,
        };
        let history = StatusHistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            deal_id: deal.id.clone(),
            status: DealStatus::Negotiation,
            description: "Deal created".into(),
            changed_by: Some(PersonId::new("cli-1".into())),
            changed_by_type: ActorType::Client,
            created_at: now,
        };
        let deal = repo
            .create_deal_atomic(&deal, &[], &history)
            .await
            .expect("create failed");

        let approval = DealApproval {
            negotiated_amount: dec("1000"),
            total_cartons: 10,
            total_cbm: dec("5"),
            shipping_type: None,
            invoice_number: Some("INV-1".into()),
            barcode: Some("abc".into()),
            qr_code_url: None,
        };
        let approve_history = StatusHistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            deal_id: deal.id.clone(),
            status: DealStatus::Approved,
            description: "Approved".into(),
            changed_by: Some(PersonId::new("trd-1".into())),
            changed_by_type: ActorType::Trader,
            created_at: now,
        };
        assert!(repo
            .approve_deal_atomic(&deal.id, &approval, &approve_history, now)
            .await
            .unwrap());

        let payment = Payment {
            id: PaymentId::generate(),
            deal_id: deal.id.clone(),
            amount: dec("1085"),
            method: "BANK_TRANSFER".into(),
            status: PaymentStatus::Pending,
            transaction_ref: None,
            receipt_url: None,
            verified_at: None,
            verified_by: None,
            created_at: now,
        };
        repo.insert_payment(&payment).await.unwrap();

        let deal = repo.get_deal(&deal.id).await.unwrap().unwrap();
        (deal, payment)
    }

    fn settlement_fixtures(
        deal: &Deal,
        payment: &Payment,
        now: TimeMs,
    ) -> (FinancialTransaction, Vec<LedgerEntry>, Invoice, StatusHistoryEntry) {
        let txn = FinancialTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            deal_id: deal.id.clone(),
            payment_id: payment.id.clone(),
            employee_id: deal.employee_id.clone(),
            trader_id: deal.trader_id.clone(),
            amount: dec("1085"),
            platform_commission: dec("25"),
            shipping_commission: dec("50"),
            employee_commission: dec("10"),
            trader_amount: dec("1000"),
            created_at: now,
        };
        let entries = engine::build_entries(&txn, &deal.client_id, &deal.deal_number, now);
        let invoice = Invoice {
            id: uuid::Uuid::new_v4().to_string(),
            deal_id: deal.id.clone(),
            transaction_id: txn.id.clone(),
            invoice_number: "INV-1".into(),
            deal_amount: dec("1000"),
            platform_commission: dec("25"),
            shipping_commission: dec("50"),
            employee_commission: dec("10"),
            total_amount: dec("1085"),
            document_url: None,
            verification_code_url: None,
            created_at: now,
        };
        let history = StatusHistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            deal_id: deal.id.clone(),
            status: DealStatus::Paid,
            description: "Payment verified".into(),
            changed_by: Some(deal.employee_id.clone()),
            changed_by_type: ActorType::Employee,
            created_at: now,
        };
        (txn, entries, invoice, history)
    }

    #[tokio::test]
    async fn test_settlement_unit_of_work_commits_everything() {
        let (repo, _temp) = setup_test_db().await;
        let (deal, payment) = seed_paid_ready_deal(&repo).await;
        let now = TimeMs::new(1_767_225_700_000);
        let (txn, entries, invoice, history) = settlement_fixtures(&deal, &payment, now);

        let applied = repo
            .settle_verified_payment_atomic(
                &payment.id,
                &deal.id,
                &deal.employee_id,
                &txn,
                &entries,
                &invoice,
                &history,
                now,
            )
            .await
            .expect("settlement failed");
        assert!(applied);

        let deal = repo.get_deal(&deal.id).await.unwrap().unwrap();
        assert_eq!(deal.status, DealStatus::Paid);
        assert_eq!(deal.paid_at, Some(now));

        let payment = repo.get_payment(&payment.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);

        let stored = repo.list_ledger_entries(&txn.id).await.unwrap();
        assert_eq!(stored.len(), 5);
        assert!(engine::verify_balanced(&stored, dec("1085")));
        assert_eq!(
            stored
                .iter()
                .filter(|e| e.entry_type == EntryType::Debit
                    && e.account == LedgerAccount::Client)
                .count(),
            1
        );

        assert!(repo.get_invoice(&deal.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_settlement_is_rejected_with_no_extra_rows() {
        let (repo, _temp) = setup_test_db().await;
        let (deal, payment) = seed_paid_ready_deal(&repo).await;
        let now = TimeMs::new(1_767_225_700_000);
        let (txn, entries, invoice, history) = settlement_fixtures(&deal, &payment, now);

        assert!(repo
            .settle_verified_payment_atomic(
                &payment.id,
                &deal.id,
                &deal.employee_id,
                &txn,
                &entries,
                &invoice,
                &history,
                now,
            )
            .await
            .unwrap());

        // Second attempt with fresh ids: the PENDING guard must win.
        let (txn2, entries2, invoice2, history2) = settlement_fixtures(&deal, &payment, now);
        let applied = repo
            .settle_verified_payment_atomic(
                &payment.id,
                &deal.id,
                &deal.employee_id,
                &txn2,
                &entries2,
                &invoice2,
                &history2,
                now,
            )
            .await
            .unwrap();
        assert!(!applied);

        let first = repo.list_ledger_entries(&txn.id).await.unwrap();
        let second = repo.list_ledger_entries(&txn2.id).await.unwrap();
        assert_eq!(first.len(), 5);
        assert!(second.is_empty());
    }
}
