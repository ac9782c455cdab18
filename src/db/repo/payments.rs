//! Payment, transaction, ledger, and invoice reads/writes.
//!
//! The settlement unit of work itself lives in `mod.rs`; this file holds the
//! single-entity operations around it.

use super::Repository;
use crate::domain::{
    DealId, Decimal, EntryType, FinancialTransaction, Invoice, LedgerAccount, LedgerEntry,
    Payment, PaymentId, PaymentStatus, PersonId, TimeMs,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

impl Repository {
    pub async fn insert_payment(&self, payment: &Payment) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO payments
            (id, deal_id, amount, method, status, transaction_ref, receipt_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.as_str())
        .bind(payment.deal_id.as_str())
        .bind(payment.amount.to_canonical_string())
        .bind(&payment.method)
        .bind(payment.status.as_str())
        .bind(payment.transaction_ref.clone())
        .bind(payment.receipt_url.clone())
        .bind(payment.created_at.as_i64())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_payment(&self, id: &PaymentId) -> Result<Option<Payment>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM payments WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| Self::payment_from_row(&r)))
    }

    /// PENDING -> FAILED with verifier stamps. Returns false when the payment
    /// was not PENDING (another verification already resolved it).
    pub async fn fail_payment(
        &self,
        id: &PaymentId,
        verifier: &PersonId,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'FAILED', verified_at = ?, verified_by = ?
            WHERE id = ? AND status = 'PENDING'
            "#,
        )
        .bind(now.as_i64())
        .bind(verifier.as_str())
        .bind(id.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// True when the deal has at least one COMPLETED payment; required before
    /// settlement.
    pub async fn has_completed_payment(&self, deal_id: &DealId) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) as n FROM payments WHERE deal_id = ? AND status = 'COMPLETED'",
        )
        .bind(deal_id.as_str())
        .fetch_one(self.pool())
        .await?;

        Ok(row.get::<i64, _>("n") > 0)
    }

    pub async fn get_transaction_for_deal(
        &self,
        deal_id: &DealId,
    ) -> Result<Option<FinancialTransaction>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT * FROM financial_transactions WHERE deal_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(deal_id.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| Self::transaction_from_row(&r)))
    }

    pub async fn list_ledger_entries(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM ledger_entries WHERE transaction_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(transaction_id)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|r| LedgerEntry {
                id: r.get("id"),
                transaction_id: r.get("transaction_id"),
                account: LedgerAccount::parse(&r.get::<String, _>("account"))
                    .unwrap_or(LedgerAccount::Platform),
                account_holder_id: r
                    .get::<Option<String>, _>("account_holder_id")
                    .map(PersonId::new),
                entry_type: EntryType::parse(&r.get::<String, _>("entry_type"))
                    .unwrap_or(EntryType::Credit),
                amount: Self::parse_decimal(&r.get::<String, _>("amount"), "ledger_entries.amount"),
                description: r.get("description"),
                deal_number: r.get("deal_number"),
                balance_before: Self::parse_decimal(
                    &r.get::<String, _>("balance_before"),
                    "ledger_entries.balance_before",
                ),
                balance_after: Self::parse_decimal(
                    &r.get::<String, _>("balance_after"),
                    "ledger_entries.balance_after",
                ),
                created_at: TimeMs::new(r.get("created_at")),
            })
            .collect())
    }

    pub async fn get_invoice(&self, deal_id: &DealId) -> Result<Option<Invoice>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM invoices WHERE deal_id = ?")
            .bind(deal_id.as_str())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| Invoice {
            id: r.get("id"),
            deal_id: DealId::new(r.get("deal_id")),
            transaction_id: r.get("transaction_id"),
            invoice_number: r.get("invoice_number"),
            deal_amount: Self::parse_decimal(
                &r.get::<String, _>("deal_amount"),
                "invoices.deal_amount",
            ),
            platform_commission: Self::parse_decimal(
                &r.get::<String, _>("platform_commission"),
                "invoices.platform_commission",
            ),
            shipping_commission: Self::parse_decimal(
                &r.get::<String, _>("shipping_commission"),
                "invoices.shipping_commission",
            ),
            employee_commission: Self::parse_decimal(
                &r.get::<String, _>("employee_commission"),
                "invoices.employee_commission",
            ),
            total_amount: Self::parse_decimal(
                &r.get::<String, _>("total_amount"),
                "invoices.total_amount",
            ),
            document_url: r.get("document_url"),
            verification_code_url: r.get("verification_code_url"),
            created_at: TimeMs::new(r.get("created_at")),
        }))
    }

    /// Attach (or replace) the rendered document references on an invoice.
    /// The financial breakdown columns are never updated.
    pub async fn set_invoice_document(
        &self,
        invoice_id: &str,
        document_url: &str,
        verification_code_url: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE invoices SET document_url = ?, verification_code_url = ? WHERE id = ?",
        )
        .bind(document_url)
        .bind(verification_code_url)
        .bind(invoice_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    fn payment_from_row(row: &SqliteRow) -> Payment {
        Payment {
            id: PaymentId::new(row.get("id")),
            deal_id: DealId::new(row.get("deal_id")),
            amount: Self::parse_decimal(&row.get::<String, _>("amount"), "payments.amount"),
            method: row.get("method"),
            status: PaymentStatus::parse(&row.get::<String, _>("status"))
                .unwrap_or(PaymentStatus::Pending),
            transaction_ref: row.get("transaction_ref"),
            receipt_url: row.get("receipt_url"),
            verified_at: row.get::<Option<i64>, _>("verified_at").map(TimeMs::new),
            verified_by: row.get::<Option<String>, _>("verified_by").map(PersonId::new),
            created_at: TimeMs::new(row.get("created_at")),
        }
    }

    fn transaction_from_row(row: &SqliteRow) -> FinancialTransaction {
        FinancialTransaction {
            id: row.get("id"),
            deal_id: DealId::new(row.get("deal_id")),
            payment_id: PaymentId::new(row.get("payment_id")),
            employee_id: PersonId::new(row.get("employee_id")),
            trader_id: PersonId::new(row.get("trader_id")),
            amount: Self::parse_decimal(
                &row.get::<String, _>("amount"),
                "financial_transactions.amount",
            ),
            platform_commission: Self::parse_decimal(
                &row.get::<String, _>("platform_commission"),
                "financial_transactions.platform_commission",
            ),
            shipping_commission: Self::parse_decimal(
                &row.get::<String, _>("shipping_commission"),
                "financial_transactions.shipping_commission",
            ),
            employee_commission: Self::parse_decimal(
                &row.get::<String, _>("employee_commission"),
                "financial_transactions.employee_commission",
            ),
            trader_amount: Self::parse_decimal(
                &row.get::<String, _>("trader_amount"),
                "financial_transactions.trader_amount",
            ),
            created_at: TimeMs::new(row.get("created_at")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::{ActorType, Deal, DealStatus, StatusHistoryEntry};
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

    async fn seed_deal(repo: &Repository, now: TimeMs) -> Deal {
        let deal = Deal {
            id: DealId::generate(),
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
            description: "created".into(),
            changed_by: None,
            changed_by_type: ActorType::System,
            created_at: now,
        };
        repo.create_deal_atomic(&deal, &[], &history).await.unwrap()
    }

    fn pending_payment(deal_id: &DealId, now: TimeMs) -> Payment {
        Payment {
            id: PaymentId::generate(),
            deal_id: deal_id.clone(),
            amount: Decimal::from_i64(1085),
            method: "BANK_TRANSFER".into(),
            status: PaymentStatus::Pending,
            transaction_ref: Some("ref-1".into()),
            receipt_url: None,
            verified_at: None,
            verified_by: None,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_payment_roundtrip() {
        let (repo, _temp) = setup_test_db().await;
        let now = TimeMs::new(1_767_225_600_000);
        let deal = seed_deal(&repo, now).await;
        let payment = pending_payment(&deal.id, now);

        repo.insert_payment(&payment).await.unwrap();
        let stored = repo.get_payment(&payment.id).await.unwrap().unwrap();
        assert_eq!(stored, payment);
    }

    #[tokio::test]
    async fn test_fail_payment_once() {
        let (repo, _temp) = setup_test_db().await;
        let now = TimeMs::new(1_767_225_600_000);
        let deal = seed_deal(&repo, now).await;
        let payment = pending_payment(&deal.id, now);
        repo.insert_payment(&payment).await.unwrap();

        let verifier = PersonId::new("emp-1".into());
        assert!(repo.fail_payment(&payment.id, &verifier, now).await.unwrap());
        // Already FAILED: the guard rejects the second attempt.
        assert!(!repo.fail_payment(&payment.id, &verifier, now).await.unwrap());

        let stored = repo.get_payment(&payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
        assert_eq!(stored.verified_by, Some(verifier));
    }

    #[tokio::test]
    async fn test_has_completed_payment() {
        let (repo, _temp) = setup_test_db().await;
        let now = TimeMs::new(1_767_225_600_000);
        let deal = seed_deal(&repo, now).await;
        assert!(!repo.has_completed_payment(&deal.id).await.unwrap());

        let mut payment = pending_payment(&deal.id, now);
        payment.status = PaymentStatus::Completed;
        repo.insert_payment(&payment).await.unwrap();
        assert!(repo.has_completed_payment(&deal.id).await.unwrap());
    }
}
