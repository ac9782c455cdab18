//! Deal aggregate operations: creation, reads, guarded status flips, items,
//! negotiation messages, and status history.

use super::Repository;
use crate::domain::{
    Actor, ActorType, Deal, DealId, DealItem, DealStatus, Decimal, NegotiationMessage, PersonId,
    ShippingType, StatusHistoryEntry, TimeMs,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Catalog row a deal item snapshots from.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferItemRow {
    pub id: String,
    pub name: String,
    pub unit_price: Decimal,
    pub cartons: i64,
    pub cbm: Decimal,
}

/// Fields written when a deal enters APPROVED.
///
/// Trader approval mints the invoice artifacts; client acceptance passes
/// `None` for them (the official quote was already minted).
#[derive(Debug, Clone)]
pub struct DealApproval {
    pub negotiated_amount: Decimal,
    pub total_cartons: i64,
    pub total_cbm: Decimal,
    pub shipping_type: Option<ShippingType>,
    pub invoice_number: Option<String>,
    pub barcode: Option<String>,
    pub qr_code_url: Option<String>,
}

impl Repository {
    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a deal, its items, and its first history row in one
    /// transaction. The deal number is minted from the atomic `counters`
    /// table inside the same transaction, so concurrent creations cannot
    /// collide.
    pub async fn create_deal_atomic(
        &self,
        deal: &Deal,
        items: &[DealItem],
        history: &StatusHistoryEntry,
    ) -> Result<Deal, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let year = deal.created_at.year();
        let scope = format!("deal:{}", year);
        sqlx::query(
            r#"
            INSERT INTO counters (scope, value) VALUES (?, 1)
            ON CONFLICT(scope) DO UPDATE SET value = value + 1
            "#,
        )
        .bind(&scope)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query("SELECT value FROM counters WHERE scope = ?")
            .bind(&scope)
            .fetch_one(&mut *tx)
            .await?;
        let seq: i64 = row.get("value");
        let deal_number = format!("DEAL-{}-{:06}", year, seq);

        sqlx::query(
            r#"
            INSERT INTO deals
            (id, deal_number, trader_id, client_id, employee_id, shipping_company_id,
             status, negotiated_amount, total_cartons, total_cbm, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(deal.id.as_str())
        .bind(&deal_number)
        .bind(deal.trader_id.as_str())
        .bind(deal.client_id.as_str())
        .bind(deal.employee_id.as_str())
        .bind(deal.shipping_company_id.as_ref().map(|p| p.as_str().to_string()))
        .bind(deal.status.as_str())
        .bind(deal.negotiated_amount.map(|d| d.to_canonical_string()))
        .bind(deal.total_cartons)
        .bind(deal.total_cbm.to_canonical_string())
        .bind(deal.created_at.as_i64())
        .execute(&mut *tx)
        .await?;

        for item in items {
            Self::insert_item_tx(&mut tx, item).await?;
        }

        Self::insert_history_tx(&mut tx, history).await?;

        tx.commit().await?;

        let mut created = deal.clone();
        created.deal_number = deal_number;
        Ok(created)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_deal(&self, id: &DealId) -> Result<Option<Deal>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM deals WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| Self::deal_from_row(&r)))
    }

    /// List deals visible to the calling actor: clients and traders see their
    /// own deals, employees see the deals they guarantee, admins see all.
    pub async fn list_deals_for_actor(&self, actor: &Actor) -> Result<Vec<Deal>, sqlx::Error> {
        let rows = match actor.actor_type {
            ActorType::Client => {
                sqlx::query("SELECT * FROM deals WHERE client_id = ? ORDER BY created_at DESC")
                    .bind(actor.id.as_str())
                    .fetch_all(self.pool())
                    .await?
            }
            ActorType::Trader => {
                sqlx::query("SELECT * FROM deals WHERE trader_id = ? ORDER BY created_at DESC")
                    .bind(actor.id.as_str())
                    .fetch_all(self.pool())
                    .await?
            }
            ActorType::Employee => {
                sqlx::query("SELECT * FROM deals WHERE employee_id = ? ORDER BY created_at DESC")
                    .bind(actor.id.as_str())
                    .fetch_all(self.pool())
                    .await?
            }
            ActorType::Admin | ActorType::System => {
                sqlx::query("SELECT * FROM deals ORDER BY created_at DESC")
                    .fetch_all(self.pool())
                    .await?
            }
        };

        Ok(rows.iter().map(Self::deal_from_row).collect())
    }

    pub async fn get_deal_items(&self, deal_id: &DealId) -> Result<Vec<DealItem>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM deal_items WHERE deal_id = ? ORDER BY id ASC")
            .bind(deal_id.as_str())
            .fetch_all(self.pool())
            .await?;

        Ok(rows
            .iter()
            .map(|r| DealItem {
                id: r.get("id"),
                deal_id: DealId::new(r.get("deal_id")),
                offer_item_id: r.get("offer_item_id"),
                quantity: r.get("quantity"),
                cartons: r.get("cartons"),
                cbm: Self::parse_decimal(&r.get::<String, _>("cbm"), "deal_items.cbm"),
                negotiated_price: r
                    .get::<Option<String>, _>("negotiated_price")
                    .map(|s| Self::parse_decimal(&s, "deal_items.negotiated_price")),
                unit_price: Self::parse_decimal(
                    &r.get::<String, _>("unit_price"),
                    "deal_items.unit_price",
                ),
            })
            .collect())
    }

    // =========================================================================
    // Items (replace wholesale during NEGOTIATION)
    // =========================================================================

    /// Delete-then-recreate the item set inside one transaction.
    pub async fn replace_deal_items(
        &self,
        deal_id: &DealId,
        items: &[DealItem],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM deal_items WHERE deal_id = ?")
            .bind(deal_id.as_str())
            .execute(&mut *tx)
            .await?;

        for item in items {
            Self::insert_item_tx(&mut tx, item).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_item_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        item: &DealItem,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO deal_items
            (id, deal_id, offer_item_id, quantity, cartons, cbm, negotiated_price, unit_price)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(item.deal_id.as_str())
        .bind(&item.offer_item_id)
        .bind(item.quantity)
        .bind(item.cartons)
        .bind(item.cbm.to_canonical_string())
        .bind(item.negotiated_price.map(|d| d.to_canonical_string()))
        .bind(item.unit_price.to_canonical_string())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Guarded status flips
    // =========================================================================

    /// NEGOTIATION -> APPROVED with the approval fields, plus history, in one
    /// transaction. Returns false when the deal was not in NEGOTIATION.
    pub async fn approve_deal_atomic(
        &self,
        deal_id: &DealId,
        approval: &DealApproval,
        history: &StatusHistoryEntry,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE deals
            SET status = 'APPROVED',
                negotiated_amount = ?,
                total_cartons = ?,
                total_cbm = ?,
                shipping_type = COALESCE(?, shipping_type),
                invoice_number = COALESCE(?, invoice_number),
                barcode = COALESCE(?, barcode),
                qr_code_url = COALESCE(?, qr_code_url),
                approved_at = ?
            WHERE id = ? AND status = 'NEGOTIATION'
            "#,
        )
        .bind(approval.negotiated_amount.to_canonical_string())
        .bind(approval.total_cartons)
        .bind(approval.total_cbm.to_canonical_string())
        .bind(approval.shipping_type.map(|s| s.as_str().to_string()))
        .bind(approval.invoice_number.clone())
        .bind(approval.barcode.clone())
        .bind(approval.qr_code_url.clone())
        .bind(now.as_i64())
        .bind(deal_id.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        Self::insert_history_tx(&mut tx, history).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// NEGOTIATION -> CANCELLED with a reason, plus history, in one
    /// transaction. Used by client reject/cancel and the lazy expiry sweep;
    /// the status guard makes the sweep safe against a racing accept.
    pub async fn cancel_deal_atomic(
        &self,
        deal_id: &DealId,
        reason: &str,
        history: &StatusHistoryEntry,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE deals
            SET status = 'CANCELLED', cancellation_reason = ?, cancelled_at = ?
            WHERE id = ? AND status = 'NEGOTIATION'
            "#,
        )
        .bind(reason)
        .bind(now.as_i64())
        .bind(deal_id.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        Self::insert_history_tx(&mut tx, history).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// PAID -> SETTLED plus history. Returns false unless the deal was PAID.
    pub async fn settle_deal_atomic(
        &self,
        deal_id: &DealId,
        history: &StatusHistoryEntry,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE deals
            SET status = 'SETTLED', settled_at = ?
            WHERE id = ? AND status = 'PAID'
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
        tx.commit().await?;
        Ok(true)
    }

    /// Stamp `quote_sent_at`; only meaningful while negotiating.
    pub async fn mark_quote_sent(
        &self,
        deal_id: &DealId,
        now: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE deals SET quote_sent_at = ? WHERE id = ? AND status = 'NEGOTIATION'",
        )
        .bind(now.as_i64())
        .bind(deal_id.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Negotiation messages
    // =========================================================================

    pub async fn insert_message(&self, msg: &NegotiationMessage) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO negotiation_messages
            (id, deal_id, sender_type, sender_id, message, proposed_price,
             proposed_quantity, is_read, read_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, NULL, ?)
            "#,
        )
        .bind(&msg.id)
        .bind(msg.deal_id.as_str())
        .bind(msg.sender_type.as_str())
        .bind(msg.sender_id.as_str())
        .bind(msg.message.clone())
        .bind(msg.proposed_price.map(|d| d.to_canonical_string()))
        .bind(msg.proposed_quantity)
        .bind(msg.created_at.as_i64())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn list_messages(
        &self,
        deal_id: &DealId,
    ) -> Result<Vec<NegotiationMessage>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM negotiation_messages WHERE deal_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(deal_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(Self::message_from_row).collect())
    }

    /// Mark every message not sent by `reader_type` as read. The read flag is
    /// the only mutation the log ever sees.
    pub async fn mark_messages_read(
        &self,
        deal_id: &DealId,
        reader_type: ActorType,
        now: TimeMs,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE negotiation_messages
            SET is_read = 1, read_at = ?
            WHERE deal_id = ? AND sender_type != ? AND is_read = 0
            "#,
        )
        .bind(now.as_i64())
        .bind(deal_id.as_str())
        .bind(reader_type.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected())
    }

    /// Newest message carrying a positive proposed price, if any.
    pub async fn latest_proposed_price(
        &self,
        deal_id: &DealId,
    ) -> Result<Option<Decimal>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT proposed_price FROM negotiation_messages
            WHERE deal_id = ? AND proposed_price IS NOT NULL
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(deal_id.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row
            .and_then(|r| r.get::<Option<String>, _>("proposed_price"))
            .map(|s| Self::parse_decimal(&s, "negotiation_messages.proposed_price"))
            .filter(|d| d.is_positive()))
    }

    // =========================================================================
    // Status history
    // =========================================================================

    pub async fn insert_status_history(
        &self,
        entry: &StatusHistoryEntry,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool().begin().await?;
        Self::insert_history_tx(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_status_history(
        &self,
        deal_id: &DealId,
    ) -> Result<Vec<StatusHistoryEntry>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM deal_status_history WHERE deal_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(deal_id.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .map(|r| StatusHistoryEntry {
                id: r.get("id"),
                deal_id: DealId::new(r.get("deal_id")),
                status: DealStatus::parse(&r.get::<String, _>("status"))
                    .unwrap_or(DealStatus::Negotiation),
                description: r.get("description"),
                changed_by: r.get::<Option<String>, _>("changed_by").map(PersonId::new),
                changed_by_type: ActorType::parse(&r.get::<String, _>("changed_by_type"))
                    .unwrap_or(ActorType::System),
                created_at: TimeMs::new(r.get("created_at")),
            })
            .collect())
    }

    // =========================================================================
    // Offer item catalog
    // =========================================================================

    pub async fn insert_offer_item(&self, item: &OfferItemRow) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO offer_items (id, name, unit_price, cartons, cbm) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(item.unit_price.to_canonical_string())
        .bind(item.cartons)
        .bind(item.cbm.to_canonical_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_offer_item(&self, id: &str) -> Result<Option<OfferItemRow>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM offer_items WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| OfferItemRow {
            id: r.get("id"),
            name: r.get("name"),
            unit_price: Self::parse_decimal(
                &r.get::<String, _>("unit_price"),
                "offer_items.unit_price",
            ),
            cartons: r.get("cartons"),
            cbm: Self::parse_decimal(&r.get::<String, _>("cbm"), "offer_items.cbm"),
        }))
    }

    // =========================================================================
    // Row mapping
    // =========================================================================

    fn deal_from_row(row: &SqliteRow) -> Deal {
        Deal {
            id: DealId::new(row.get("id")),
            deal_number: row.get("deal_number"),
            trader_id: PersonId::new(row.get("trader_id")),
            client_id: PersonId::new(row.get("client_id")),
            employee_id: PersonId::new(row.get("employee_id")),
            shipping_company_id: row
                .get::<Option<String>, _>("shipping_company_id")
                .map(PersonId::new),
            status: DealStatus::parse(&row.get::<String, _>("status"))
                .unwrap_or(DealStatus::Negotiation),
            negotiated_amount: row
                .get::<Option<String>, _>("negotiated_amount")
                .map(|s| Self::parse_decimal(&s, "deals.negotiated_amount")),
            total_cartons: row.get("total_cartons"),
            total_cbm: Self::parse_decimal(&row.get::<String, _>("total_cbm"), "deals.total_cbm"),
            shipping_type: row
                .get::<Option<String>, _>("shipping_type")
                .and_then(|s| ShippingType::parse(&s)),
            invoice_number: row.get("invoice_number"),
            barcode: row.get("barcode"),
            qr_code_url: row.get("qr_code_url"),
            quote_sent_at: row.get::<Option<i64>, _>("quote_sent_at").map(TimeMs::new),
            approved_at: row.get::<Option<i64>, _>("approved_at").map(TimeMs::new),
            paid_at: row.get::<Option<i64>, _>("paid_at").map(TimeMs::new),
            settled_at: row.get::<Option<i64>, _>("settled_at").map(TimeMs::new),
            cancelled_at: row.get::<Option<i64>, _>("cancelled_at").map(TimeMs::new),
            cancellation_reason: row.get("cancellation_reason"),
            created_at: TimeMs::new(row.get("created_at")),
        }
    }

    fn message_from_row(row: &SqliteRow) -> NegotiationMessage {
        NegotiationMessage {
            id: row.get("id"),
            deal_id: DealId::new(row.get("deal_id")),
            sender_type: ActorType::parse(&row.get::<String, _>("sender_type"))
                .unwrap_or(ActorType::System),
            sender_id: PersonId::new(row.get("sender_id")),
            message: row.get("message"),
            proposed_price: row
                .get::<Option<String>, _>("proposed_price")
                .map(|s| Self::parse_decimal(&s, "negotiation_messages.proposed_price")),
            proposed_quantity: row.get("proposed_quantity"),
            is_read: row.get::<i64, _>("is_read") != 0,
            read_at: row.get::<Option<i64>, _>("read_at").map(TimeMs::new),
            created_at: TimeMs::new(row.get("created_at")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
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

    fn blank_deal(now: TimeMs) -> Deal {
        Deal {
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
        }
    }

    fn history(deal_id: &DealId, status: DealStatus, now: TimeMs) -> StatusHistoryEntry {
        StatusHistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            deal_id: deal_id.clone(),
            status,
            description: format!("-> {}", status),
            changed_by: None,
            changed_by_type: ActorType::System,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_deal_numbers_are_sequential_per_year() {
        let (repo, _temp) = setup_test_db().await;
        // 2026-01-01
        let now = TimeMs::new(1_767_225_600_000);

        let d1 = blank_deal(now);
        let d2 = blank_deal(now);
        let h1 = history(&d1.id, DealStatus::Negotiation, now);
        let h2 = history(&d2.id, DealStatus::Negotiation, now);

        let created1 = repo.create_deal_atomic(&d1, &[], &h1).await.unwrap();
        let created2 = repo.create_deal_atomic(&d2, &[], &h2).await.unwrap();

        assert_eq!(created1.deal_number, "DEAL-2026-000001");
        assert_eq!(created2.deal_number, "DEAL-2026-000002");
    }

    #[tokio::test]
    async fn test_cancel_guard_rejects_non_negotiation() {
        let (repo, _temp) = setup_test_db().await;
        let now = TimeMs::new(1_767_225_600_000);
        let deal = blank_deal(now);
        let deal = repo
            .create_deal_atomic(&deal, &[], &history(&deal.id, DealStatus::Negotiation, now))
            .await
            .unwrap();

        let approval = DealApproval {
            negotiated_amount: Decimal::from_i64(100),
            total_cartons: 1,
            total_cbm: Decimal::from_i64(1),
            shipping_type: Some(ShippingType::Sea),
            invoice_number: Some("INV-X".into()),
            barcode: None,
            qr_code_url: None,
        };
        assert!(repo
            .approve_deal_atomic(
                &deal.id,
                &approval,
                &history(&deal.id, DealStatus::Approved, now),
                now
            )
            .await
            .unwrap());

        let cancelled = repo
            .cancel_deal_atomic(
                &deal.id,
                "too late",
                &history(&deal.id, DealStatus::Cancelled, now),
                now,
            )
            .await
            .unwrap();
        assert!(!cancelled);

        let stored = repo.get_deal(&deal.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DealStatus::Approved);
        assert_eq!(stored.shipping_type, Some(ShippingType::Sea));
        // The rejected cancel left no history row behind.
        let hist = repo.get_status_history(&deal.id).await.unwrap();
        assert_eq!(hist.len(), 2);
    }

    #[tokio::test]
    async fn test_replace_items_is_wholesale() {
        let (repo, _temp) = setup_test_db().await;
        let now = TimeMs::new(1_767_225_600_000);
        let deal = blank_deal(now);
        let offer = OfferItemRow {
            id: "offer-1".into(),
            name: "Widget".into(),
            unit_price: Decimal::from_i64(10),
            cartons: 2,
            cbm: Decimal::from_i64(1),
        };
        repo.insert_offer_item(&offer).await.unwrap();

        let item = |id: &str, qty: i64| DealItem {
            id: id.into(),
            deal_id: deal.id.clone(),
            offer_item_id: "offer-1".into(),
            quantity: qty,
            cartons: 2,
            cbm: Decimal::from_i64(1),
            negotiated_price: None,
            unit_price: Decimal::from_i64(10),
        };

        let deal = repo
            .create_deal_atomic(
                &deal,
                &[item("a", 1)],
                &history(&deal.id, DealStatus::Negotiation, now),
            )
            .await
            .unwrap();

        repo.replace_deal_items(&deal.id, &[item("b", 5), item("c", 7)])
            .await
            .unwrap();

        let items = repo.get_deal_items(&deal.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.id != "a"));
    }

    #[tokio::test]
    async fn test_latest_proposed_price_skips_unpriced_messages() {
        let (repo, _temp) = setup_test_db().await;
        let now = TimeMs::new(1_767_225_600_000);
        let deal = blank_deal(now);
        let deal = repo
            .create_deal_atomic(&deal, &[], &history(&deal.id, DealStatus::Negotiation, now))
            .await
            .unwrap();

        let msg = |id: &str, price: Option<i64>, at: i64| NegotiationMessage {
            id: id.into(),
            deal_id: deal.id.clone(),
            sender_type: ActorType::Client,
            sender_id: PersonId::new("cli-1".into()),
            message: Some("hello".into()),
            proposed_price: price.map(Decimal::from_i64),
            proposed_quantity: None,
            is_read: false,
            read_at: None,
            created_at: TimeMs::new(at),
        };

        repo.insert_message(&msg("m1", Some(900), 1000)).await.unwrap();
        repo.insert_message(&msg("m2", Some(850), 2000)).await.unwrap();
        repo.insert_message(&msg("m3", None, 3000)).await.unwrap();

        let latest = repo.latest_proposed_price(&deal.id).await.unwrap();
        assert_eq!(latest, Some(Decimal::from_i64(850)));
    }

    #[tokio::test]
    async fn test_mark_messages_read_only_counterpart() {
        let (repo, _temp) = setup_test_db().await;
        let now = TimeMs::new(1_767_225_600_000);
        let deal = blank_deal(now);
        let deal = repo
            .create_deal_atomic(&deal, &[], &history(&deal.id, DealStatus::Negotiation, now))
            .await
            .unwrap();

        for (id, sender) in [("m1", ActorType::Client), ("m2", ActorType::Trader)] {
            repo.insert_message(&NegotiationMessage {
                id: id.into(),
                deal_id: deal.id.clone(),
                sender_type: sender,
                sender_id: PersonId::new("x".into()),
                message: None,
                proposed_price: None,
                proposed_quantity: None,
                is_read: false,
                read_at: None,
                created_at: now,
            })
            .await
            .unwrap();
        }

        let marked = repo
            .mark_messages_read(&deal.id, ActorType::Client, now)
            .await
            .unwrap();
        assert_eq!(marked, 1);

        let messages = repo.list_messages(&deal.id).await.unwrap();
        let trader_msg = messages.iter().find(|m| m.id == "m2").unwrap();
        let client_msg = messages.iter().find(|m| m.id == "m1").unwrap();
        assert!(trader_msg.is_read);
        assert!(!client_msg.is_read);
    }
}
