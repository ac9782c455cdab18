//! Platform settings, employee commission rates, and the activity log.

use super::Repository;
use crate::domain::{
    ActorType, CommissionMethod, Decimal, PlatformSettings, TimeMs,
};
use sqlx::Row;

impl Repository {
    /// Most recently updated settings row, or the documented defaults when
    /// none exists. Always re-read per computation; never cached across
    /// requests, since an admin may change rates at any time.
    pub async fn get_platform_settings(&self) -> Result<PlatformSettings, sqlx::Error> {
        let row = sqlx::query(
            "SELECT * FROM platform_settings ORDER BY updated_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(self.pool())
        .await?;

        Ok(match row {
            Some(r) => PlatformSettings {
                platform_commission_rate: Self::parse_decimal(
                    &r.get::<String, _>("platform_commission_rate"),
                    "platform_settings.platform_commission_rate",
                ),
                shipping_commission_rate: Self::parse_decimal(
                    &r.get::<String, _>("shipping_commission_rate"),
                    "platform_settings.shipping_commission_rate",
                ),
                cbm_rate: r
                    .get::<Option<String>, _>("cbm_rate")
                    .map(|s| Self::parse_decimal(&s, "platform_settings.cbm_rate")),
                commission_method: CommissionMethod::parse(
                    &r.get::<String, _>("commission_method"),
                )
                .unwrap_or(CommissionMethod::Percentage),
            },
            None => PlatformSettings::defaults(),
        })
    }

    /// Append a new settings row; reads pick the latest.
    pub async fn update_platform_settings(
        &self,
        settings: &PlatformSettings,
        now: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO platform_settings
            (platform_commission_rate, shipping_commission_rate, cbm_rate, commission_method, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(settings.platform_commission_rate.to_canonical_string())
        .bind(settings.shipping_commission_rate.to_canonical_string())
        .bind(settings.cbm_rate.map(|d| d.to_canonical_string()))
        .bind(settings.commission_method.as_str())
        .bind(now.as_i64())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// The commission rate of the deal's assigned employee, if a profile
    /// exists. Callers apply the 1.0% default on None.
    pub async fn get_employee_rate(
        &self,
        employee_id: &str,
    ) -> Result<Option<Decimal>, sqlx::Error> {
        let row = sqlx::query("SELECT commission_rate FROM employee_profiles WHERE id = ?")
            .bind(employee_id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| {
            Self::parse_decimal(
                &r.get::<String, _>("commission_rate"),
                "employee_profiles.commission_rate",
            )
        }))
    }

    pub async fn set_employee_rate(
        &self,
        employee_id: &str,
        rate: Decimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO employee_profiles (id, commission_rate) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET commission_rate = excluded.commission_rate
            "#,
        )
        .bind(employee_id)
        .bind(rate.to_canonical_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Best-effort audit record; callers swallow failures.
    pub async fn record_activity(
        &self,
        actor_type: ActorType,
        action: &str,
        entity_type: &str,
        entity_id: &str,
        description: &str,
        metadata: Option<&serde_json::Value>,
        now: TimeMs,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO activity_log
            (id, actor_type, action, entity_type, entity_id, description, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(actor_type.as_str())
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(description)
        .bind(metadata.map(|m| m.to_string()))
        .bind(now.as_i64())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Number of audit rows for one entity, used by tests and admin views.
    pub async fn count_activity_for_entity(&self, entity_id: &str) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) as n FROM activity_log WHERE entity_id = ?")
            .bind(entity_id)
            .fetch_one(self.pool())
            .await?;
        Ok(row.get("n"))
    }
}
