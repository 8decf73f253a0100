//! # Settings Repository
//!
//! Single-valued settings documents and custom-field metadata.
//!
//! ```text
//! singles        ("POS Settings", "invoice_type") → "POS Invoice"
//! custom_fields  ("POS Invoice", "custom_pos_offline_id")
//! ```

use sqlx::SqlitePool;

use crate::error::DbResult;

/// Settings document read by sale submission.
pub const POS_SETTINGS: &str = "POS Settings";

/// Repository for settings and metadata.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Reads one field of a single-valued settings document.
    pub async fn get_single_value(&self, doctype: &str, field: &str) -> DbResult<Option<String>> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT value FROM singles WHERE doctype = ?1 AND field = ?2")
                .bind(doctype)
                .bind(field)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value.flatten())
    }

    /// Writes one field of a single-valued settings document.
    pub async fn set_single_value(&self, doctype: &str, field: &str, value: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO singles (doctype, field, value) VALUES (?1, ?2, ?3)
            ON CONFLICT(doctype, field) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(doctype)
        .bind(field)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The configured POS invoice doctype, as stored.
    pub async fn invoice_type(&self) -> DbResult<Option<String>> {
        self.get_single_value(POS_SETTINGS, "invoice_type").await
    }

    /// Checks whether a doctype has a (custom) field.
    pub async fn has_field(&self, doctype: &str, fieldname: &str) -> DbResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM custom_fields WHERE doctype = ?1 AND fieldname = ?2")
                .bind(doctype)
                .bind(fieldname)
                .fetch_optional(&self.pool)
                .await?;

        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use tillpoint_core::OFFLINE_ID_FIELD;

    #[tokio::test]
    async fn test_single_values() {
        let settings = Database::new(DbConfig::in_memory()).await.unwrap().settings();
        assert_eq!(settings.invoice_type().await.unwrap(), None);

        settings
            .set_single_value(POS_SETTINGS, "invoice_type", "Sales Invoice")
            .await
            .unwrap();
        assert_eq!(settings.invoice_type().await.unwrap().as_deref(), Some("Sales Invoice"));
    }

    #[tokio::test]
    async fn test_offline_id_field_only_on_pos_invoice() {
        let settings = Database::new(DbConfig::in_memory()).await.unwrap().settings();
        assert!(settings.has_field("POS Invoice", OFFLINE_ID_FIELD).await.unwrap());
        assert!(!settings.has_field("Sales Invoice", OFFLINE_ID_FIELD).await.unwrap());
    }
}
