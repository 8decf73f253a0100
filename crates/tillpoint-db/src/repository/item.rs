//! # Item Repository
//!
//! Items, per-warehouse stock bins, serial numbers and item prices.
//!
//! ## Stock Lookups Used by the POS
//! ```text
//! get_available_qty(codes, profile)
//!     │
//!     ├─► stock_flags(codes)         one query for the whole batch
//!     │
//!     └─► actual_qty(code, wh)       per stock item, 0 when no bin exists
//!
//! item_details(ctx)
//!     ├─► get(code)                  has_serial_no, standard rate
//!     ├─► available_serial_nos()     FIFO by creation
//!     └─► price_list_rate()
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

use crate::error::DbResult;
use tillpoint_core::Money;

/// An item as stored.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ItemRow {
    pub item_code: String,
    pub item_name: String,
    pub is_stock_item: bool,
    pub has_serial_no: bool,
    pub standard_rate_cents: i64,
}

impl ItemRow {
    pub fn standard_rate(&self) -> Money {
        Money::from_cents(self.standard_rate_cents)
    }
}

/// Input for [`ItemRepository::upsert`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub item_code: String,
    pub item_name: String,
    pub is_stock_item: bool,
    pub has_serial_no: bool,
    pub standard_rate: Money,
}

impl NewItem {
    /// A stock-tracked item without serial numbers.
    pub fn stock(item_code: impl Into<String>, standard_rate: Money) -> Self {
        let item_code = item_code.into();
        NewItem {
            item_name: item_code.clone(),
            item_code,
            is_stock_item: true,
            has_serial_no: false,
            standard_rate,
        }
    }

    /// A service item: sold, never counted.
    pub fn service(item_code: impl Into<String>, standard_rate: Money) -> Self {
        NewItem {
            is_stock_item: false,
            ..NewItem::stock(item_code, standard_rate)
        }
    }
}

/// Repository for item and stock operations.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Checks whether an item code exists.
    pub async fn exists(&self, item_code: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM items WHERE item_code = ?1")
            .bind(item_code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }

    /// Gets an item by code.
    pub async fn get(&self, item_code: &str) -> DbResult<Option<ItemRow>> {
        let item = sqlx::query_as(
            r#"
            SELECT item_code, item_name, is_stock_item, has_serial_no, standard_rate_cents
            FROM items WHERE item_code = ?1
            "#,
        )
        .bind(item_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Fetches `is_stock_item` for a batch of codes in one query.
    ///
    /// Unknown codes are absent from the map.
    pub async fn stock_flags(&self, item_codes: &[String]) -> DbResult<HashMap<String, bool>> {
        if item_codes.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT item_code, is_stock_item FROM items WHERE item_code IN (");
        let mut separated = query.separated(", ");
        for code in item_codes {
            separated.push_bind(code);
        }
        separated.push_unseparated(")");

        let rows: Vec<(String, bool)> = query.build_query_as().fetch_all(&self.pool).await?;

        debug!(requested = item_codes.len(), found = rows.len(), "Fetched stock flags");

        Ok(rows.into_iter().collect())
    }

    /// Quantity on hand in a warehouse; zero when no bin exists.
    pub async fn actual_qty(&self, item_code: &str, warehouse: &str) -> DbResult<f64> {
        let qty: Option<f64> =
            sqlx::query_scalar("SELECT actual_qty FROM bins WHERE item_code = ?1 AND warehouse = ?2")
                .bind(item_code)
                .bind(warehouse)
                .fetch_optional(&self.pool)
                .await?;

        Ok(qty.unwrap_or(0.0))
    }

    /// Serial numbers of an item in a warehouse, oldest first.
    pub async fn available_serial_nos(&self, item_code: &str, warehouse: &str) -> DbResult<Vec<String>> {
        let serials = sqlx::query_scalar(
            r#"
            SELECT serial_no FROM serial_nos
            WHERE item_code = ?1 AND warehouse = ?2
            ORDER BY created_at, serial_no
            "#,
        )
        .bind(item_code)
        .bind(warehouse)
        .fetch_all(&self.pool)
        .await?;

        Ok(serials)
    }

    /// Rate of an item on a price list.
    pub async fn price_list_rate(&self, item_code: &str, price_list: &str) -> DbResult<Option<Money>> {
        let rate: Option<i64> = sqlx::query_scalar(
            "SELECT rate_cents FROM item_prices WHERE item_code = ?1 AND price_list = ?2",
        )
        .bind(item_code)
        .bind(price_list)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rate.map(Money::from_cents))
    }

    // =========================================================================
    // Writes (seeding and stock adjustments)
    // =========================================================================

    /// Inserts or replaces an item.
    pub async fn upsert(&self, item: &NewItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO items (item_code, item_name, is_stock_item, has_serial_no, standard_rate_cents)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(item_code) DO UPDATE SET
                item_name = excluded.item_name,
                is_stock_item = excluded.is_stock_item,
                has_serial_no = excluded.has_serial_no,
                standard_rate_cents = excluded.standard_rate_cents
            "#,
        )
        .bind(&item.item_code)
        .bind(&item.item_name)
        .bind(item.is_stock_item)
        .bind(item.has_serial_no)
        .bind(item.standard_rate.cents())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Sets the quantity on hand of an item in a warehouse.
    pub async fn set_actual_qty(&self, item_code: &str, warehouse: &str, qty: f64) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bins (item_code, warehouse, actual_qty) VALUES (?1, ?2, ?3)
            ON CONFLICT(item_code, warehouse) DO UPDATE SET actual_qty = excluded.actual_qty
            "#,
        )
        .bind(item_code)
        .bind(warehouse)
        .bind(qty)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Registers a serial number in a warehouse.
    pub async fn add_serial_no(
        &self,
        serial_no: &str,
        item_code: &str,
        warehouse: &str,
        created_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO serial_nos (serial_no, item_code, warehouse, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(serial_no)
        .bind(item_code)
        .bind(warehouse)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Sets the rate of an item on a price list.
    pub async fn set_price(&self, item_code: &str, price_list: &str, rate: Money) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO item_prices (item_code, price_list, rate_cents) VALUES (?1, ?2, ?3)
            ON CONFLICT(item_code, price_list) DO UPDATE SET rate_cents = excluded.rate_cents
            "#,
        )
        .bind(item_code)
        .bind(price_list)
        .bind(rate.cents())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts items.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
