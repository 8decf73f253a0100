//! # Invoice Repository
//!
//! Database operations for POS and Sales invoices, their lines and payment
//! rows.
//!
//! ## Invoice Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Invoice Lifecycle                                 │
//! │                                                                         │
//! │  1. INSERT (draft)                                                     │
//! │     └── insert() → name from naming series, header + lines + payments  │
//! │         in one transaction; UNIQUE(doctype, offline_id) may refuse it  │
//! │                                                                         │
//! │  2. (OPTIONAL) SAVE                                                    │
//! │     └── save() → paid amount, remarks and payment rows of a draft      │
//! │                                                                         │
//! │  3. SUBMIT                                                             │
//! │     └── submit() → docstatus submitted, status Paid / Unpaid / ...     │
//! │         POS invoices are refused unless fully paid                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tillpoint_core::{
    CoreError, DocStatus, InvoiceItem, InvoiceKind, InvoiceRecord, InvoiceStatus, Money, PaymentRow,
};

// =============================================================================
// Input Type
// =============================================================================

/// A draft invoice that has not been named yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    pub doctype: InvoiceKind,
    pub customer: String,
    pub company: String,
    pub pos_profile: Option<String>,
    pub is_pos: bool,
    pub posting_date: NaiveDate,
    pub remarks: Option<String>,
    pub offline_id: Option<String>,
    pub grand_total: Money,
    pub rounded_total: Option<Money>,
    pub paid_amount: Money,
    pub owner: String,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<PaymentRow>,
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct InvoiceRow {
    name: String,
    doctype: InvoiceKind,
    docstatus: DocStatus,
    status: InvoiceStatus,
    customer: String,
    company: String,
    pos_profile: Option<String>,
    is_pos: bool,
    posting_date: NaiveDate,
    remarks: Option<String>,
    offline_id: Option<String>,
    grand_total_cents: i64,
    rounded_total_cents: Option<i64>,
    paid_amount_cents: i64,
    owner: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ItemLineRow {
    item_code: String,
    qty: f64,
    rate_cents: i64,
    amount_cents: i64,
    serial_no: Option<String>,
}

#[derive(Debug, FromRow)]
struct PaymentLineRow {
    mode_of_payment: String,
    account: Option<String>,
    amount_cents: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Inserts a draft invoice and returns it with its assigned name.
    ///
    /// ## Naming
    /// `<series prefix>-<posting year>-<5-digit counter>`, e.g.
    /// `ACC-PSINV-2026-00001`. The counter is bumped in the same transaction,
    /// so a refused insert does not burn a number.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` when another invoice of the same doctype
    /// already carries `offline_id`.
    pub async fn insert(&self, new: NewInvoice) -> DbResult<InvoiceRecord> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let prefix = format!(
            "{}-{}-",
            new.doctype.series_prefix(),
            new.posting_date.year()
        );
        let counter: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO naming_series (prefix, current) VALUES (?1, 1)
            ON CONFLICT(prefix) DO UPDATE SET current = current + 1
            RETURNING current
            "#,
        )
        .bind(&prefix)
        .fetch_one(&mut *tx)
        .await?;
        let name = format!("{}{:05}", prefix, counter);

        debug!(name = %name, doctype = %new.doctype, "Inserting invoice");

        sqlx::query(
            r#"
            INSERT INTO invoices (
                name, doctype, docstatus, status,
                customer, company, pos_profile, is_pos, posting_date,
                remarks, offline_id,
                grand_total_cents, rounded_total_cents, paid_amount_cents,
                owner, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8, ?9,
                ?10, ?11,
                ?12, ?13, ?14,
                ?15, ?16, ?17
            )
            "#,
        )
        .bind(&name)
        .bind(new.doctype)
        .bind(DocStatus::Draft)
        .bind(InvoiceStatus::Draft)
        .bind(&new.customer)
        .bind(&new.company)
        .bind(&new.pos_profile)
        .bind(new.is_pos)
        .bind(new.posting_date)
        .bind(&new.remarks)
        .bind(&new.offline_id)
        .bind(new.grand_total.cents())
        .bind(new.rounded_total.map(|m| m.cents()))
        .bind(new.paid_amount.cents())
        .bind(&new.owner)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (idx, item) in new.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (invoice, idx, item_code, qty, rate_cents, amount_cents, serial_no)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&name)
            .bind(idx as i64)
            .bind(&item.item_code)
            .bind(item.qty)
            .bind(item.rate.cents())
            .bind(item.amount.cents())
            .bind(&item.serial_no)
            .execute(&mut *tx)
            .await?;
        }

        insert_payments(&mut tx, &name, &new.payments).await?;

        tx.commit().await?;

        Ok(InvoiceRecord {
            name,
            doctype: new.doctype,
            docstatus: DocStatus::Draft,
            status: InvoiceStatus::Draft,
            customer: new.customer,
            company: new.company,
            pos_profile: new.pos_profile,
            is_pos: new.is_pos,
            posting_date: new.posting_date,
            remarks: new.remarks,
            offline_id: new.offline_id,
            grand_total: new.grand_total,
            rounded_total: new.rounded_total,
            paid_amount: new.paid_amount,
            owner: new.owner,
            items: new.items,
            payments: new.payments,
            created_at: now,
            updated_at: now,
        })
    }

    /// Finds an invoice by its dedicated offline id.
    pub async fn find_by_offline_id(
        &self,
        doctype: InvoiceKind,
        offline_id: &str,
    ) -> DbResult<Option<String>> {
        let name = sqlx::query_scalar(
            "SELECT name FROM invoices WHERE doctype = ?1 AND offline_id = ?2 LIMIT 1",
        )
        .bind(doctype)
        .bind(offline_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(name)
    }

    /// Finds the oldest invoice whose remarks contain `tag` verbatim.
    ///
    /// Uses `instr` rather than `LIKE`, so `_` and `%` in the tag match
    /// only themselves.
    pub async fn find_by_remarks_tag(
        &self,
        doctype: InvoiceKind,
        tag: &str,
    ) -> DbResult<Option<String>> {
        let name = sqlx::query_scalar(
            r#"
            SELECT name FROM invoices
            WHERE doctype = ?1 AND instr(remarks, ?2) > 0
            ORDER BY created_at, name
            LIMIT 1
            "#,
        )
        .bind(doctype)
        .bind(tag)
        .fetch_optional(&self.pool)
        .await?;

        Ok(name)
    }

    /// Checks whether an invoice with this name exists for the doctype.
    pub async fn exists(&self, doctype: InvoiceKind, name: &str) -> DbResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM invoices WHERE doctype = ?1 AND name = ?2")
                .bind(doctype)
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        Ok(found.is_some())
    }

    /// Loads an invoice with its lines and payment rows.
    pub async fn get(&self, doctype: InvoiceKind, name: &str) -> DbResult<Option<InvoiceRecord>> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            r#"
            SELECT
                name, doctype, docstatus, status,
                customer, company, pos_profile, is_pos, posting_date,
                remarks, offline_id,
                grand_total_cents, rounded_total_cents, paid_amount_cents,
                owner, created_at, updated_at
            FROM invoices
            WHERE doctype = ?1 AND name = ?2
            "#,
        )
        .bind(doctype)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items: Vec<ItemLineRow> = sqlx::query_as(
            r#"
            SELECT item_code, qty, rate_cents, amount_cents, serial_no
            FROM invoice_items WHERE invoice = ?1 ORDER BY idx
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        let payments: Vec<PaymentLineRow> = sqlx::query_as(
            r#"
            SELECT mode_of_payment, account, amount_cents
            FROM invoice_payments WHERE invoice = ?1 ORDER BY idx
            "#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(InvoiceRecord {
            name: row.name,
            doctype: row.doctype,
            docstatus: row.docstatus,
            status: row.status,
            customer: row.customer,
            company: row.company,
            pos_profile: row.pos_profile,
            is_pos: row.is_pos,
            posting_date: row.posting_date,
            remarks: row.remarks,
            offline_id: row.offline_id,
            grand_total: Money::from_cents(row.grand_total_cents),
            rounded_total: row.rounded_total_cents.map(Money::from_cents),
            paid_amount: Money::from_cents(row.paid_amount_cents),
            owner: row.owner,
            items: items
                .into_iter()
                .map(|i| InvoiceItem {
                    item_code: i.item_code,
                    qty: i.qty,
                    rate: Money::from_cents(i.rate_cents),
                    amount: Money::from_cents(i.amount_cents),
                    serial_no: i.serial_no,
                })
                .collect(),
            payments: payments
                .into_iter()
                .map(|p| PaymentRow {
                    mode_of_payment: p.mode_of_payment,
                    account: p.account,
                    amount: Money::from_cents(p.amount_cents),
                })
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    /// Persists the paid amount, remarks and payment rows of a draft.
    pub async fn save(&self, invoice: &InvoiceRecord) -> DbResult<()> {
        if !invoice.is_draft() {
            return Err(invalid_status(invoice));
        }

        debug!(name = %invoice.name, "Saving draft invoice");

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE invoices
            SET paid_amount_cents = ?1, remarks = ?2, updated_at = ?3
            WHERE doctype = ?4 AND name = ?5 AND docstatus = ?6
            "#,
        )
        .bind(invoice.paid_amount.cents())
        .bind(&invoice.remarks)
        .bind(Utc::now())
        .bind(invoice.doctype)
        .bind(&invoice.name)
        .bind(DocStatus::Draft)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(DbError::not_found(invoice.doctype.as_str(), &invoice.name));
        }

        sqlx::query("DELETE FROM invoice_payments WHERE invoice = ?1")
            .bind(&invoice.name)
            .execute(&mut *tx)
            .await?;
        insert_payments(&mut tx, &invoice.name, &invoice.payments).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Submits a draft, returning the status it was submitted with.
    ///
    /// ## Errors
    /// `DbError::Rejected` when the document rules refuse the transition,
    /// e.g. a POS invoice whose payments do not cover its total.
    pub async fn submit(&self, invoice: &InvoiceRecord) -> DbResult<InvoiceStatus> {
        let status = invoice.submission_status()?;

        debug!(name = %invoice.name, ?status, "Submitting invoice");

        let updated = sqlx::query(
            r#"
            UPDATE invoices
            SET docstatus = ?1, status = ?2, updated_at = ?3
            WHERE doctype = ?4 AND name = ?5 AND docstatus = ?6
            "#,
        )
        .bind(DocStatus::Submitted)
        .bind(status)
        .bind(Utc::now())
        .bind(invoice.doctype)
        .bind(&invoice.name)
        .bind(DocStatus::Draft)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(invalid_status(invoice));
        }

        Ok(status)
    }

    /// Counts invoices of a doctype.
    pub async fn count(&self, doctype: InvoiceKind) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE doctype = ?1")
            .bind(doctype)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

async fn insert_payments(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    invoice: &str,
    payments: &[PaymentRow],
) -> DbResult<()> {
    for (idx, payment) in payments.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO invoice_payments (invoice, idx, mode_of_payment, account, amount_cents)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(invoice)
        .bind(idx as i64)
        .bind(&payment.mode_of_payment)
        .bind(&payment.account)
        .bind(payment.amount.cents())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn invalid_status(invoice: &InvoiceRecord) -> DbError {
    DbError::Rejected(CoreError::InvalidDocStatus {
        name: invoice.name.clone(),
        docstatus: invoice.docstatus.to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
