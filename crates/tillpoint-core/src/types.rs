//! # Domain Types
//!
//! Core domain types used throughout the gateway.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  SalePayload    │   │ InvoiceRecord   │   │   PaymentRow    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  customer       │──►│  name (series)  │   │  mode_of_payment│       │
//! │  │  company        │   │  docstatus      │   │  account        │       │
//! │  │  items          │   │  status         │   │  amount         │       │
//! │  │  payments       │   │  offline_id     │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  InvoiceKind    │   │   DocStatus     │   │  InvoiceStatus  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  PosInvoice     │   │  Draft          │   │  Draft / Unpaid │       │
//! │  │  SalesInvoice   │   │  Submitted      │   │  PartlyPaid     │       │
//! │  └─────────────────┘   │  Cancelled      │   │  Paid           │       │
//! │                        └─────────────────┘   │  Consolidated   │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Invoice Kind
// =============================================================================

/// The invoice doctype an offline sale is recorded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum InvoiceKind {
    #[serde(rename = "POS Invoice")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "POS Invoice"))]
    PosInvoice,
    #[serde(rename = "Sales Invoice")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Sales Invoice"))]
    SalesInvoice,
}

impl InvoiceKind {
    /// Both kinds, in the order lookups try them.
    pub const ALL: [InvoiceKind; 2] = [InvoiceKind::PosInvoice, InvoiceKind::SalesInvoice];

    /// Canonical doctype name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceKind::PosInvoice => "POS Invoice",
            InvoiceKind::SalesInvoice => "Sales Invoice",
        }
    }

    /// Parses a doctype name, ignoring case and surrounding whitespace.
    ///
    /// ## Example
    /// ```rust
    /// use tillpoint_core::InvoiceKind;
    ///
    /// assert_eq!(InvoiceKind::parse(" pos INVOICE "), Some(InvoiceKind::PosInvoice));
    /// assert_eq!(InvoiceKind::parse("Sales Order"), None);
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "pos invoice" => Some(InvoiceKind::PosInvoice),
            "sales invoice" => Some(InvoiceKind::SalesInvoice),
            _ => None,
        }
    }

    /// Prefix of the naming series used for new records.
    pub const fn series_prefix(&self) -> &'static str {
        match self {
            InvoiceKind::PosInvoice => "ACC-PSINV",
            InvoiceKind::SalesInvoice => "ACC-SINV",
        }
    }

    /// POS invoices cannot exist without the terminal profile they came from.
    pub const fn requires_pos_profile(&self) -> bool {
        matches!(self, InvoiceKind::PosInvoice)
    }
}

impl Default for InvoiceKind {
    fn default() -> Self {
        InvoiceKind::PosInvoice
    }
}

impl fmt::Display for InvoiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Document Status
// =============================================================================

/// Lifecycle state of an invoice document.
///
/// ```text
/// Draft ──submit()──► Submitted ──cancel()──► Cancelled
///   ▲ save() keeps it here; only drafts can be edited
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocStatus {
    Draft,
    Submitted,
    Cancelled,
}

impl Default for DocStatus {
    fn default() -> Self {
        DocStatus::Draft
    }
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocStatus::Draft => "draft",
            DocStatus::Submitted => "submitted",
            DocStatus::Cancelled => "cancelled",
        })
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// Payment-completion status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Unpaid,
    PartlyPaid,
    Paid,
    /// Merged into a consolidated sales invoice at POS closing.
    Consolidated,
}

impl InvoiceStatus {
    /// Statuses that mean "nothing left to collect".
    pub const fn is_settled(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Consolidated)
    }
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Draft
    }
}

// =============================================================================
// Sale Payload
// =============================================================================

/// One validated line of an offline sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub item_code: String,
    /// Non-negative, may be fractional (weighed goods).
    pub qty: f64,
    /// Unit rate sent by the client; resolved server-side when absent.
    pub rate: Option<Money>,
    /// Newline-separated serial numbers picked at the till.
    pub serial_no: Option<String>,
}

/// A payment row on an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentRow {
    pub mode_of_payment: String,
    /// Ledger account the payment posts to (bank or cash).
    pub account: Option<String>,
    pub amount: Money,
}

impl PaymentRow {
    /// Creates a zero-amount row for the given mode.
    pub fn new(mode_of_payment: impl Into<String>, account: Option<String>) -> Self {
        PaymentRow {
            mode_of_payment: mode_of_payment.into(),
            account,
            amount: Money::zero(),
        }
    }
}

/// A fully validated offline sale, ready to become a draft invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct SalePayload {
    pub doctype: InvoiceKind,
    pub customer: String,
    pub company: String,
    pub pos_profile: Option<String>,
    pub is_pos: bool,
    pub posting_date: Option<NaiveDate>,
    pub remarks: Option<String>,
    pub offline_id: Option<String>,
    pub items: Vec<SaleLine>,
    pub payments: Vec<PaymentRow>,
}

// =============================================================================
// Invoice Record
// =============================================================================

/// A line on a persisted invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub item_code: String,
    pub qty: f64,
    pub rate: Money,
    pub amount: Money,
    pub serial_no: Option<String>,
}

/// The durable representation of an accepted sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub name: String,
    pub doctype: InvoiceKind,
    pub docstatus: DocStatus,
    pub status: InvoiceStatus,
    pub customer: String,
    pub company: String,
    pub pos_profile: Option<String>,
    pub is_pos: bool,
    pub posting_date: NaiveDate,
    pub remarks: Option<String>,
    /// Dedicated idempotency key; `None` on doctypes without the custom field.
    pub offline_id: Option<String>,
    pub grand_total: Money,
    pub rounded_total: Option<Money>,
    pub paid_amount: Money,
    pub owner: String,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<PaymentRow>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceRecord {
    /// The amount the customer owes: rounded total when rounding applies.
    pub fn payable_total(&self) -> Money {
        match self.rounded_total {
            Some(rounded) if !rounded.is_zero() => rounded,
            _ => self.grand_total,
        }
    }

    /// Sum of all payment rows, `None` if it overflows.
    pub fn payments_total(&self) -> Option<Money> {
        Money::checked_sum(self.payments.iter().map(|p| p.amount))
    }

    /// Checks whether the document can still be edited.
    pub fn is_draft(&self) -> bool {
        self.docstatus == DocStatus::Draft
    }

    /// Validates the draft → submitted transition and returns the status the
    /// submitted document takes.
    ///
    /// ## Rules
    /// - Only drafts can be submitted
    /// - POS invoices must be paid in full
    /// - Sales invoices may be submitted unpaid or partly paid
    pub fn submission_status(&self) -> CoreResult<InvoiceStatus> {
        if !self.is_draft() {
            return Err(CoreError::InvalidDocStatus {
                name: self.name.clone(),
                docstatus: self.docstatus.to_string(),
            });
        }

        let total = self.payable_total();
        let rows_total = self
            .payments_total()
            .ok_or_else(|| ValidationError::too_large("Paid amount"))?;
        let paid = self.paid_amount.max(rows_total);

        if paid >= total {
            return Ok(InvoiceStatus::Paid);
        }

        if self.doctype == InvoiceKind::PosInvoice {
            return Err(CoreError::PaymentShortfall {
                name: self.name.clone(),
                paid,
                total,
            });
        }

        if paid.is_positive() {
            Ok(InvoiceStatus::PartlyPaid)
        } else {
            Ok(InvoiceStatus::Unpaid)
        }
    }
}

// =============================================================================
// POS Profile
// =============================================================================

/// A payment method configured on a POS profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePaymentMethod {
    pub mode_of_payment: String,
    pub is_default: bool,
}

/// Terminal defaults: location, price list, payment methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosProfile {
    pub name: String,
    pub company: String,
    pub warehouse: Option<String>,
    pub selling_price_list: Option<String>,
    pub disable_rounded_total: bool,
    /// In configured order; the first row is the fallback method.
    pub payments: Vec<ProfilePaymentMethod>,
}

// =============================================================================
// Item Availability
// =============================================================================

/// Stock figure for one item at the profile's warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemAvailability {
    pub actual_qty: f64,
    /// `None` when the item could not be looked up at all.
    pub is_stock_item: Option<bool>,
}

impl ItemAvailability {
    /// Stock-tracked item with the given quantity on hand.
    pub fn tracked(actual_qty: f64) -> Self {
        ItemAvailability {
            actual_qty,
            is_stock_item: Some(true),
        }
    }

    /// Non-stock (service) item or an unknown code.
    pub fn untracked() -> Self {
        ItemAvailability {
            actual_qty: 0.0,
            is_stock_item: Some(false),
        }
    }

    /// Lookup failed for this item.
    pub fn unknown() -> Self {
        ItemAvailability {
            actual_qty: 0.0,
            is_stock_item: None,
        }
    }
}

// =============================================================================
// Operation Outcomes
// =============================================================================

/// A best-effort step that did not run, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SkippedStep {
    pub step: String,
    pub reason: String,
}

impl SkippedStep {
    pub fn new(step: impl Into<String>, reason: impl Into<String>) -> Self {
        SkippedStep {
            step: step.into(),
            reason: reason.into(),
        }
    }
}

/// Response of `submit_sale` and `mark_paid`.
///
/// ```json
/// { "ok": true, "name": "ACC-PSINV-2026-00001", "message": "Already processed" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub name: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_steps: Vec<SkippedStep>,
}

impl SaleOutcome {
    pub const ALREADY_PROCESSED: &'static str = "Already processed";
    pub const CREATED: &'static str = "created";
    pub const CREATED_DRAFT: &'static str = "created (draft)";
    pub const SUBMITTED: &'static str = "submitted";
    pub const SAVED_DRAFT: &'static str = "saved (draft)";
    pub const ALREADY_SUBMITTED: &'static str = "already submitted";
    pub const NOT_FOUND: &'static str = "Invoice not found";

    /// Successful outcome for the named record.
    pub fn done(name: impl Into<String>, message: &str) -> Self {
        SaleOutcome {
            ok: true,
            name: Some(name.into()),
            message: message.to_string(),
            skipped_steps: Vec::new(),
        }
    }

    /// Lookup found nothing to act on.
    pub fn not_found() -> Self {
        SaleOutcome {
            ok: false,
            name: None,
            message: Self::NOT_FOUND.to_string(),
            skipped_steps: Vec::new(),
        }
    }

    /// Attaches the best-effort steps that were skipped along the way.
    pub fn with_skipped(mut self, skipped: Vec<SkippedStep>) -> Self {
        self.skipped_steps = skipped;
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
