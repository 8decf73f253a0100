//! # Error Types
//!
//! Domain-specific error types for tillpoint-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tillpoint-core errors (this file)                                     │
//! │  ├── CoreError        - Invoice lifecycle / business rule failures     │
//! │  └── ValidationError  - Sale payload rejected before any mutation      │
//! │                                                                         │
//! │  tillpoint-db errors (separate crate)                                  │
//! │  └── DbError          - Document store failures                        │
//! │                                                                         │
//! │  gateway errors (in app)                                               │
//! │  └── GatewayError     - What the POS client sees (HTTP status + text)  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → GatewayError → Client   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Messages are shown to the cashier as-is, so keep them short
//! 3. Never echo raw payload content back in an error

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invoice record cannot be found.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Invoice is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Saving or submitting an invoice that is already submitted
    /// - Submitting a cancelled invoice
    #[error("Invoice {name} is {docstatus}, cannot perform operation")]
    InvalidDocStatus { name: String, docstatus: String },

    /// POS invoices must be fully paid before they can be submitted.
    ///
    /// ## User Workflow
    /// ```text
    /// Offline sale replayed (no payment rows, profile has no methods)
    ///      │
    ///      ▼
    /// insert() ──► draft saved
    ///      │
    ///      ▼
    /// submit() ──► PaymentShortfall
    ///      │
    ///      ▼
    /// Client sees "created (draft)" and can retry mark_paid later
    /// ```
    #[error("Paid amount {paid} is less than invoice total {total} for {name}")]
    PaymentShortfall {
        name: String,
        paid: Money,
        total: Money,
    },

    /// Validation error (wraps ValidationError).
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Sale payload validation errors.
///
/// Every variant is raised before the document store is touched.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Payload string was not valid JSON.
    #[error("Invalid sale payload")]
    InvalidPayload,

    /// Payload decoded to something other than an object.
    #[error("Sale payload must be a POS Invoice doc")]
    NotADocument,

    /// Doctype resolved to something the gateway cannot create.
    #[error("Sale payload must be a POS or Sales Invoice doc")]
    UnsupportedDoctype(String),

    /// `items` present but not a list.
    #[error("Items must be a list")]
    ItemsNotAList,

    /// `items` missing or empty once the payload passed the entry checks.
    #[error("Items are required")]
    MissingItems,

    /// Item list exceeds the configured maximum.
    #[error("Too many items in sale payload (max {max})")]
    TooManyItems { max: usize },

    /// An item entry is not an object.
    #[error("Invalid item entry in payload")]
    InvalidItemEntry,

    /// An item entry has no item reference.
    #[error("Each item must include item_code")]
    MissingItemCode,

    /// Item reference does not resolve to a known item.
    #[error("Unknown item: {0}")]
    UnknownItem(String),

    /// Item existence could not be checked.
    #[error("Item validation failed")]
    ItemLookupFailed,

    /// Quantity is not numeric.
    #[error("Item qty must be a number")]
    QtyNotNumeric,

    /// Quantity is below zero.
    #[error("Item qty must be non-negative")]
    NegativeQty,

    /// A payment entry is malformed.
    #[error("Invalid payment entry in payload")]
    InvalidPaymentEntry,

    /// A rate or payment amount is below zero.
    #[error("{field} must be non-negative")]
    NegativeAmount { field: String },

    /// A money value is above [`Money::MAX`] or a total overflows.
    #[error("{field} is too large")]
    AmountTooLarge { field: String },

    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Invalid format (e.g., invalid date, invalid amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates a Required error for the given field label.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn too_large(field: impl Into<String>) -> Self {
        ValidationError::AmountTooLarge {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
