//! # tillpoint-core: Pure Business Logic for the Tillpoint Gateway
//!
//! This crate holds every decision the gateway makes about an offline sale
//! that does not need a database: payload validation, the idempotency tag,
//! payment-row completion and the tolerant document view used by the
//! item-details helpers.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Tillpoint Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Offline POS client (browser)                    │   │
//! │  │    Cart ──► queue sale (sale_id) ──► replay when online         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/gateway (axum)                          │   │
//! │  │    submit_sale, mark_paid, get_available_qty, item_details      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ tillpoint-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐  │   │
//! │  │   │ validation │ │idempotency │ │  payment   │ │  document  │  │   │
//! │  │   │ payload    │ │ SaleId     │ │ completion │ │  DocView   │  │   │
//! │  │   │ checks     │ │ [offline:] │ │ planning   │ │  context   │  │   │
//! │  │   └────────────┘ └────────────┘ └────────────┘ └────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                tillpoint-db (Document Store)                    │   │
//! │  │          invoices, items, bins, POS profiles, settings          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (invoices, payment rows, POS profiles)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Sale payload decoding and checks
//! - [`idempotency`] - Client sale identifiers and the remarks tag
//! - [`payment`] - Payment-row completion for invoice totals
//! - [`document`] - Tolerant views over partial documents
//!
//! ## Example Usage
//!
//! ```rust
//! use tillpoint_core::idempotency::SaleId;
//!
//! let sale_id = SaleId::parse(Some("sale:abc123")).unwrap();
//! assert_eq!(sale_id.tag(), "[offline:sale:abc123]");
//!
//! // Anything outside the allow-list is dropped, not rejected
//! assert!(SaleId::parse(Some("sale abc")).is_none());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod document;
pub mod error;
pub mod idempotency;
pub mod money;
pub mod payment;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items accepted in a single offline sale.
///
/// ## Business Reason
/// Rejects abusive or corrupted payloads before any database work.
/// The gateway can lower (or raise) it through configuration.
pub const MAX_SALE_ITEMS: usize = 200;

/// Custom field that carries the client sale identifier on invoice doctypes
/// that support a dedicated idempotency column.
pub const OFFLINE_ID_FIELD: &str = "custom_pos_offline_id";

/// Fields the server assigns itself; a client copy is never trusted.
pub const SERVER_ASSIGNED_FIELDS: &[&str] = &[
    "name",
    "docstatus",
    "owner",
    "creation",
    "modified",
    "modified_by",
    "amended_from",
    "workflow_state",
    "naming_series",
];
