//! # tillpoint-db: Document Store for the Tillpoint Gateway
//!
//! This crate provides database access for the gateway: invoices, items and
//! stock, POS profiles and the settings that steer offline sale submission.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Tillpoint Data Flow                               │
//! │                                                                         │
//! │  Gateway service (submit_sale, get_available_qty, ...)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   tillpoint-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ InvoiceRepo   │    │ 001_initial_ │  │   │
//! │  │   │ SqlitePool    │◄───│ ItemRepo      │    │   schema.sql │  │   │
//! │  │   │ Connection    │    │ ProfileRepo   │    │              │  │   │
//! │  │   │ Management    │    │ SettingsRepo  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │                  TILLPOINT_DATABASE_PATH                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (invoice, item, profile, settings)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tillpoint_db::{Database, DbConfig};
//! use tillpoint_core::InvoiceKind;
//!
//! let db = Database::new(DbConfig::new("./tillpoint.db")).await?;
//!
//! let existing = db
//!     .invoices()
//!     .find_by_offline_id(InvoiceKind::PosInvoice, "sale:abc123")
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::invoice::{InvoiceRepository, NewInvoice};
pub use repository::item::{ItemRepository, NewItem};
pub use repository::profile::ProfileRepository;
pub use repository::settings::SettingsRepository;
