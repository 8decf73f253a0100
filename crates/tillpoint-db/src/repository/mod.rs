//! # Repository Module
//!
//! Repository implementations for the document store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Gateway service                                                       │
//! │       │                                                                 │
//! │       │  db.invoices().find_by_offline_id(kind, "sale:abc123")         │
//! │       ▼                                                                 │
//! │  InvoiceRepository                                                     │
//! │  ├── insert(&self, new_invoice)       naming series + rows, one tx     │
//! │  ├── find_by_offline_id / find_by_remarks_tag                          │
//! │  ├── get / exists / count                                              │
//! │  └── save / submit                    drafts only                      │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`invoice::InvoiceRepository`] - POS and Sales invoices
//! - [`item::ItemRepository`] - Items, bins, serial numbers, item prices
//! - [`profile::ProfileRepository`] - POS profiles and payment accounts
//! - [`settings::SettingsRepository`] - Single values and custom fields

pub mod invoice;
pub mod item;
pub mod profile;
pub mod settings;
