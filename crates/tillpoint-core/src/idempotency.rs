//! # Idempotency
//!
//! Client sale identifiers and the `[offline:<id>]` remarks tag.
//!
//! ## How a Replay Is Recognised
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Client queues sale offline with sale_id = "sale:9f2c..."               │
//! │                                                                         │
//! │  submit_sale(sale, sale_id)                                             │
//! │     │                                                                   │
//! │     ├─► SaleId::parse()       drop anything outside [A-Za-z0-9:_-]      │
//! │     │                                                                   │
//! │     ├─► offline_id column     (doctypes with the custom field, UNIQUE)  │
//! │     │                                                                   │
//! │     └─► remarks tag           "[offline:sale:9f2c...]" substring        │
//! │                                                                         │
//! │  Found ⇒ "Already processed", nothing is written.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The tag always includes the surrounding brackets, so `sale:1` never
//! matches a record tagged `[offline:sale:12]`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A client sale identifier that passed the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(String);

impl SaleId {
    /// Validates an optional identifier.
    ///
    /// Returns `None` when the input is absent, empty or contains a character
    /// outside `A-Z a-z 0-9 : _ -`. An invalid identifier is dropped, not an
    /// error: the sale is then processed without deduplication.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw?;
        if raw.is_empty() {
            return None;
        }
        if raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-'))
        {
            Some(SaleId(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The marker embedded in an invoice's remarks.
    pub fn tag(&self) -> String {
        format!("[offline:{}]", self.0)
    }

    /// Appends the tag to existing remarks unless it is already present.
    ///
    /// ## Example
    /// ```rust
    /// use tillpoint_core::idempotency::SaleId;
    ///
    /// let id = SaleId::parse(Some("s-1")).unwrap();
    /// assert_eq!(id.tag_remarks(None), "[offline:s-1]");
    /// assert_eq!(id.tag_remarks(Some("  paid cash ")), "paid cash [offline:s-1]");
    /// assert_eq!(id.tag_remarks(Some("x [offline:s-1]")), "x [offline:s-1]");
    /// ```
    pub fn tag_remarks(&self, remarks: Option<&str>) -> String {
        let remarks = remarks.unwrap_or("").trim();
        let tag = self.tag();
        if remarks.contains(&tag) {
            remarks.to_string()
        } else if remarks.is_empty() {
            tag
        } else {
            format!("{} {}", remarks, tag)
        }
    }
}

impl fmt::Display for SaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
