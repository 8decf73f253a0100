//! # Document Views
//!
//! Tolerant, dict-like access to partial documents for the item-details
//! helpers.
//!
//! The POS frontend asks for item details with a context (`ctx`) and, when a
//! cart exists, the invoice document. Offline carts often send no document,
//! or only part of one. [`DocView`] always answers lookups: first from the
//! document, then from the context.
//!
//! ```text
//! DocView::get("selling_price_list")
//!     │
//!     ├─► document field present?            ──► value
//!     │
//!     └─► ItemDetailsContext::resolve()
//!             ├─ ctx.doc is an object ──► ctx.doc[key]
//!             └─ otherwise            ──► ctx[key]
//! ```

use serde_json::Value;

use crate::validation::Document;

// =============================================================================
// Item-Details Context
// =============================================================================

/// Fields the frontend sends with an item-details request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemDetailsContext {
    fields: Document,
}

impl ItemDetailsContext {
    pub fn new(fields: Document) -> Self {
        ItemDetailsContext { fields }
    }

    /// Direct field of the context.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Resolves a document field from the context.
    ///
    /// An embedded `doc` object shadows the context fields entirely.
    pub fn resolve(&self, key: &str) -> Option<&Value> {
        let value = match self.fields.get("doc") {
            Some(Value::Object(doc)) => doc.get(key),
            _ => self.fields.get(key),
        };
        value.filter(|v| !v.is_null())
    }
}

// =============================================================================
// DocView
// =============================================================================

/// A document that may be missing or partial, backed by its context.
#[derive(Debug, Clone)]
pub struct DocView<'a> {
    own: Document,
    ctx: &'a ItemDetailsContext,
}

impl<'a> DocView<'a> {
    /// Wraps an optional document. A missing one starts empty.
    pub fn new(ctx: &'a ItemDetailsContext, doc: Option<Document>) -> Self {
        DocView {
            own: doc.unwrap_or_default(),
            ctx,
        }
    }

    /// Looks up a field: the document first, then the context.
    ///
    /// ## Example
    /// ```rust
    /// use serde_json::json;
    /// use tillpoint_core::document::{DocView, ItemDetailsContext};
    ///
    /// let ctx = ItemDetailsContext::new(
    ///     json!({"company": "Co", "selling_price_list": "Retail"})
    ///         .as_object().cloned().unwrap(),
    /// );
    /// let doc = json!({"company": "Other"}).as_object().cloned();
    /// let view = DocView::new(&ctx, doc);
    ///
    /// assert_eq!(view.get_str("company"), Some("Other"));
    /// assert_eq!(view.get_str("selling_price_list"), Some("Retail"));
    /// assert_eq!(view.get("missing"), None);
    /// ```
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.own.get(key) {
            return Some(value);
        }
        self.ctx.resolve(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Whether the document itself carries the field.
    pub fn contains_key(&self, key: &str) -> bool {
        self.own.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.own.insert(key.into(), value);
    }

    /// Line items of the document, empty when absent or not a list.
    pub fn items(&self) -> &[Value] {
        match self.get("items") {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    /// Gives back the (possibly enriched) document.
    pub fn into_document(self) -> Document {
        self.own
    }
}

// =============================================================================
// Serial Numbers
// =============================================================================

/// Splits a newline-separated serial number field.
pub fn split_serial_nos(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Serial numbers already used on the document's lines.
pub fn used_serial_nos(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.get("serial_no").and_then(Value::as_str))
        .flat_map(split_serial_nos)
        .collect()
}
