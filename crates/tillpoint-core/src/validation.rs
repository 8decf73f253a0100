//! # Validation Module
//!
//! Decoding and checking of untrusted offline sale payloads.
//!
//! ## Validation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Sale Payload Checks                                │
//! │                                                                         │
//! │  Step 1: decode_sale()                                                 │
//! │  ├── JSON text is parsed, parse errors never echo the content          │
//! │  └── anything but an object is rejected                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Step 2: sale_items() / item_reference() / sale_line()                 │
//! │  ├── list shape and maximum count                                      │
//! │  ├── item reference (item_code, code or item)                          │
//! │  ├── [gateway checks the item exists]                                  │
//! │  └── numeric, non-negative qty                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Step 3: resolve_doctype() / apply_doctype() / strip_server_fields()   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Step 4: build_payload()                                               │
//! │  ├── customer, items, company (+ pos_profile for POS Invoice)          │
//! │  └── idempotency tag attached to remarks / offline_id                  │
//! │                                                                         │
//! │  Every step runs before the document store is written to.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::idempotency::SaleId;
use crate::money::Money;
use crate::types::{InvoiceKind, PaymentRow, SaleLine, SalePayload};
use crate::SERVER_ASSIGNED_FIELDS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A JSON document as handled by the gateway.
pub type Document = Map<String, Value>;

// =============================================================================
// Decoding
// =============================================================================

/// A sale as it arrives on the wire: the document itself or its JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SaleInput {
    Text(String),
    Document(Value),
}

impl SaleInput {
    /// Short description for logs: type and size, never the content.
    pub fn describe(&self) -> String {
        match self {
            SaleInput::Text(text) => format!("type=str, len={}", text.len()),
            SaleInput::Document(Value::Object(map)) => format!("type=object, keys={}", map.len()),
            SaleInput::Document(Value::Array(list)) => format!("type=array, len={}", list.len()),
            SaleInput::Document(_) => "type=scalar, len=N/A".to_string(),
        }
    }
}

/// Decodes a sale into a mutable document.
///
/// ## Example
/// ```rust
/// use tillpoint_core::validation::{decode_sale, SaleInput};
/// use tillpoint_core::ValidationError;
///
/// let doc = decode_sale(SaleInput::Text(r#"{"customer":"C1"}"#.into())).unwrap();
/// assert_eq!(doc["customer"], "C1");
///
/// assert_eq!(
///     decode_sale(SaleInput::Text("{not json".into())),
///     Err(ValidationError::InvalidPayload)
/// );
/// assert_eq!(
///     decode_sale(SaleInput::Text("[1, 2]".into())),
///     Err(ValidationError::NotADocument)
/// );
/// ```
pub fn decode_sale(input: SaleInput) -> ValidationResult<Document> {
    let value = match input {
        SaleInput::Text(text) => {
            serde_json::from_str::<Value>(&text).map_err(|_| ValidationError::InvalidPayload)?
        }
        SaleInput::Document(value) => value,
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ValidationError::NotADocument),
    }
}

// =============================================================================
// Items
// =============================================================================

/// Returns the item entries, checking list shape and size.
///
/// A missing or null `items` is an empty list here; emptiness is reported
/// later by [`build_payload`].
pub fn sale_items(doc: &Document, max_items: usize) -> ValidationResult<Vec<Value>> {
    let items = match doc.get("items") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ValidationError::ItemsNotAList),
    };

    if items.len() > max_items {
        return Err(ValidationError::TooManyItems { max: max_items });
    }

    Ok(items.clone())
}

/// Extracts the item reference of one entry.
///
/// The first non-empty of `item_code`, `code` and `item` wins. Numeric codes
/// are accepted and converted to text.
pub fn item_reference(entry: &Value) -> ValidationResult<String> {
    let entry = entry.as_object().ok_or(ValidationError::InvalidItemEntry)?;

    ["item_code", "code", "item"]
        .iter()
        .find_map(|key| text_value(entry.get(*key)))
        .ok_or(ValidationError::MissingItemCode)
}

/// Builds a sale line from an entry whose reference is already known to exist.
pub fn sale_line(entry: &Value, item_code: String) -> ValidationResult<SaleLine> {
    let entry = entry.as_object().ok_or(ValidationError::InvalidItemEntry)?;

    let qty = parse_qty(entry.get("qty"))?;
    let rate = match entry.get("rate") {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_money(value, "Item rate")?),
    };

    Ok(SaleLine {
        item_code,
        qty,
        rate,
        serial_no: text_value(entry.get("serial_no")),
    })
}

/// Parses a quantity: a finite number or numeric string, at least zero.
///
/// A missing qty counts as zero. Booleans and null are not numbers.
///
/// ## Example
/// ```rust
/// use serde_json::json;
/// use tillpoint_core::validation::parse_qty;
///
/// assert_eq!(parse_qty(Some(&json!("2.5"))).unwrap(), 2.5);
/// assert_eq!(parse_qty(None).unwrap(), 0.0);
/// assert!(parse_qty(Some(&json!(-1))).is_err());
/// assert!(parse_qty(Some(&json!("two"))).is_err());
/// ```
pub fn parse_qty(value: Option<&Value>) -> ValidationResult<f64> {
    let qty = match value {
        None => 0.0,
        Some(Value::Number(n)) => n.as_f64().ok_or(ValidationError::QtyNotNumeric)?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ValidationError::QtyNotNumeric)?,
        Some(_) => return Err(ValidationError::QtyNotNumeric),
    };

    if !qty.is_finite() {
        return Err(ValidationError::QtyNotNumeric);
    }
    if qty < 0.0 {
        return Err(ValidationError::NegativeQty);
    }

    Ok(qty)
}

// =============================================================================
// Doctype
// =============================================================================

/// The doctype named by the payload, if it is one the gateway accepts.
pub fn explicit_doctype(doc: &Document) -> Option<InvoiceKind> {
    doc.get("doctype").and_then(Value::as_str).and_then(InvoiceKind::parse)
}

/// Picks the target doctype.
///
/// An explicit, recognised doctype wins. Otherwise the POS Settings
/// `invoice_type` is used; `None` (unset or lookup failed) means POS Invoice.
/// A settings value naming any other doctype is rejected.
pub fn resolve_doctype(
    explicit: Option<InvoiceKind>,
    settings_invoice_type: Option<&str>,
) -> ValidationResult<InvoiceKind> {
    if let Some(kind) = explicit {
        return Ok(kind);
    }

    match settings_invoice_type.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(InvoiceKind::PosInvoice),
        Some(configured) => InvoiceKind::parse(configured)
            .ok_or_else(|| ValidationError::UnsupportedDoctype(configured.to_string())),
    }
}

/// Writes the canonical doctype into the document.
///
/// Sales invoices raised at the till are always POS-mode invoices.
pub fn apply_doctype(doc: &mut Document, kind: InvoiceKind) {
    doc.insert("doctype".to_string(), Value::String(kind.as_str().to_string()));
    if kind == InvoiceKind::SalesInvoice {
        doc.insert("is_pos".to_string(), Value::from(1));
    }
}

/// Removes identity and workflow fields the server must assign.
pub fn strip_server_fields(doc: &mut Document) {
    for field in SERVER_ASSIGNED_FIELDS {
        doc.remove(*field);
    }
}

// =============================================================================
// Payload
// =============================================================================

/// Checks required fields and produces the payload a draft is built from.
///
/// When a sale id is given, the remarks carry its tag and `offline_id` is set
/// if the doctype has the dedicated column.
pub fn build_payload(
    doc: &Document,
    kind: InvoiceKind,
    lines: Vec<SaleLine>,
    sale_id: Option<&SaleId>,
    supports_offline_id: bool,
) -> ValidationResult<SalePayload> {
    let customer = text_value(doc.get("customer")).ok_or_else(|| ValidationError::required("Customer"))?;
    if lines.is_empty() {
        return Err(ValidationError::MissingItems);
    }
    let company = text_value(doc.get("company")).ok_or_else(|| ValidationError::required("Company"))?;

    let pos_profile = text_value(doc.get("pos_profile"));
    if kind.requires_pos_profile() && pos_profile.is_none() {
        return Err(ValidationError::required("POS Profile"));
    }

    let remarks = text_value(doc.get("remarks"));
    let (remarks, offline_id) = match sale_id {
        Some(id) => (
            Some(id.tag_remarks(remarks.as_deref())),
            supports_offline_id.then(|| id.as_str().to_string()),
        ),
        None => (remarks, None),
    };

    let posting_date = match text_value(doc.get("posting_date")) {
        None => None,
        Some(text) => Some(NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|_| {
            ValidationError::InvalidFormat {
                field: "posting_date".to_string(),
                reason: "expected YYYY-MM-DD".to_string(),
            }
        })?),
    };

    let is_pos = match kind {
        InvoiceKind::SalesInvoice => true,
        InvoiceKind::PosInvoice => doc.get("is_pos").map_or(true, truthy),
    };

    Ok(SalePayload {
        doctype: kind,
        customer,
        company,
        pos_profile,
        is_pos,
        posting_date,
        remarks,
        offline_id,
        items: lines,
        payments: parse_payments(doc.get("payments"))?,
    })
}

/// Parses client payment rows. Missing or null means none.
pub fn parse_payments(value: Option<&Value>) -> ValidationResult<Vec<PaymentRow>> {
    let rows = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(rows)) => rows,
        Some(_) => return Err(ValidationError::InvalidPaymentEntry),
    };

    let rows = rows
        .iter()
        .map(|row| {
            let row = row.as_object().ok_or(ValidationError::InvalidPaymentEntry)?;
            let mode = text_value(row.get("mode_of_payment")).ok_or(ValidationError::InvalidPaymentEntry)?;
            let amount = match row.get("amount") {
                None | Some(Value::Null) => Money::zero(),
                Some(value) => parse_money(value, "Payment amount").map_err(|err| match err {
                    ValidationError::InvalidFormat { .. } => ValidationError::InvalidPaymentEntry,
                    other => other,
                })?,
            };
            Ok(PaymentRow {
                mode_of_payment: mode,
                account: text_value(row.get("account")),
                amount,
            })
        })
        .collect::<ValidationResult<Vec<_>>>()?;

    Money::checked_sum(rows.iter().map(|row| row.amount))
        .filter(|paid| *paid <= Money::MAX)
        .ok_or_else(|| ValidationError::too_large("Payments total"))?;

    Ok(rows)
}

// =============================================================================
// Helpers
// =============================================================================

/// Reads a non-empty text value; numbers are converted to text.
pub fn text_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses a client money value: numeric, at least zero, at most [`Money::MAX`].
fn parse_money(value: &Value, field: &str) -> ValidationResult<Money> {
    let parsed = match value {
        Value::Number(n) => Money::parse_decimal(&n.to_string()),
        Value::String(s) => Money::parse_decimal(s),
        _ => None,
    };
    let amount = parsed.ok_or_else(|| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a number".to_string(),
    })?;

    if amount < Money::zero() {
        return Err(ValidationError::NegativeAmount {
            field: field.to_string(),
        });
    }
    if amount > Money::MAX {
        return Err(ValidationError::too_large(field));
    }
    Ok(amount)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Null => false,
        _ => true,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test document must be an object"),
        }
    }

    fn example_sale() -> Document {
        doc(json!({
            "customer": "C1",
            "company": "Co",
            "items": [{"item_code": "ITEM1", "qty": 2}],
            "pos_profile": "P1"
        }))
    }

    fn lines_of(d: &Document) -> Vec<SaleLine> {
        sale_items(d, 200)
            .unwrap()
            .iter()
            .map(|entry| sale_line(entry, item_reference(entry).unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn test_decode_accepts_object_and_text() {
        let from_value = decode_sale(SaleInput::Document(json!({"a": 1}))).unwrap();
        let from_text = decode_sale(SaleInput::Text("{\"a\": 1}".to_string())).unwrap();
        assert_eq!(from_value, from_text);
        assert_eq!(
            decode_sale(SaleInput::Document(json!("x"))),
            Err(ValidationError::NotADocument)
        );
    }

    #[test]
    fn test_describe_never_includes_content() {
        let input = SaleInput::Text("{\"customer\":\"secret\"}".to_string());
        let described = input.describe();
        assert!(!described.contains("secret"));
        assert!(described.contains("len=21"));
    }

    #[test]
    fn test_items_shape_and_size() {
        assert_eq!(
            sale_items(&doc(json!({"items": "ITEM1"})), 200),
            Err(ValidationError::ItemsNotAList)
        );
        let many: Vec<Value> = (0..201).map(|_| json!({"item_code": "I", "qty": 1})).collect();
        assert_eq!(
            sale_items(&doc(json!({ "items": many })), 200),
            Err(ValidationError::TooManyItems { max: 200 })
        );
        assert!(sale_items(&doc(json!({})), 200).unwrap().is_empty());
    }

    #[test]
    fn test_item_reference_fallbacks() {
        assert_eq!(item_reference(&json!({"code": "A"})).unwrap(), "A");
        assert_eq!(item_reference(&json!({"item_code": "", "item": "B"})).unwrap(), "B");
        assert_eq!(item_reference(&json!({"item_code": 42})).unwrap(), "42");
        assert_eq!(
            item_reference(&json!({"qty": 1})),
            Err(ValidationError::MissingItemCode)
        );
        assert_eq!(item_reference(&json!("ITEM1")), Err(ValidationError::InvalidItemEntry));
    }

    #[test]
    fn test_qty_rules() {
        assert_eq!(parse_qty(Some(&json!(true))), Err(ValidationError::QtyNotNumeric));
        assert_eq!(parse_qty(Some(&Value::Null)), Err(ValidationError::QtyNotNumeric));
        assert_eq!(parse_qty(Some(&json!("inf"))), Err(ValidationError::QtyNotNumeric));
        assert_eq!(parse_qty(Some(&json!("-0.5"))), Err(ValidationError::NegativeQty));
        assert_eq!(parse_qty(Some(&json!(" 3 "))).unwrap(), 3.0);
    }

    #[test]
    fn test_sale_line_rate() {
        let line = sale_line(&json!({"qty": 1, "rate": "12.5"}), "I".to_string()).unwrap();
        assert_eq!(line.rate, Some(Money::from_cents(1250)));
        assert!(sale_line(&json!({"qty": 1, "rate": "abc"}), "I".to_string()).is_err());
        assert_eq!(
            sale_line(&json!({"qty": 1, "rate": -5}), "I".to_string()),
            Err(ValidationError::NegativeAmount { field: "Item rate".to_string() })
        );
        assert_eq!(
            sale_line(&json!({"qty": 1, "rate": "1e14"}), "I".to_string()),
            Err(ValidationError::too_large("Item rate"))
        );
    }

    #[test]
    fn test_resolve_doctype() {
        let explicit = explicit_doctype(&doc(json!({"doctype": "sales invoice"})));
        assert_eq!(resolve_doctype(explicit, Some("POS Invoice")).unwrap(), InvoiceKind::SalesInvoice);
        assert_eq!(resolve_doctype(None, None).unwrap(), InvoiceKind::PosInvoice);
        assert_eq!(
            resolve_doctype(None, Some("Sales Invoice")).unwrap(),
            InvoiceKind::SalesInvoice
        );
        assert_eq!(
            resolve_doctype(None, Some("Sales Order")),
            Err(ValidationError::UnsupportedDoctype("Sales Order".to_string()))
        );
    }

    #[test]
    fn test_apply_doctype_and_strip() {
        let mut d = doc(json!({"name": "X-1", "docstatus": 1, "owner": "evil", "customer": "C1"}));
        apply_doctype(&mut d, InvoiceKind::SalesInvoice);
        strip_server_fields(&mut d);
        assert_eq!(d["doctype"], "Sales Invoice");
        assert_eq!(d["is_pos"], 1);
        assert!(!d.contains_key("name"));
        assert!(!d.contains_key("docstatus"));
        assert!(!d.contains_key("owner"));
        assert_eq!(d["customer"], "C1");
    }

    #[test]
    fn test_build_payload_example() {
        let d = example_sale();
        let id = SaleId::parse(Some("sale:abc123"));
        let payload = build_payload(&d, InvoiceKind::PosInvoice, lines_of(&d), id.as_ref(), true).unwrap();
        assert_eq!(payload.customer, "C1");
        assert_eq!(payload.items[0].qty, 2.0);
        assert_eq!(payload.remarks.as_deref(), Some("[offline:sale:abc123]"));
        assert_eq!(payload.offline_id.as_deref(), Some("sale:abc123"));
    }

    #[test]
    fn test_build_payload_required_fields() {
        for (field, message) in [
            ("customer", "Customer is required"),
            ("company", "Company is required"),
            ("pos_profile", "POS Profile is required"),
        ] {
            let mut d = example_sale();
            d.remove(field);
            let err = build_payload(&d, InvoiceKind::PosInvoice, lines_of(&d), None, false).unwrap_err();
            assert_eq!(err.to_string(), message);
        }

        let d = example_sale();
        assert_eq!(
            build_payload(&d, InvoiceKind::PosInvoice, Vec::new(), None, false),
            Err(ValidationError::MissingItems)
        );
    }

    #[test]
    fn test_sales_invoice_does_not_need_profile() {
        let mut d = example_sale();
        d.remove("pos_profile");
        let payload = build_payload(&d, InvoiceKind::SalesInvoice, lines_of(&d), None, false).unwrap();
        assert!(payload.is_pos);
        assert!(payload.offline_id.is_none());
    }

    #[test]
    fn test_payments_and_posting_date() {
        let mut d = example_sale();
        d.insert(
            "payments".to_string(),
            json!([{"mode_of_payment": "Cash", "amount": "10.00"}, {"mode_of_payment": "Card"}]),
        );
        d.insert("posting_date".to_string(), json!("2026-03-01"));
        let payload = build_payload(&d, InvoiceKind::PosInvoice, lines_of(&d), None, false).unwrap();
        assert_eq!(payload.payments.len(), 2);
        assert_eq!(payload.payments[0].amount, Money::from_cents(1000));
        assert!(payload.payments[1].amount.is_zero());
        assert_eq!(payload.posting_date, NaiveDate::from_ymd_opt(2026, 3, 1));

        d.insert("payments".to_string(), json!([{"amount": 5}]));
        assert_eq!(
            build_payload(&d, InvoiceKind::PosInvoice, lines_of(&d), None, false),
            Err(ValidationError::InvalidPaymentEntry)
        );
    }

    #[test]
    fn test_payment_amount_bounds() {
        let negative = json!([
            {"mode_of_payment": "Cash", "amount": 20},
            {"mode_of_payment": "Card", "amount": "-5"}
        ]);
        assert_eq!(
            parse_payments(Some(&negative)),
            Err(ValidationError::NegativeAmount { field: "Payment amount".to_string() })
        );

        let huge = Value::Array(vec![json!({"mode_of_payment": "Cash", "amount": "9999999999999"}); 2]);
        assert_eq!(
            parse_payments(Some(&huge)),
            Err(ValidationError::too_large("Payments total"))
        );

        let text = json!([{"mode_of_payment": "Cash", "amount": "ten"}]);
        assert_eq!(parse_payments(Some(&text)), Err(ValidationError::InvalidPaymentEntry));
    }
}
