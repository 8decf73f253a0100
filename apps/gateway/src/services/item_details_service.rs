//! # Item Details Service
//!
//! Item details for one line of a POS cart, built on pluggable stock helpers.
//!
//! Offline carts often arrive without an invoice document, or with a partial
//! one. The helpers never see a missing document: [`TolerantItemDetails`]
//! wraps any [`ItemDetailsHelpers`] implementation and hands it a
//! [`DocView`] that falls back to the request context.
//!
//! ```text
//! item_details(ctx, doc?)
//!     │
//!     ├─► warehouse: ctx, else the caller's POS profile
//!     │
//!     ├─► TolerantItemDetails::filtered_serial_nos   (client-picked serials)
//!     │       no doc / no items ──► input unchanged
//!     │
//!     └─► TolerantItemDetails::update_stock
//!             DocView(doc ∪ ctx), selling_price_list filled from ctx
//!             └─► DbItemDetails::update_stock
//!                     actual_qty, price_list_rate, FIFO serial numbers
//! ```

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::auth::Caller;
use crate::error::GatewayResult;
use crate::services::stock_service::resolve_profile;
use crate::AppState;
use tillpoint_core::document::{split_serial_nos, used_serial_nos, DocView, ItemDetailsContext};
use tillpoint_core::validation::{parse_qty, text_value, Document};
use tillpoint_core::ValidationError;
use tillpoint_db::Database;

/// Body of `POST /api/pos/item-details`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemDetailsRequest {
    #[serde(default)]
    pub ctx: Document,
    #[serde(default)]
    pub doc: Option<Document>,
}

// =============================================================================
// Helper Interface
// =============================================================================

/// Stock helpers used while building item details.
#[allow(async_fn_in_trait)]
pub trait ItemDetailsHelpers {
    /// Adds stock figures for `ctx`'s item to `out`.
    async fn update_stock(
        &self,
        ctx: &ItemDetailsContext,
        out: &mut Document,
        doc: &DocView<'_>,
    ) -> GatewayResult<()>;

    /// Drops serial numbers already used on the document's lines.
    async fn filtered_serial_nos(
        &self,
        serial_nos: Vec<String>,
        doc: &DocView<'_>,
    ) -> GatewayResult<Vec<String>>;
}

/// Adapter that makes any helper implementation safe for partial documents.
pub struct TolerantItemDetails<H> {
    inner: H,
}

impl<H: ItemDetailsHelpers> TolerantItemDetails<H> {
    pub fn new(inner: H) -> Self {
        TolerantItemDetails { inner }
    }

    /// Runs the inner `update_stock` against a view that is never missing.
    ///
    /// Returns the document as the helper left it, with `selling_price_list`
    /// copied from the context when the document had none.
    pub async fn update_stock(
        &self,
        ctx: &ItemDetailsContext,
        out: &mut Document,
        doc: Option<Document>,
    ) -> GatewayResult<Document> {
        let mut view = DocView::new(ctx, doc);

        if !view.contains_key("selling_price_list") {
            if let Some(price_list) = ctx.resolve("selling_price_list").cloned() {
                view.insert("selling_price_list", price_list);
            }
        }

        self.inner.update_stock(ctx, out, &view).await?;
        Ok(view.into_document())
    }

    /// Filters only when there are lines to filter against; never fails.
    pub async fn filtered_serial_nos(
        &self,
        ctx: &ItemDetailsContext,
        serial_nos: Vec<String>,
        doc: Option<Document>,
    ) -> Vec<String> {
        if doc.is_none() {
            return serial_nos;
        }

        let view = DocView::new(ctx, doc);
        if view.items().is_empty() {
            return serial_nos;
        }

        match self.inner.filtered_serial_nos(serial_nos.clone(), &view).await {
            Ok(filtered) => filtered,
            Err(err) => {
                warn!(error = %err, "Serial number filter failed, keeping input");
                serial_nos
            }
        }
    }
}

// =============================================================================
// Database-backed Helpers
// =============================================================================

/// Helpers reading bins, serial numbers and prices from the document store.
pub struct DbItemDetails {
    db: Database,
}

impl DbItemDetails {
    pub fn new(db: Database) -> Self {
        DbItemDetails { db }
    }
}

impl ItemDetailsHelpers for DbItemDetails {
    async fn update_stock(
        &self,
        ctx: &ItemDetailsContext,
        out: &mut Document,
        doc: &DocView<'_>,
    ) -> GatewayResult<()> {
        let Some(item_code) = ctx.get_str("item_code") else {
            return Ok(());
        };
        let items = self.db.items();
        let Some(item) = items.get(item_code).await? else {
            return Ok(());
        };

        if let Some(price_list) = doc.get_str("selling_price_list") {
            if let Some(rate) = items.price_list_rate(item_code, price_list).await? {
                out.insert("price_list_rate".to_string(), json!(major_units(rate.cents())));
            }
        }

        let Some(warehouse) = ctx.get_str("warehouse") else {
            return Ok(());
        };
        if !item.is_stock_item {
            return Ok(());
        }

        let actual_qty = items.actual_qty(item_code, warehouse).await?;
        out.insert("actual_qty".to_string(), json!(actual_qty));

        let stock_qty = parse_qty(ctx.get("stock_qty").or_else(|| ctx.get("qty"))).unwrap_or(0.0);
        if item.has_serial_no && stock_qty > 0.0 && !out.contains_key("serial_no") {
            let available = items.available_serial_nos(item_code, warehouse).await?;
            let free = self.filtered_serial_nos(available, doc).await?;
            let picked: Vec<String> = free.into_iter().take(stock_qty.ceil() as usize).collect();
            debug!(item_code, picked = picked.len(), "Picked serial numbers");
            out.insert("serial_no".to_string(), json!(picked.join("\n")));
        }

        Ok(())
    }

    async fn filtered_serial_nos(
        &self,
        serial_nos: Vec<String>,
        doc: &DocView<'_>,
    ) -> GatewayResult<Vec<String>> {
        let used = used_serial_nos(doc.items());
        Ok(serial_nos.into_iter().filter(|s| !used.contains(s)).collect())
    }
}

fn major_units(cents: i64) -> f64 {
    cents as f64 / 100.0
}

// =============================================================================
// Service
// =============================================================================

/// Item details service implementation.
pub struct ItemDetailsService {
    state: Arc<AppState>,
}

impl ItemDetailsService {
    /// Create a new item details service.
    pub fn new(state: Arc<AppState>) -> Self {
        ItemDetailsService { state }
    }

    /// Details for one item of a POS cart.
    pub async fn item_details(
        &self,
        caller: &Caller,
        request: ItemDetailsRequest,
    ) -> GatewayResult<Document> {
        let mut fields = request.ctx;
        let item_code = text_value(fields.get("item_code"))
            .ok_or_else(|| ValidationError::required("item_code"))?;
        let item = self
            .state
            .db
            .items()
            .get(&item_code)
            .await?
            .ok_or_else(|| ValidationError::UnknownItem(item_code.clone()))?;

        if text_value(fields.get("warehouse")).is_none() {
            let profile = text_value(fields.get("pos_profile"));
            if let Some(warehouse) = self.profile_warehouse(caller, profile.as_deref()).await {
                fields.insert("warehouse".to_string(), json!(warehouse));
            }
        }
        fields.insert("item_code".to_string(), json!(item_code));
        let ctx = ItemDetailsContext::new(fields);

        let standard_rate = major_units(item.standard_rate_cents);
        let mut out = Document::new();
        out.insert("item_code".to_string(), json!(item.item_code));
        out.insert("item_name".to_string(), json!(item.item_name));
        out.insert("is_stock_item".to_string(), json!(item.is_stock_item));
        out.insert("has_serial_no".to_string(), json!(item.has_serial_no));
        out.insert(
            "warehouse".to_string(),
            ctx.get("warehouse").cloned().unwrap_or(Value::Null),
        );
        out.insert("qty".to_string(), json!(parse_qty(ctx.get("qty")).unwrap_or(0.0)));
        out.insert("price_list_rate".to_string(), json!(standard_rate));
        out.insert("rate".to_string(), json!(standard_rate));

        if let Some(chosen) = ctx.get_str("serial_no") {
            let kept = self
                .state
                .item_details
                .filtered_serial_nos(&ctx, split_serial_nos(chosen), request.doc.clone())
                .await;
            out.insert("serial_no".to_string(), json!(kept.join("\n")));
        }

        let doc = self
            .state
            .item_details
            .update_stock(&ctx, &mut out, request.doc)
            .await?;
        if let Some(price_list) = doc.get("selling_price_list") {
            out.insert("selling_price_list".to_string(), price_list.clone());
        }

        Ok(out)
    }

    async fn profile_warehouse(&self, caller: &Caller, explicit: Option<&str>) -> Option<String> {
        resolve_profile(&self.state, caller, explicit)
            .await
            .and_then(|profile| profile.warehouse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::test_support::{cashier, seeded_state, WAREHOUSE};
    use std::sync::Mutex;

    fn object(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    /// Records what the adapter hands to the inner helpers.
    #[derive(Default)]
    struct Recording {
        seen_price_list: Mutex<Option<String>>,
        filter_calls: Mutex<usize>,
        fail_filter: bool,
    }

    impl ItemDetailsHelpers for Recording {
        async fn update_stock(
            &self,
            _ctx: &ItemDetailsContext,
            out: &mut Document,
            doc: &DocView<'_>,
        ) -> GatewayResult<()> {
            *self.seen_price_list.lock().unwrap() = doc.get_str("selling_price_list").map(str::to_string);
            out.insert("actual_qty".to_string(), json!(1));
            Ok(())
        }

        async fn filtered_serial_nos(
            &self,
            serial_nos: Vec<String>,
            _doc: &DocView<'_>,
        ) -> GatewayResult<Vec<String>> {
            *self.filter_calls.lock().unwrap() += 1;
            if self.fail_filter {
                return Err(GatewayError::Internal("boom".to_string()));
            }
            Ok(serial_nos.into_iter().skip(1).collect())
        }
    }

    fn serials() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    #[tokio::test]
    async fn test_update_stock_without_doc_uses_context() {
        let adapter = TolerantItemDetails::new(Recording::default());
        let ctx = ItemDetailsContext::new(object(json!({"selling_price_list": "Retail"})));
        let mut out = Document::new();

        let doc = adapter.update_stock(&ctx, &mut out, None).await.unwrap();

        assert_eq!(doc.get("selling_price_list"), Some(&json!("Retail")));
        assert_eq!(
            adapter.inner.seen_price_list.lock().unwrap().as_deref(),
            Some("Retail")
        );
        assert_eq!(out.get("actual_qty"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_update_stock_keeps_document_price_list() {
        let adapter = TolerantItemDetails::new(Recording::default());
        let ctx = ItemDetailsContext::new(object(json!({
            "doc": {"selling_price_list": "Wholesale"},
            "selling_price_list": "Retail"
        })));

        let doc = adapter
            .update_stock(&ctx, &mut Document::new(), Some(object(json!({"selling_price_list": "Staff"}))))
            .await
            .unwrap();
        assert_eq!(doc.get("selling_price_list"), Some(&json!("Staff")));

        // An embedded ctx.doc shadows the plain context fields
        let doc = adapter.update_stock(&ctx, &mut Document::new(), None).await.unwrap();
        assert_eq!(doc.get("selling_price_list"), Some(&json!("Wholesale")));
    }

    #[tokio::test]
    async fn test_filtered_serial_nos_passthrough() {
        let adapter = TolerantItemDetails::new(Recording::default());
        let ctx = ItemDetailsContext::default();

        assert_eq!(adapter.filtered_serial_nos(&ctx, serials(), None).await, serials());
        assert_eq!(
            adapter
                .filtered_serial_nos(&ctx, serials(), Some(object(json!({"items": []}))))
                .await,
            serials()
        );
        assert_eq!(*adapter.inner.filter_calls.lock().unwrap(), 0);

        let doc = object(json!({"items": [{"item_code": "X"}]}));
        assert_eq!(
            adapter.filtered_serial_nos(&ctx, serials(), Some(doc)).await,
            vec!["B".to_string()]
        );
    }

    #[tokio::test]
    async fn test_filtered_serial_nos_inner_error_returns_input() {
        let adapter = TolerantItemDetails::new(Recording {
            fail_filter: true,
            ..Default::default()
        });
        let doc = object(json!({"items": [{"item_code": "X"}]}));

        let kept = adapter
            .filtered_serial_nos(&ItemDetailsContext::default(), serials(), Some(doc))
            .await;
        assert_eq!(kept, serials());
        assert_eq!(*adapter.inner.filter_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_item_details_for_stock_item() {
        let service = ItemDetailsService::new(seeded_state().await);
        let out = service
            .item_details(
                &cashier(),
                ItemDetailsRequest {
                    ctx: object(json!({"item_code": "ITEM1", "qty": 2, "selling_price_list": "Retail"})),
                    doc: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(out["warehouse"], json!(WAREHOUSE));
        assert_eq!(out["actual_qty"], json!(7.0));
        assert_eq!(out["price_list_rate"], json!(4.5));
        assert_eq!(out["rate"], json!(5.0));
        assert_eq!(out["selling_price_list"], json!("Retail"));
    }

    #[tokio::test]
    async fn test_item_details_unknown_profile_uses_default_warehouse() {
        let service = ItemDetailsService::new(seeded_state().await);

        let out = service
            .item_details(
                &cashier(),
                ItemDetailsRequest {
                    ctx: object(json!({"item_code": "ITEM1", "qty": 1, "pos_profile": "P9"})),
                    doc: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(out["warehouse"], json!(WAREHOUSE));
        assert_eq!(out["actual_qty"], json!(7.0));
    }

    #[tokio::test]
    async fn test_item_details_picks_free_serials() {
        let service = ItemDetailsService::new(seeded_state().await);

        let out = service
            .item_details(
                &cashier(),
                ItemDetailsRequest {
                    ctx: object(json!({"item_code": "SER1", "qty": 2})),
                    doc: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(out["serial_no"], json!("SN-1\nSN-2"));
        assert_eq!(out["actual_qty"], json!(3.0));

        let out = service
            .item_details(
                &cashier(),
                ItemDetailsRequest {
                    ctx: object(json!({"item_code": "SER1", "qty": 2})),
                    doc: Some(object(json!({"items": [{"item_code": "SER1", "serial_no": "SN-1"}]}))),
                },
            )
            .await
            .unwrap();
        assert_eq!(out["serial_no"], json!("SN-2\nSN-3"));
    }

    #[tokio::test]
    async fn test_item_details_keeps_client_serials_not_in_cart() {
        let service = ItemDetailsService::new(seeded_state().await);
        let out = service
            .item_details(
                &cashier(),
                ItemDetailsRequest {
                    ctx: object(json!({"item_code": "SER1", "qty": 2, "serial_no": "SN-1\nSN-3"})),
                    doc: Some(object(json!({"items": [{"item_code": "SER1", "serial_no": "SN-3"}]}))),
                },
            )
            .await
            .unwrap();
        assert_eq!(out["serial_no"], json!("SN-1"));
    }

    #[tokio::test]
    async fn test_item_details_validation() {
        let service = ItemDetailsService::new(seeded_state().await);

        let err = service
            .item_details(&cashier(), ItemDetailsRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "item_code is required");

        let err = service
            .item_details(
                &cashier(),
                ItemDetailsRequest {
                    ctx: object(json!({"item_code": "NOPE"})),
                    doc: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(ValidationError::UnknownItem(_))));
    }
}
