//! # Sale Service
//!
//! Idempotent submission of offline sales and the follow-up payment helper.
//!
//! ## submit_sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Till replays {sale, sale_id}                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. decode + size/item checks            (nothing written yet)          │
//! │  2. doctype: explicit or POS Settings                                   │
//! │  3. strip server-assigned fields                                        │
//! │  4. known sale_id? ── yes ──► "Already processed"                       │
//! │  5. required fields, [offline:<id>] tag, create permission              │
//! │  6. draft: rates, totals, rounding, payment completion                  │
//! │  7. insert ── UNIQUE hit ──► re-check ──► "Already processed"           │
//! │  8. submit ── refused ──► "created (draft)"                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  "created"                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check in step 4 and the insert in step 7 are not atomic. On doctypes
//! with the offline id column the UNIQUE index catches the second writer;
//! remarks-only doctypes have no such backstop.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use crate::auth::{Caller, DocAction};
use crate::error::{GatewayError, GatewayResult};
use crate::AppState;
use tillpoint_core::idempotency::SaleId;
use tillpoint_core::payment::{complete_payments, needs_sources, PaymentCompletion, PaymentSources};
use tillpoint_core::validation::{
    apply_doctype, build_payload, decode_sale, explicit_doctype, item_reference, resolve_doctype,
    sale_items, sale_line, strip_server_fields, SaleInput,
};
use tillpoint_core::{
    DocStatus, InvoiceItem, InvoiceKind, Money, PaymentRow, PosProfile, SaleOutcome, SalePayload,
    SkippedStep, ValidationError, OFFLINE_ID_FIELD,
};
use tillpoint_db::NewInvoice;

/// Skipped when a line's price-list rate could not be read.
const STEP_PRICE_LIST_RATE: &str = "price_list_rate";

/// Body of `POST /api/pos/sales`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitSaleRequest {
    pub sale: SaleInput,
    #[serde(default)]
    pub sale_id: Option<String>,
}

/// Body of `POST /api/pos/sales/mark-paid`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MarkPaidRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sale_id: Option<String>,
    #[serde(default)]
    pub doctype: Option<String>,
}

/// Sale service implementation.
pub struct SaleService {
    state: Arc<AppState>,
}

impl SaleService {
    /// Create a new sale service.
    pub fn new(state: Arc<AppState>) -> Self {
        SaleService { state }
    }

    // =========================================================================
    // submit_sale
    // =========================================================================

    /// Turns one offline sale into exactly one invoice.
    pub async fn submit_sale(
        &self,
        caller: &Caller,
        request: SubmitSaleRequest,
    ) -> GatewayResult<SaleOutcome> {
        let sale_id = SaleId::parse(request.sale_id.as_deref());
        if request.sale_id.is_some() && sale_id.is_none() {
            warn!(user = %caller.user, "Ignoring sale_id outside the allowed characters");
        }

        let shape = request.sale.describe();
        let mut doc = decode_sale(request.sale).inspect_err(|err| {
            warn!(user = %caller.user, payload = %shape, error = %err, "Rejected sale payload");
        })?;

        let entries = sale_items(&doc, self.state.config.max_sale_items)?;
        let items = self.state.db.items();
        let mut lines = Vec::with_capacity(entries.len());
        for entry in &entries {
            let item_code = item_reference(entry)?;
            match items.exists(&item_code).await {
                Ok(true) => {}
                Ok(false) => return Err(ValidationError::UnknownItem(item_code).into()),
                Err(err) => {
                    error!(item_code = %item_code, error = %err, "Item lookup failed");
                    return Err(ValidationError::ItemLookupFailed.into());
                }
            }
            lines.push(sale_line(entry, item_code)?);
        }

        let explicit = explicit_doctype(&doc);
        let configured = match explicit {
            Some(_) => None,
            None => self.configured_invoice_type().await,
        };
        let kind = resolve_doctype(explicit, configured.as_deref()).inspect_err(|err| {
            error!(error = %err, "Unexpected invoice doctype");
        })?;
        apply_doctype(&mut doc, kind);
        strip_server_fields(&mut doc);

        let supports_offline_id = self.supports_offline_id(kind).await;

        if let Some(id) = &sale_id {
            if let Some(name) = self.find_by_sale_id(kind, id, supports_offline_id).await {
                info!(sale_id = %id, name = %name, "Sale already processed");
                return Ok(SaleOutcome::done(name, SaleOutcome::ALREADY_PROCESSED));
            }
        }

        let payload = build_payload(&doc, kind, lines, sale_id.as_ref(), supports_offline_id)?;

        caller.require(kind, DocAction::Create)?;

        let mut skipped = Vec::new();
        let draft = self.build_draft(caller, payload, &mut skipped).await?;

        let invoice = match self.state.db.invoices().insert(draft).await {
            Ok(invoice) => invoice,
            Err(err) => {
                if let Some(id) = &sale_id {
                    if let Some(name) = self.find_by_sale_id(kind, id, supports_offline_id).await {
                        info!(sale_id = %id, name = %name, "Concurrent replay already created the sale");
                        return Ok(SaleOutcome::done(name, SaleOutcome::ALREADY_PROCESSED));
                    }
                }
                error!(doctype = %kind, error = %err, "Offline sale insert failed");
                return Err(err.into());
            }
        };

        match self.state.db.invoices().submit(&invoice).await {
            Ok(status) => {
                info!(name = %invoice.name, ?status, skipped = skipped.len(), "Offline sale created");
                Ok(SaleOutcome::done(invoice.name, SaleOutcome::CREATED).with_skipped(skipped))
            }
            Err(err) => {
                error!(name = %invoice.name, error = %err, "Offline sale submit failed");
                Ok(SaleOutcome::done(invoice.name, SaleOutcome::CREATED_DRAFT).with_skipped(skipped))
            }
        }
    }

    /// POS Settings `invoice_type`; unreadable settings count as unset.
    async fn configured_invoice_type(&self) -> Option<String> {
        match self.state.db.settings().invoice_type().await {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "Could not read POS Settings, assuming POS Invoice");
                None
            }
        }
    }

    async fn supports_offline_id(&self, kind: InvoiceKind) -> bool {
        self.state
            .db
            .settings()
            .has_field(kind.as_str(), OFFLINE_ID_FIELD)
            .await
            .unwrap_or_else(|err| {
                warn!(doctype = %kind, error = %err, "Field metadata lookup failed");
                false
            })
    }

    /// Looks a sale up by the offline id column, then by the remarks tag.
    async fn find_by_sale_id(
        &self,
        kind: InvoiceKind,
        sale_id: &SaleId,
        supports_offline_id: bool,
    ) -> Option<String> {
        let invoices = self.state.db.invoices();

        if supports_offline_id {
            match invoices.find_by_offline_id(kind, sale_id.as_str()).await {
                Ok(Some(name)) => return Some(name),
                Ok(None) => {}
                Err(err) => warn!(doctype = %kind, error = %err, "Offline id lookup failed"),
            }
        }

        match invoices.find_by_remarks_tag(kind, &sale_id.tag()).await {
            Ok(found) => found,
            Err(err) => {
                warn!(doctype = %kind, error = %err, "Remarks tag lookup failed");
                None
            }
        }
    }

    /// Prices the lines, computes totals and completes the payment rows.
    async fn build_draft(
        &self,
        caller: &Caller,
        payload: SalePayload,
        skipped: &mut Vec<SkippedStep>,
    ) -> GatewayResult<NewInvoice> {
        let profile = match &payload.pos_profile {
            Some(name) => Some(self.state.db.profiles().get(name).await?.ok_or_else(|| {
                ValidationError::InvalidFormat {
                    field: "pos_profile".to_string(),
                    reason: format!("POS Profile {} not found", name),
                }
            })?),
            None => None,
        };
        let price_list = profile.as_ref().and_then(|p| p.selling_price_list.as_deref());

        let mut items = Vec::with_capacity(payload.items.len());
        for line in payload.items {
            let rate = match line.rate {
                Some(rate) => rate,
                None => self.resolve_rate(&line.item_code, price_list, skipped).await?,
            };
            let amount = rate
                .times_qty(line.qty)
                .filter(|amount| *amount <= Money::MAX)
                .ok_or_else(|| ValidationError::too_large("Item amount"))?;
            items.push(InvoiceItem {
                amount,
                item_code: line.item_code,
                qty: line.qty,
                rate,
                serial_no: line.serial_no,
            });
        }

        let grand_total = Money::checked_sum(items.iter().map(|item| item.amount))
            .filter(|total| *total <= Money::MAX)
            .ok_or_else(|| ValidationError::too_large("Grand total"))?;
        let rounded_total = match &profile {
            Some(PosProfile { disable_rounded_total: true, .. }) => None,
            _ => Some(grand_total.round_to_major()),
        };
        let payable = match rounded_total {
            Some(rounded) if !rounded.is_zero() => rounded,
            _ => grand_total,
        };

        let completion = self
            .complete_payment_rows(
                payload.pos_profile.as_deref(),
                &payload.company,
                payable,
                payload.payments,
            )
            .await;
        skipped.extend(completion.skipped);
        let paid_amount = completion
            .paid_amount
            .or_else(|| Money::checked_sum(completion.payments.iter().map(|p| p.amount)))
            .ok_or_else(|| ValidationError::too_large("Paid amount"))?;

        Ok(NewInvoice {
            doctype: payload.doctype,
            customer: payload.customer,
            company: payload.company,
            pos_profile: payload.pos_profile,
            is_pos: payload.is_pos,
            posting_date: payload.posting_date.unwrap_or_else(|| Utc::now().date_naive()),
            remarks: payload.remarks,
            offline_id: payload.offline_id,
            grand_total,
            rounded_total,
            paid_amount,
            owner: caller.user.clone(),
            items,
            payments: completion.payments,
        })
    }

    /// Price-list rate when one is set, else the item's standard rate.
    async fn resolve_rate(
        &self,
        item_code: &str,
        price_list: Option<&str>,
        skipped: &mut Vec<SkippedStep>,
    ) -> GatewayResult<Money> {
        let items = self.state.db.items();

        if let Some(price_list) = price_list {
            match items.price_list_rate(item_code, price_list).await {
                Ok(Some(rate)) => return Ok(rate),
                Ok(None) => {}
                Err(err) => {
                    warn!(item_code, price_list, error = %err, "Price list lookup failed");
                    skipped.push(SkippedStep::new(
                        STEP_PRICE_LIST_RATE,
                        format!("{}: {}", item_code, err),
                    ));
                }
            }
        }

        let item = items
            .get(item_code)
            .await?
            .ok_or_else(|| ValidationError::UnknownItem(item_code.to_string()))?;
        Ok(item.standard_rate())
    }

    // =========================================================================
    // Payment completion (shared)
    // =========================================================================

    async fn complete_payment_rows(
        &self,
        profile: Option<&str>,
        company: &str,
        total: Money,
        rows: Vec<PaymentRow>,
    ) -> PaymentCompletion {
        let sources = if needs_sources(total, &rows) {
            Some(self.payment_sources(profile, company).await)
        } else {
            None
        };

        let completion = complete_payments(total, rows, sources);
        for step in &completion.skipped {
            debug!(step = %step.step, reason = %step.reason, "Payment step skipped");
        }
        completion
    }

    async fn payment_sources(&self, profile: Option<&str>, company: &str) -> PaymentSources {
        let Some(name) = profile else {
            return PaymentSources::unavailable("invoice has no POS profile");
        };

        let profile = match self.state.db.profiles().get(name).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return PaymentSources::unavailable(format!("POS Profile {} not found", name)),
            Err(err) => return PaymentSources::unavailable(err.to_string()),
        };

        let first_method = match profile.payments.first() {
            Some(method) => {
                let account = self
                    .state
                    .db
                    .profiles()
                    .account_for(&method.mode_of_payment, company)
                    .await
                    .ok()
                    .flatten();
                Ok(PaymentRow::new(method.mode_of_payment.clone(), account))
            }
            None => Err("profile has no payment methods".to_string()),
        };

        PaymentSources {
            profile_defaults: self.profile_default_rows(&profile, company).await,
            first_method,
        }
    }

    /// One row per profile payment method; every account must resolve.
    async fn profile_default_rows(
        &self,
        profile: &PosProfile,
        company: &str,
    ) -> Result<Vec<PaymentRow>, String> {
        let profiles = self.state.db.profiles();
        let mut rows = Vec::with_capacity(profile.payments.len());

        for method in &profile.payments {
            let account = profiles
                .account_for(&method.mode_of_payment, company)
                .await
                .map_err(|err| err.to_string())?
                .ok_or_else(|| {
                    format!(
                        "no default account for {} in {}",
                        method.mode_of_payment, company
                    )
                })?;
            rows.push(PaymentRow::new(method.mode_of_payment.clone(), Some(account)));
        }

        Ok(rows)
    }

    // =========================================================================
    // mark_paid
    // =========================================================================

    /// Completes payment on an existing invoice and submits it.
    pub async fn mark_paid(
        &self,
        caller: &Caller,
        request: MarkPaidRequest,
    ) -> GatewayResult<SaleOutcome> {
        let candidates: Vec<InvoiceKind> =
            match request.doctype.as_deref().and_then(InvoiceKind::parse) {
                Some(kind) => vec![kind],
                None => InvoiceKind::ALL.to_vec(),
            };

        let Some((kind, name)) = self.locate(&candidates, &request).await else {
            return Ok(SaleOutcome::not_found());
        };

        caller.require(kind, DocAction::Submit)?;

        let invoices = self.state.db.invoices();
        let mut invoice = invoices
            .get(kind, &name)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("{} {}", kind, name)))?;

        if invoice.docstatus == DocStatus::Submitted && invoice.status.is_settled() {
            return Ok(SaleOutcome::done(invoice.name, SaleOutcome::ALREADY_PROCESSED));
        }

        if !invoice.is_draft() {
            return Ok(SaleOutcome::done(invoice.name, SaleOutcome::ALREADY_SUBMITTED));
        }

        let total = invoice.payable_total();
        let completion = self
            .complete_payment_rows(
                invoice.pos_profile.as_deref(),
                &invoice.company,
                total,
                std::mem::take(&mut invoice.payments),
            )
            .await;
        invoice.payments = completion.payments;
        if let Some(paid) = completion.paid_amount {
            invoice.paid_amount = paid;
        }

        invoices.save(&invoice).await.inspect_err(|err| {
            error!(name = %invoice.name, error = %err, "Saving payment rows failed");
        })?;

        let message = match invoices.submit(&invoice).await {
            Ok(status) => {
                info!(name = %invoice.name, ?status, "Invoice marked paid");
                SaleOutcome::SUBMITTED
            }
            Err(err) => {
                error!(name = %invoice.name, error = %err, "Submitting paid invoice failed");
                SaleOutcome::SAVED_DRAFT
            }
        };

        Ok(SaleOutcome::done(invoice.name, message).with_skipped(completion.skipped))
    }

    /// Finds the invoice by explicit name, then by sale id, per doctype.
    async fn locate(
        &self,
        candidates: &[InvoiceKind],
        request: &MarkPaidRequest,
    ) -> Option<(InvoiceKind, String)> {
        let invoices = self.state.db.invoices();

        if let Some(name) = request.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            for &kind in candidates {
                match invoices.exists(kind, name).await {
                    Ok(true) => return Some((kind, name.to_string())),
                    Ok(false) => {}
                    Err(err) => warn!(doctype = %kind, error = %err, "Invoice lookup failed"),
                }
            }
        }

        let sale_id = SaleId::parse(request.sale_id.as_deref())?;
        for &kind in candidates {
            let supports_offline_id = self.supports_offline_id(kind).await;
            if let Some(name) = self.find_by_sale_id(kind, &sale_id, supports_offline_id).await {
                return Some((kind, name));
            }
        }

        None
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cashier, seeded_state};
    use serde_json::{json, Value};
    use tillpoint_core::payment::{STEP_FALLBACK_ROW, STEP_PROFILE_ROWS};
    use tillpoint_core::InvoiceStatus;
    use tillpoint_db::repository::settings::POS_SETTINGS;

    fn example_sale() -> Value {
        json!({
            "customer": "C1",
            "company": "Co",
            "items": [{"item_code": "ITEM1", "qty": 2}],
            "pos_profile": "P1"
        })
    }

    fn request(sale: Value, sale_id: Option<&str>) -> SubmitSaleRequest {
        SubmitSaleRequest {
            sale: SaleInput::Document(sale),
            sale_id: sale_id.map(str::to_string),
        }
    }

    async fn service() -> SaleService {
        SaleService::new(seeded_state().await)
    }

    async fn pos_count(service: &SaleService) -> i64 {
        service
            .state
            .db
            .invoices()
            .count(InvoiceKind::PosInvoice)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_replay_with_same_sale_id_returns_same_invoice() {
        let service = service().await;

        let first = service
            .submit_sale(&cashier(), request(example_sale(), Some("sale:abc123")))
            .await
            .unwrap();
        assert!(first.ok);
        assert_eq!(first.message, SaleOutcome::CREATED);

        let second = service
            .submit_sale(&cashier(), request(example_sale(), Some("sale:abc123")))
            .await
            .unwrap();
        assert_eq!(
            second,
            SaleOutcome::done(first.name.clone().unwrap(), SaleOutcome::ALREADY_PROCESSED)
        );
        assert_eq!(pos_count(&service).await, 1);
    }

    #[tokio::test]
    async fn test_created_invoice_is_priced_tagged_and_paid() {
        let service = service().await;
        let outcome = service
            .submit_sale(&cashier(), request(example_sale(), Some("sale:abc123")))
            .await
            .unwrap();

        let invoice = service
            .state
            .db
            .invoices()
            .get(InvoiceKind::PosInvoice, outcome.name.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();

        // Retail price list rate 4.50 x 2
        assert_eq!(invoice.grand_total, Money::from_cents(900));
        assert_eq!(invoice.rounded_total, Some(Money::from_cents(900)));
        assert_eq!(invoice.remarks.as_deref(), Some("[offline:sale:abc123]"));
        assert_eq!(invoice.offline_id.as_deref(), Some("sale:abc123"));
        assert_eq!(invoice.owner, "cashier@co");
        assert_eq!(invoice.docstatus, DocStatus::Submitted);
        assert_eq!(invoice.status, InvoiceStatus::Paid);

        // Profile rows: Cash absorbs the total, Card stays at zero
        assert_eq!(invoice.payments.len(), 2);
        assert_eq!(invoice.payments[0].mode_of_payment, "Cash");
        assert_eq!(invoice.payments[0].account.as_deref(), Some("Cash - Co"));
        assert_eq!(invoice.payments[0].amount, Money::from_cents(900));
        assert_eq!(invoice.payments[1].amount, Money::zero());
        assert_eq!(invoice.paid_amount, Money::from_cents(900));
    }

    #[tokio::test]
    async fn test_without_sale_id_every_call_creates() {
        let service = service().await;
        let a = service.submit_sale(&cashier(), request(example_sale(), None)).await.unwrap();
        let b = service.submit_sale(&cashier(), request(example_sale(), None)).await.unwrap();

        assert_ne!(a.name, b.name);
        assert_eq!(pos_count(&service).await, 2);
    }

    #[tokio::test]
    async fn test_invalid_sale_id_is_dropped() {
        let service = service().await;
        let a = service
            .submit_sale(&cashier(), request(example_sale(), Some("sale abc")))
            .await
            .unwrap();
        let b = service
            .submit_sale(&cashier(), request(example_sale(), Some("sale abc")))
            .await
            .unwrap();

        assert_eq!(b.message, SaleOutcome::CREATED);
        assert_ne!(a.name, b.name);
    }

    #[tokio::test]
    async fn test_concurrent_replays_create_one_invoice() {
        let service = service().await;
        let caller = cashier();

        let (a, b) = tokio::join!(
            service.submit_sale(&caller, request(example_sale(), Some("sale:race"))),
            service.submit_sale(&caller, request(example_sale(), Some("sale:race"))),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.name, b.name);
        let mut messages = vec![a.message, b.message];
        messages.sort();
        assert_eq!(messages, vec![SaleOutcome::ALREADY_PROCESSED, SaleOutcome::CREATED]);
        assert_eq!(pos_count(&service).await, 1);
    }

    #[tokio::test]
    async fn test_missing_required_fields_create_nothing() {
        let service = service().await;

        for (field, message) in [
            ("customer", "Customer is required"),
            ("company", "Company is required"),
            ("pos_profile", "POS Profile is required"),
        ] {
            let mut sale = example_sale();
            sale.as_object_mut().unwrap().remove(field);
            let err = service
                .submit_sale(&cashier(), request(sale, Some("sale:x")))
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), message);
        }

        let mut sale = example_sale();
        sale["items"] = json!([]);
        let err = service.submit_sale(&cashier(), request(sale, None)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(ValidationError::MissingItems)));

        assert_eq!(pos_count(&service).await, 0);
    }

    #[tokio::test]
    async fn test_item_checks() {
        let service = service().await;

        let mut sale = example_sale();
        sale["items"] = json!((0..201).map(|_| json!({"item_code": "ITEM1", "qty": 1})).collect::<Vec<_>>());
        let err = service.submit_sale(&cashier(), request(sale, None)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(ValidationError::TooManyItems { max: 200 })));

        for (qty, expected) in [
            (json!(-1), ValidationError::NegativeQty),
            (json!("two"), ValidationError::QtyNotNumeric),
        ] {
            let mut sale = example_sale();
            sale["items"] = json!([{"item_code": "ITEM1", "qty": qty}]);
            let err = service.submit_sale(&cashier(), request(sale, None)).await.unwrap_err();
            assert!(matches!(err, GatewayError::Validation(ref e) if *e == expected));
        }

        let mut sale = example_sale();
        sale["items"] = json!([{"item_code": "NOPE", "qty": 1}]);
        let err = service.submit_sale(&cashier(), request(sale, None)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(ValidationError::UnknownItem(code)) if code == "NOPE"));

        assert_eq!(pos_count(&service).await, 0);
    }

    #[tokio::test]
    async fn test_oversized_amounts_are_rejected_before_insert() {
        let service = service().await;

        let mut sale = example_sale();
        sale["items"] = json!([
            {"item_code": "ITEM1", "qty": "1e17"},
            {"item_code": "ITEM2", "qty": "1e17"}
        ]);
        let err = service
            .submit_sale(&cashier(), request(sale, Some("sale:big")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Item amount is too large");
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        // Each line fits, their sum does not
        let mut sale = example_sale();
        sale["items"] = json!([
            {"item_code": "ITEM1", "qty": 1.5e12},
            {"item_code": "ITEM1", "qty": 1.5e12}
        ]);
        let err = service.submit_sale(&cashier(), request(sale, None)).await.unwrap_err();
        assert_eq!(err.to_string(), "Grand total is too large");

        let mut sale = example_sale();
        sale["items"] = json!([{"item_code": "ITEM1", "qty": 1, "rate": -4}]);
        let err = service.submit_sale(&cashier(), request(sale, None)).await.unwrap_err();
        assert_eq!(err.to_string(), "Item rate must be non-negative");

        let mut sale = example_sale();
        sale["payments"] = json!([{"mode_of_payment": "Cash", "amount": -10}]);
        let err = service.submit_sale(&cashier(), request(sale, None)).await.unwrap_err();
        assert_eq!(err.to_string(), "Payment amount must be non-negative");

        assert_eq!(pos_count(&service).await, 0);
    }

    #[tokio::test]
    async fn test_text_payload_and_bad_json() {
        let service = service().await;

        let text = SubmitSaleRequest {
            sale: SaleInput::Text(example_sale().to_string()),
            sale_id: None,
        };
        assert_eq!(
            service.submit_sale(&cashier(), text).await.unwrap().message,
            SaleOutcome::CREATED
        );

        let broken = SubmitSaleRequest {
            sale: SaleInput::Text("{\"customer\": ".to_string()),
            sale_id: None,
        };
        let err = service.submit_sale(&cashier(), broken).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid sale payload");
    }

    #[tokio::test]
    async fn test_permission_is_checked_before_insert() {
        let service = service().await;
        let caller = Caller::new("viewer@co", None, vec!["Sales Invoice:create".to_string()]);

        let err = service
            .submit_sale(&caller, request(example_sale(), Some("sale:p")))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PermissionDenied(_)));
        assert_eq!(pos_count(&service).await, 0);
    }

    #[tokio::test]
    async fn test_sales_invoice_deduplicates_by_remarks_tag() {
        let service = service().await;
        service
            .state
            .db
            .settings()
            .set_single_value(POS_SETTINGS, "invoice_type", "Sales Invoice")
            .await
            .unwrap();

        let mut sale = example_sale();
        sale["remarks"] = json!("Table 4");
        sale["name"] = json!("CLIENT-NAME");
        let first = service
            .submit_sale(&cashier(), request(sale.clone(), Some("sale:si_1")))
            .await
            .unwrap();
        let second = service
            .submit_sale(&cashier(), request(sale, Some("sale:si_1")))
            .await
            .unwrap();

        let name = first.name.clone().unwrap();
        assert!(name.starts_with("ACC-SINV-"));
        assert_eq!(second.message, SaleOutcome::ALREADY_PROCESSED);
        assert_eq!(second.name, first.name);

        let invoice = service
            .state
            .db
            .invoices()
            .get(InvoiceKind::SalesInvoice, &name)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(invoice.remarks.as_deref(), Some("Table 4 [offline:sale:si_1]"));
        assert_eq!(invoice.offline_id, None);
        assert!(invoice.is_pos);
    }

    #[tokio::test]
    async fn test_unpayable_pos_sale_stays_draft() {
        let service = service().await;
        let mut sale = example_sale();
        sale["pos_profile"] = json!("P-EMPTY");

        let outcome = service.submit_sale(&cashier(), request(sale, None)).await.unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.message, SaleOutcome::CREATED_DRAFT);

        let steps: Vec<&str> = outcome.skipped_steps.iter().map(|s| s.step.as_str()).collect();
        assert!(steps.contains(&STEP_PROFILE_ROWS));
        assert!(steps.contains(&STEP_FALLBACK_ROW));

        let invoice = service
            .state
            .db
            .invoices()
            .get(InvoiceKind::PosInvoice, outcome.name.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(invoice.is_draft());
        // No price list on P-EMPTY: standard rate 5.00 x 2, rounding disabled
        assert_eq!(invoice.grand_total, Money::from_cents(1000));
        assert_eq!(invoice.rounded_total, None);
    }

    #[tokio::test]
    async fn test_client_rates_and_payments_are_kept() {
        let service = service().await;
        let mut sale = example_sale();
        sale["items"] = json!([{"item_code": "ITEM2", "qty": "1.5", "rate": "3.30"}]);
        sale["payments"] = json!([
            {"mode_of_payment": "Card", "account": "Bank - Co", "amount": 2},
            {"mode_of_payment": "Cash", "amount": 1}
        ]);

        let outcome = service.submit_sale(&cashier(), request(sale, None)).await.unwrap();
        let invoice = service
            .state
            .db
            .invoices()
            .get(InvoiceKind::PosInvoice, outcome.name.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();

        // 3.30 x 1.5 = 4.95, rounded to 5.00; Card absorbs the 2.00 shortfall
        assert_eq!(invoice.grand_total, Money::from_cents(495));
        assert_eq!(invoice.rounded_total, Some(Money::from_cents(500)));
        assert_eq!(invoice.payments[0].amount, Money::from_cents(400));
        assert_eq!(invoice.payments[1].amount, Money::from_cents(100));
        assert_eq!(outcome.message, SaleOutcome::CREATED);
    }

    #[tokio::test]
    async fn test_mark_paid_completes_draft() {
        let service = service().await;
        let mut sale = example_sale();
        sale["pos_profile"] = json!("P-EMPTY");
        let created = service
            .submit_sale(&cashier(), request(sale, Some("sale:late")))
            .await
            .unwrap();
        let name = created.name.clone().unwrap();

        // The profile gains a payment method after the sale was queued
        service
            .state
            .db
            .profiles()
            .insert(&PosProfile {
                name: "P-LATE".to_string(),
                company: "Co".to_string(),
                warehouse: None,
                selling_price_list: None,
                disable_rounded_total: true,
                payments: vec![crate::test_support::method("Cash", true)],
            })
            .await
            .unwrap();
        sqlx::query("UPDATE invoices SET pos_profile = 'P-LATE' WHERE name = ?1")
            .bind(&name)
            .execute(service.state.db.pool())
            .await
            .unwrap();

        let outcome = service
            .mark_paid(
                &cashier(),
                MarkPaidRequest {
                    sale_id: Some("sale:late".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, SaleOutcome::done(name.clone(), SaleOutcome::SUBMITTED));

        let invoice = service
            .state
            .db
            .invoices()
            .get(InvoiceKind::PosInvoice, &name)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.payments_total(), Some(invoice.payable_total()));

        let again = service
            .mark_paid(
                &cashier(),
                MarkPaidRequest {
                    name: Some(name.clone()),
                    doctype: Some("pos invoice".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(again, SaleOutcome::done(name, SaleOutcome::ALREADY_PROCESSED));
    }

    #[tokio::test]
    async fn test_mark_paid_unpayable_draft_is_saved() {
        let service = service().await;
        let mut sale = example_sale();
        sale["pos_profile"] = json!("P-EMPTY");
        let created = service.submit_sale(&cashier(), request(sale, None)).await.unwrap();

        let outcome = service
            .mark_paid(
                &cashier(),
                MarkPaidRequest {
                    name: created.name.clone(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.message, SaleOutcome::SAVED_DRAFT);
        assert!(!outcome.skipped_steps.is_empty());
    }

    #[tokio::test]
    async fn test_mark_paid_not_found_and_unpaid_submitted() {
        let service = service().await;

        let missing = service
            .mark_paid(
                &cashier(),
                MarkPaidRequest {
                    name: Some("ACC-PSINV-2026-99999".to_string()),
                    sale_id: Some("sale:none".to_string()),
                    doctype: Some("nonsense".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(missing, SaleOutcome::not_found());

        // Sales invoices may be submitted unpaid
        service
            .state
            .db
            .settings()
            .set_single_value(POS_SETTINGS, "invoice_type", "Sales Invoice")
            .await
            .unwrap();
        let mut sale = example_sale();
        sale.as_object_mut().unwrap().remove("pos_profile");
        let created = service.submit_sale(&cashier(), request(sale, None)).await.unwrap();
        assert_eq!(created.message, SaleOutcome::CREATED);

        let outcome = service
            .mark_paid(
                &cashier(),
                MarkPaidRequest {
                    name: created.name.clone(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.message, SaleOutcome::ALREADY_SUBMITTED);
    }

    #[tokio::test]
    async fn test_mark_paid_requires_submit_permission() {
        let service = service().await;
        let created = service
            .submit_sale(&cashier(), request(example_sale(), None))
            .await
            .unwrap();
        let caller = Caller::new("clerk@co", None, vec!["POS Invoice:create".to_string()]);

        let err = service
            .mark_paid(
                &caller,
                MarkPaidRequest {
                    name: created.name,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PermissionDenied(_)));
    }
}
