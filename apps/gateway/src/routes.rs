//! # HTTP Routes
//!
//! ```text
//! GET  /health                     no auth
//! POST /api/pos/sales              submit_sale
//! POST /api/pos/sales/mark-paid    mark_paid
//! GET  /api/pos/stock              get_available_qty (query string)
//! POST /api/pos/stock              get_available_qty (JSON body, lists allowed)
//! POST /api/pos/item-details       item_details
//! ```
//!
//! Every `/api` route extracts a [`Caller`] from the bearer token first.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::auth::Caller;
use crate::cache::AvailabilityMap;
use crate::error::{GatewayError, GatewayResult};
use crate::services::health_service::{HealthReport, HealthService, ServingStatus};
use crate::services::item_details_service::{ItemDetailsRequest, ItemDetailsService};
use crate::services::sale_service::{MarkPaidRequest, SaleService, SubmitSaleRequest};
use crate::services::stock_service::{StockQuery, StockQueryParams, StockService};
use crate::AppState;
use tillpoint_core::validation::Document;
use tillpoint_core::SaleOutcome;

/// Builds the gateway router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/pos/sales", post(submit_sale_handler))
        .route("/api/pos/sales/mark-paid", post(mark_paid_handler))
        .route("/api/pos/stock", get(stock_query_handler).post(stock_body_handler))
        .route("/api/pos/item-details", post(item_details_handler))
        .with_state(state)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> GatewayResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| GatewayError::BadRequest(rejection.body_text()))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let report = HealthService::new(state).check().await;
    let status = match report.status {
        ServingStatus::NotServing => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(report))
}

async fn submit_sale_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Result<Json<SubmitSaleRequest>, JsonRejection>,
) -> GatewayResult<Json<SaleOutcome>> {
    let request = json_body(body)?;
    SaleService::new(state).submit_sale(&caller, request).await.map(Json)
}

async fn mark_paid_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Result<Json<MarkPaidRequest>, JsonRejection>,
) -> GatewayResult<Json<SaleOutcome>> {
    let request = json_body(body)?;
    SaleService::new(state).mark_paid(&caller, request).await.map(Json)
}

async fn stock_query_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    params: Result<Query<StockQueryParams>, QueryRejection>,
) -> GatewayResult<Json<AvailabilityMap>> {
    let Query(params) = params.map_err(|rejection| GatewayError::BadRequest(rejection.body_text()))?;
    let availability = StockService::new(state)
        .get_available_qty(&caller, StockQuery::from(params))
        .await;
    Ok(Json(availability))
}

async fn stock_body_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Result<Json<StockQuery>, JsonRejection>,
) -> GatewayResult<Json<AvailabilityMap>> {
    let query = json_body(body)?;
    Ok(Json(StockService::new(state).get_available_qty(&caller, query).await))
}

async fn item_details_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Result<Json<ItemDetailsRequest>, JsonRejection>,
) -> GatewayResult<Json<Document>> {
    let request = json_body(body)?;
    ItemDetailsService::new(state)
        .item_details(&caller, request)
        .await
        .map(Json)
}

// =============================================================================
// Router Tests
// =============================================================================
