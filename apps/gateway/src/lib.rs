//! # Tillpoint Gateway
//!
//! HTTP API that offline POS tills replay their queued work against.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Gateway Services                               │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  SaleService   │  │  StockService  │  │  ItemDetailsService        ││
//! │  │                │  │                │  │                            ││
//! │  │ • submit_sale  │  │ • get_available│  │ • item_details             ││
//! │  │ • mark_paid    │  │   _qty         │  │   (tolerant helpers)       ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐                                                    │
//! │  │  HealthService │                                                    │
//! │  └────────────────┘                                                    │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Infrastructure                               │  │
//! │  │                                                                   │  │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐│  │
//! │  │  │  SQLite      │  │  Cache       │  │    JWT Auth              ││  │
//! │  │  │              │  │              │  │                          ││  │
//! │  │  │ Document     │  │ Memory or    │  │ Caller + doctype         ││  │
//! │  │  │ store        │  │ Redis        │  │ permissions              ││  │
//! │  │  └──────────────┘  └──────────────┘  └──────────────────────────┘│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `TILLPOINT_HTTP_PORT` - HTTP port (default: 8080)
//! - `TILLPOINT_DATABASE_PATH` - SQLite file (default: ./tillpoint.db)
//! - `REDIS_URL` - Redis connection string, enables the shared stock cache
//! - `JWT_SECRET` - Secret for JWT validation
//! - `JWT_ACCESS_LIFETIME_SECS` - Access token lifetime (default: 3600)
//! - `TILLPOINT_STOCK_CACHE_TTL_SECS` - Availability cache TTL (default: 5)
//! - `TILLPOINT_MAX_SALE_ITEMS` - Line items per sale (default: 200)

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;

// Re-exports
pub use cache::AvailabilityCache;
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use routes::build_router;

use auth::JwtManager;
use services::item_details_service::{DbItemDetails, TolerantItemDetails};
use tillpoint_db::Database;

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub cache: AvailabilityCache,
    pub jwt: JwtManager,
    pub item_details: TolerantItemDetails<DbItemDetails>,
    pub config: GatewayConfig,
}

impl AppState {
    pub fn new(db: Database, cache: AvailabilityCache, config: GatewayConfig) -> Self {
        AppState {
            jwt: JwtManager::new(config.jwt_secret.clone(), config.jwt_access_lifetime_secs),
            item_details: TolerantItemDetails::new(DbItemDetails::new(db.clone())),
            db,
            cache,
            config,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! A small seeded store shared by the service and route tests.

    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use tillpoint_core::{Money, PosProfile, ProfilePaymentMethod};
    use tillpoint_db::{Database, DbConfig, NewItem};

    use crate::auth::Caller;
    use crate::{AppState, AvailabilityCache, GatewayConfig};

    pub const COMPANY: &str = "Co";
    pub const WAREHOUSE: &str = "Stores - Co";
    pub const CASHIER: &str = "cashier@co";

    pub fn method(mode: &str, is_default: bool) -> ProfilePaymentMethod {
        ProfilePaymentMethod {
            mode_of_payment: mode.to_string(),
            is_default,
        }
    }

    /// Items `ITEM1` (5.00, 7 on hand, 4.50 on Retail), `ITEM2` (12.50, no bin),
    /// `SVC1` (service) and `SER1` (serial-tracked, SN-1..SN-3);
    /// profile `P1` with Cash and Card for the cashier, `P-EMPTY` without
    /// payment methods.
    pub async fn seeded_state() -> Arc<AppState> {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let items = db.items();
        items.upsert(&NewItem::stock("ITEM1", Money::from_cents(500))).await.unwrap();
        items.upsert(&NewItem::stock("ITEM2", Money::from_cents(1250))).await.unwrap();
        items.upsert(&NewItem::service("SVC1", Money::from_cents(2000))).await.unwrap();
        items
            .upsert(&NewItem {
                has_serial_no: true,
                ..NewItem::stock("SER1", Money::from_cents(10000))
            })
            .await
            .unwrap();
        items.set_actual_qty("ITEM1", WAREHOUSE, 7.0).await.unwrap();
        items.set_actual_qty("SER1", WAREHOUSE, 3.0).await.unwrap();
        items.set_price("ITEM1", "Retail", Money::from_cents(450)).await.unwrap();
        let received = Utc::now() - Duration::days(1);
        for n in 1..=3 {
            items
                .add_serial_no(&format!("SN-{}", n), "SER1", WAREHOUSE, received + Duration::minutes(n))
                .await
                .unwrap();
        }

        let profiles = db.profiles();
        profiles
            .insert(&PosProfile {
                name: "P1".to_string(),
                company: COMPANY.to_string(),
                warehouse: Some(WAREHOUSE.to_string()),
                selling_price_list: Some("Retail".to_string()),
                disable_rounded_total: false,
                payments: vec![method("Cash", true), method("Card", false)],
            })
            .await
            .unwrap();
        profiles
            .insert(&PosProfile {
                name: "P-EMPTY".to_string(),
                company: COMPANY.to_string(),
                warehouse: Some(WAREHOUSE.to_string()),
                selling_price_list: None,
                disable_rounded_total: true,
                payments: Vec::new(),
            })
            .await
            .unwrap();
        profiles.assign_user("P1", CASHIER, true).await.unwrap();
        profiles.set_account("Cash", COMPANY, "Cash - Co").await.unwrap();
        profiles.set_account("Card", COMPANY, "Bank - Co").await.unwrap();

        let config = GatewayConfig::from_lookup(|_| None).unwrap();
        Arc::new(AppState::new(db, AvailabilityCache::memory(), config))
    }

    /// The cashier with every permission on both invoice doctypes.
    pub fn cashier() -> Caller {
        Caller::new(CASHIER, Some(COMPANY.to_string()), vec!["*".to_string()])
    }
}
