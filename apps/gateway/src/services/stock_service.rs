//! # Stock Service
//!
//! Batched availability for the items in a till's cart.
//!
//! ```text
//! item_codes ──► normalise (list | JSON list | "A,B" | "A")
//!                   │ trim, drop empties, dedupe keeping order
//!                   ▼
//!              POS profile (explicit, else the caller's default)
//!                   │ warehouse
//!                   ▼
//!              cache key ── hit ──► answer
//!                   │ miss
//!                   ▼
//!              stock_flags(codes)  one query
//!              actual_qty(code)    per stock item
//! ```
//!
//! Nothing here fails the request: an unresolvable profile yields `{}` and
//! per-item problems show up as `is_stock_item: null`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::Caller;
use crate::cache::{cache_key, AvailabilityMap};
use crate::AppState;
use tillpoint_core::{ItemAvailability, PosProfile};

/// Item codes as tills send them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemCodes {
    List(Vec<Value>),
    Text(String),
}

/// Body of `POST /api/pos/stock`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockQuery {
    #[serde(default)]
    pub item_codes: Option<ItemCodes>,
    #[serde(default)]
    pub pos_profile: Option<String>,
    /// Accepted for compatibility; the profile's warehouse is always used.
    #[serde(default)]
    pub warehouse: Option<String>,
}

/// Query string of `GET /api/pos/stock`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockQueryParams {
    pub item_codes: Option<String>,
    pub pos_profile: Option<String>,
    pub warehouse: Option<String>,
}

impl From<StockQueryParams> for StockQuery {
    fn from(params: StockQueryParams) -> Self {
        StockQuery {
            item_codes: params.item_codes.map(ItemCodes::Text),
            pos_profile: params.pos_profile,
            warehouse: params.warehouse,
        }
    }
}

/// Flattens every accepted input shape into an ordered, deduplicated list.
///
/// ## Example
/// ```rust
/// use tillpoint_gateway::services::stock_service::{normalize_item_codes, ItemCodes};
///
/// let codes = normalize_item_codes(Some(ItemCodes::Text(" A, B,,A ".into())));
/// assert_eq!(codes, vec!["A", "B"]);
///
/// let codes = normalize_item_codes(Some(ItemCodes::Text(r#"["B","A"]"#.into())));
/// assert_eq!(codes, vec!["B", "A"]);
/// ```
pub fn normalize_item_codes(codes: Option<ItemCodes>) -> Vec<String> {
    let raw: Vec<String> = match codes {
        None => Vec::new(),
        Some(ItemCodes::List(values)) => values.iter().filter_map(code_text).collect(),
        Some(ItemCodes::Text(text)) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(values)) => values.iter().filter_map(code_text).collect(),
            Ok(value @ (Value::String(_) | Value::Number(_))) => code_text(&value).into_iter().collect(),
            Ok(_) => Vec::new(),
            Err(_) => text.split(',').map(str::to_string).collect(),
        },
    };

    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty() && seen.insert(code.clone()))
        .collect()
}

fn code_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Stock service implementation.
pub struct StockService {
    state: Arc<AppState>,
}

impl StockService {
    /// Create a new stock service.
    pub fn new(state: Arc<AppState>) -> Self {
        StockService { state }
    }

    /// Availability of each requested item at the profile's warehouse.
    pub async fn get_available_qty(&self, caller: &Caller, query: StockQuery) -> AvailabilityMap {
        let codes = normalize_item_codes(query.item_codes);
        if codes.is_empty() {
            return AvailabilityMap::new();
        }
        if let Some(warehouse) = &query.warehouse {
            debug!(%warehouse, "Ignoring client warehouse");
        }

        let Some(profile) = resolve_profile(&self.state, caller, query.pos_profile.as_deref()).await else {
            debug!(user = %caller.user, "No POS profile for availability lookup");
            return AvailabilityMap::new();
        };
        let Some(warehouse) = profile.warehouse.filter(|w| !w.trim().is_empty()) else {
            debug!(profile = %profile.name, "POS profile has no warehouse");
            return AvailabilityMap::new();
        };

        let key = cache_key(&warehouse, &codes);
        match self.state.cache.get(&key).await {
            Ok(Some(cached)) => return cached,
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "Availability cache read failed");
                return self.compute(&codes, &warehouse).await;
            }
        }

        let availability = self.compute(&codes, &warehouse).await;
        let ttl = Duration::from_secs(self.state.config.stock_cache_ttl_secs);
        if let Err(err) = self.state.cache.set(&key, &availability, ttl).await {
            warn!(error = %err, "Availability cache write failed");
        }
        availability
    }

    async fn compute(&self, codes: &[String], warehouse: &str) -> AvailabilityMap {
        let items = self.state.db.items();

        let flags = items.stock_flags(codes).await.unwrap_or_else(|err| {
            warn!(error = %err, "Stock flag lookup failed, treating items as untracked");
            HashMap::new()
        });

        let mut availability = AvailabilityMap::new();
        for code in codes {
            let entry = if flags.get(code).copied().unwrap_or(false) {
                match items.actual_qty(code, warehouse).await {
                    Ok(qty) => ItemAvailability::tracked(qty),
                    Err(err) => {
                        warn!(item_code = %code, error = %err, "Bin lookup failed");
                        ItemAvailability::unknown()
                    }
                }
            } else {
                ItemAvailability::untracked()
            };
            availability.insert(code.clone(), entry);
        }

        debug!(warehouse, items = availability.len(), "Computed availability");
        availability
    }
}

/// The named profile, falling back to the caller's default profile when the
/// name is blank, unknown or its lookup fails.
pub(crate) async fn resolve_profile(
    state: &AppState,
    caller: &Caller,
    explicit: Option<&str>,
) -> Option<PosProfile> {
    let profiles = state.db.profiles();

    if let Some(name) = explicit.map(str::trim).filter(|name| !name.is_empty()) {
        match profiles.get(name).await {
            Ok(Some(profile)) => return Some(profile),
            Ok(None) => debug!(profile = %name, "Profile not found, using the default profile"),
            Err(err) => warn!(profile = %name, error = %err, "Profile lookup failed, using the default profile"),
        }
    }

    let name = profiles
        .default_for_user(&caller.user, caller.company.as_deref())
        .await
        .unwrap_or_else(|err| {
            warn!(user = %caller.user, error = %err, "Default profile lookup failed");
            None
        })?;

    profiles.get(&name).await.unwrap_or_else(|err| {
        warn!(profile = %name, error = %err, "Profile lookup failed");
        None
    })
}
