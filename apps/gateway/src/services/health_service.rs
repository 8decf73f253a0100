//! Health check service.
//!
//! Reports database and cache connectivity for monitoring.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use ts_rs::TS;

use crate::AppState;

/// Serving state of one component or of the whole gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ServingStatus {
    Serving,
    Degraded,
    NotServing,
}

/// Status of one dependency.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ComponentHealth {
    pub status: ServingStatus,
    pub message: String,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct HealthReport {
    pub status: ServingStatus,
    pub database: ComponentHealth,
    pub cache: ComponentHealth,
    /// Known / applied migrations
    pub migrations: Option<(usize, usize)>,
    pub server_time: String,
}

/// Health service implementation.
pub struct HealthService {
    state: Arc<AppState>,
}

impl HealthService {
    /// Create a new health service.
    pub fn new(state: Arc<AppState>) -> Self {
        HealthService { state }
    }

    /// Check overall system health.
    pub async fn check(&self) -> HealthReport {
        let database = self.check_database_health().await;
        let cache = self.check_cache_health().await;

        let status = if database.status != ServingStatus::Serving {
            ServingStatus::NotServing
        } else if cache.status != ServingStatus::Serving {
            // The cache only saves work, so we're degraded but not down
            ServingStatus::Degraded
        } else {
            ServingStatus::Serving
        };

        HealthReport {
            status,
            database,
            cache,
            migrations: self.state.db.migration_status().await.ok(),
            server_time: Utc::now().to_rfc3339(),
        }
    }

    async fn check_database_health(&self) -> ComponentHealth {
        match sqlx::query("SELECT 1").fetch_one(self.state.db.pool()).await {
            Ok(_) => ComponentHealth {
                status: ServingStatus::Serving,
                message: "Database connected".to_string(),
            },
            Err(e) => ComponentHealth {
                status: ServingStatus::NotServing,
                message: format!("Database error: {}", e),
            },
        }
    }

    async fn check_cache_health(&self) -> ComponentHealth {
        let backend = self.state.cache.backend();
        match self.state.cache.ping().await {
            Ok(()) => ComponentHealth {
                status: ServingStatus::Serving,
                message: format!("{} cache available", backend),
            },
            Err(e) => ComponentHealth {
                status: ServingStatus::NotServing,
                message: format!("{} cache error: {}", backend, e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seeded_state;

    #[tokio::test]
    async fn test_healthy_in_memory_gateway() {
        let report = HealthService::new(seeded_state().await).check().await;

        assert_eq!(report.status, ServingStatus::Serving);
        assert_eq!(report.cache.message, "memory cache available");
        let (total, applied) = report.migrations.unwrap();
        assert_eq!(applied, total);
    }

    #[tokio::test]
    async fn test_closed_pool_is_not_serving() {
        let state = seeded_state().await;
        state.db.close().await;

        let report = HealthService::new(state).check().await;
        assert_eq!(report.status, ServingStatus::NotServing);
        assert_eq!(report.database.status, ServingStatus::NotServing);
    }
}
