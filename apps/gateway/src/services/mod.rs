//! Gateway service implementations.
//!
//! Each service holds the shared [`AppState`](crate::AppState); the HTTP
//! handlers in [`routes`](crate::routes) are thin wrappers around them.

pub mod health_service;
pub mod item_details_service;
pub mod sale_service;
pub mod stock_service;
