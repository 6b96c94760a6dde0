// crates/server/src/routes/mod.rs
use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

pub mod health;
pub mod jobs;

/// Combine all API routes under one router.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().merge(health::router()).merge(jobs::router())
}
