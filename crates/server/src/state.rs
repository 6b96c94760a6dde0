// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use rolo_db::Database;
use rolo_jobs::{HandlerRegistry, Runner, RunnerConfig, StatusConfig};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Database handle for job queries.
    pub db: Database,
    /// On-demand job runner (claims and executes due jobs).
    pub runner: Runner,
    /// Tunables for the status aggregator.
    pub status_config: StatusConfig,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    ///
    /// The registry carries the handlers the embedding application
    /// registered for its job kinds; the runner and status aggregator
    /// use the documented default configuration.
    pub fn new(db: Database, registry: Arc<HandlerRegistry>) -> Arc<Self> {
        Self::with_configs(db, registry, RunnerConfig::default(), StatusConfig::default())
    }

    /// Create with explicit runner/status configuration (for tests and
    /// embedders that tune the defaults).
    pub fn with_configs(
        db: Database,
        registry: Arc<HandlerRegistry>,
        runner_config: RunnerConfig,
        status_config: StatusConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            runner: Runner::new(db.clone(), registry, runner_config),
            db,
            status_config,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_new() {
        let db = Database::new_in_memory().await.expect("in-memory DB");
        let state = AppState::new(db, Arc::new(HandlerRegistry::new()));
        assert!(state.uptime_secs() < 1);
        assert_eq!(state.runner.config().max_attempts, 5);
    }
}
