// crates/jobs/src/config.rs
//! Fixed configuration surface for the runner and status aggregator.
//!
//! Defaults are the documented contract: 5 attempts, 200ms backoff
//! base, 60s backoff cap, 5-minute handler timeout.

use std::time::Duration;

/// Tunables for one runner invocation.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Attempt ceiling; a job reaching this count becomes terminal `error`.
    pub max_attempts: i64,
    /// Base of the exponential backoff window.
    pub base_delay: Duration,
    /// Upper bound on the backoff window.
    pub max_backoff: Duration,
    /// Per-job execution guard; exceeding it fails the attempt.
    pub handler_timeout: Duration,
    /// Maximum candidates pulled per invocation.
    pub batch_size: i64,
    /// Pause between sequential executions, to throttle load against
    /// rate-limited external services.
    pub inter_job_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            max_backoff: Duration::from_secs(60),
            handler_timeout: Duration::from_secs(5 * 60),
            batch_size: 25,
            inter_job_delay: Duration::from_millis(200),
        }
    }
}

/// Tunables for status aggregation.
#[derive(Debug, Clone)]
pub struct StatusConfig {
    /// A `processing` job untouched for longer than this is flagged stuck.
    pub stuck_threshold: Duration,
    /// Bound on the pending-jobs list in a status payload.
    pub pending_limit: i64,
    /// Bound on the terminal-jobs history list.
    pub history_limit: i64,
    /// Window for the "recent failures" health deduction.
    pub recent_failure_window: Duration,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            stuck_threshold: Duration::from_secs(10 * 60),
            pending_limit: 50,
            history_limit: 20,
            recent_failure_window: Duration::from_secs(60 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_defaults() {
        let cfg = RunnerConfig::default();
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.base_delay, Duration::from_millis(200));
        assert_eq!(cfg.max_backoff, Duration::from_secs(60));
        assert_eq!(cfg.handler_timeout, Duration::from_secs(300));

        let status = StatusConfig::default();
        assert_eq!(status.stuck_threshold, Duration::from_secs(600));
        assert_eq!(status.pending_limit, 50);
    }
}
