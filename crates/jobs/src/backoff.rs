// crates/jobs/src/backoff.rs
//! Exponential backoff computed from the job row's `updated_at`.
//!
//! There is no delay-queue primitive: a failed job returns to `queued`
//! with a fresh `updated_at`, and every runner pass re-derives the
//! window from the attempt count. A job inside its window is simply
//! skipped until a later pass.

use std::time::Duration;

use rolo_db::Job;

use crate::config::RunnerConfig;

/// The delay a job must sit out after `attempts` failures:
/// `min(base × 2^attempts, max_backoff)`.
pub fn backoff_delay(attempts: i64, config: &RunnerConfig) -> Duration {
    let exp = u32::try_from(attempts).unwrap_or(u32::MAX).min(32);
    let delay_ms = (config.base_delay.as_millis() as u64).saturating_mul(1u64 << exp);
    Duration::from_millis(delay_ms).min(config.max_backoff)
}

/// Whether a queued job is eligible to run at `now` (epoch ms).
///
/// First attempts are always due; retries wait out the window measured
/// from `updated_at`, which the failure write refreshed.
pub fn is_due(job: &Job, now: i64, config: &RunnerConfig) -> bool {
    if job.attempts == 0 {
        return true;
    }
    let elapsed_ms = now.saturating_sub(job.updated_at);
    elapsed_ms >= backoff_delay(job.attempts, config).as_millis() as i64
}
