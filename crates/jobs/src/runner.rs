// crates/jobs/src/runner.rs
//! On-demand job runner: one bounded batch pass per invocation.
//!
//! Concurrency model: any number of invocations (same user, different
//! users, duplicate triggers) may overlap. The atomic conditional
//! update in [`Database::claim_job`] is the only synchronization
//! primitive — a lost claim is silently skipped, never an error.
//! Within one invocation jobs execute sequentially, paced by a fixed
//! inter-job delay, so concurrent load against rate-limited external
//! APIs stays bounded.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use rolo_db::{now_ms, Database, DbResult, Job};

use crate::backoff;
use crate::config::RunnerConfig;
use crate::dispatch::HandlerRegistry;

/// One failed job within a batch summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub job_id: String,
    pub kind: String,
    pub message: String,
    /// Whether the job went back to the queue (true) or terminal error.
    pub will_retry: bool,
}

/// Result of one runner invocation over a user's due jobs.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub errors: Vec<JobFailure>,
}

/// How a single execution attempt ended.
enum Attempt {
    Success,
    /// Handler error or timeout — retryable within the attempt budget.
    Failed(String),
    /// Unroutable kind — terminal regardless of remaining budget.
    Unroutable(String),
}

pub struct Runner {
    db: Database,
    registry: Arc<HandlerRegistry>,
    config: RunnerConfig,
}

impl Runner {
    pub fn new(db: Database, registry: Arc<HandlerRegistry>, config: RunnerConfig) -> Self {
        Self {
            db,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Execute one bounded batch of `user_id`'s due jobs.
    ///
    /// Per-job failures are recorded on the row and in the summary;
    /// only a failure to reach the job store itself propagates as an
    /// error out of the invocation.
    pub async fn run_pending(&self, user_id: &str) -> DbResult<RunSummary> {
        let candidates = self
            .db
            .list_queued_jobs(user_id, self.config.batch_size)
            .await?;

        let mut summary = RunSummary::default();
        for job in candidates {
            let now = now_ms();
            if !backoff::is_due(&job, now, &self.config) {
                debug!(job_id = %job.id, attempts = job.attempts, "Job inside backoff window, skipping");
                continue;
            }

            // Claim race: zero affected rows means another invocation
            // got there first, or already retried this row since we
            // selected it. Not an error.
            if !self.db.claim_job(user_id, &job.id, job.attempts, now).await? {
                debug!(job_id = %job.id, "Lost claim race, skipping");
                continue;
            }

            if summary.processed > 0 {
                tokio::time::sleep(self.config.inter_job_delay).await;
            }
            summary.processed += 1;

            match self.execute(&job).await {
                Attempt::Success => {
                    if !self.db.complete_job(user_id, &job.id, now_ms()).await? {
                        warn!(job_id = %job.id, "Completed job was no longer processing");
                    }
                    summary.succeeded += 1;
                    debug!(job_id = %job.id, kind = %job.kind, "Job succeeded");
                }
                Attempt::Failed(message) => {
                    let attempts = job.attempts + 1;
                    let will_retry = attempts < self.config.max_attempts;
                    self.db
                        .fail_job(user_id, &job.id, attempts, &message, will_retry, now_ms())
                        .await?;
                    summary.failed += 1;
                    warn!(
                        job_id = %job.id, kind = %job.kind, attempts, will_retry,
                        error = %message, "Job attempt failed"
                    );
                    summary.errors.push(JobFailure {
                        job_id: job.id.clone(),
                        kind: job.kind.clone(),
                        message,
                        will_retry,
                    });
                }
                Attempt::Unroutable(message) => {
                    // Permanent: no handler will ever exist for this row,
                    // so retrying would only burn the budget.
                    let attempts = job.attempts + 1;
                    self.db
                        .fail_job(user_id, &job.id, attempts, &message, false, now_ms())
                        .await?;
                    summary.failed += 1;
                    warn!(job_id = %job.id, kind = %job.kind, error = %message, "Job unroutable");
                    summary.errors.push(JobFailure {
                        job_id: job.id.clone(),
                        kind: job.kind.clone(),
                        message,
                        will_retry: false,
                    });
                }
            }
        }

        info!(
            user_id = %user_id,
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Runner pass complete"
        );
        Ok(summary)
    }

    /// Dispatch and execute one claimed job under the timeout guard.
    async fn execute(&self, job: &Job) -> Attempt {
        let handler = match job.parsed_kind().map(|k| self.registry.get(k)) {
            Some(Some(handler)) => handler,
            Some(None) => {
                return Attempt::Unroutable(format!("no handler registered for kind '{}'", job.kind))
            }
            None => return Attempt::Unroutable(format!("unknown job kind '{}'", job.kind)),
        };

        match timeout(self.config.handler_timeout, handler.run(job)).await {
            Ok(Ok(())) => Attempt::Success,
            Ok(Err(e)) => Attempt::Failed(e.to_string()),
            // The external call may still complete and have side
            // effects; this is the accepted bounded race of dropping a
            // timed-out attempt rather than propagating cancellation.
            Err(_) => Attempt::Failed(format!(
                "handler timed out after {}s",
                self.config.handler_timeout.as_secs()
            )),
        }
    }
}
