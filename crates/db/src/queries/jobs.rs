// crates/db/src/queries/jobs.rs
// Job lifecycle queries: enqueue, claim, complete, fail, purge.

use super::types::{Job, JobKind, JobStatus};
use crate::{now_ms, Database, DbResult};

/// Parameters for enqueueing a new job.
///
/// Idempotency (avoiding duplicate queued jobs for the same logical
/// work) is the caller's policy; nothing here deduplicates.
#[derive(Debug)]
pub struct NewJob<'a> {
    pub user_id: &'a str,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    pub batch_id: Option<&'a str>,
}

impl Database {
    // ========================================================================
    // Enqueue
    // ========================================================================

    /// Insert a new job row with `status = queued, attempts = 0`.
    /// Returns the generated job id.
    pub async fn enqueue_job(&self, new: NewJob<'_>) -> DbResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_ms();
        sqlx::query(
            r#"
            INSERT INTO jobs (id, user_id, kind, payload, status, attempts, batch_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 'queued', 0, ?5, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(new.user_id)
        .bind(new.kind.as_str())
        .bind(new.payload.to_string())
        .bind(new.batch_id)
        .bind(now)
        .execute(self.pool())
        .await?;

        tracing::debug!(job_id = %id, kind = %new.kind, user_id = %new.user_id, "Enqueued job");
        Ok(id)
    }

    // ========================================================================
    // Selection & claiming
    // ========================================================================

    /// Fetch a single job scoped to its owner.
    pub async fn get_job(&self, user_id: &str, id: &str) -> DbResult<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE id = ?1 AND user_id = ?2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(job)
    }

    /// Candidate jobs for one runner pass: the user's `queued` rows,
    /// most recent first, bounded by `limit`. Backoff eligibility is
    /// evaluated by the runner, not here.
    pub async fn list_queued_jobs(&self, user_id: &str, limit: i64) -> DbResult<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE user_id = ?1 AND status = 'queued'
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(jobs)
    }

    /// Atomically claim a queued job: `queued → processing`, guarded on
    /// the current status, owner, and the attempt count the caller
    /// observed when it selected the row.
    ///
    /// The attempts guard closes the select-to-claim window: if a rival
    /// invocation claimed, failed, and re-queued the row in between,
    /// its attempt count moved on and the stale claim matches nothing —
    /// so the re-queued row keeps its freshly armed backoff window and
    /// `attempts` stays monotonic.
    ///
    /// Returns `false` when zero rows were affected, meaning a
    /// concurrent invocation won the claim (or the row left `queued`).
    /// This conditional update is the sole synchronization primitive of
    /// the runner; losing the race is not an error.
    pub async fn claim_job(
        &self,
        user_id: &str,
        id: &str,
        attempts: i64,
        now: i64,
    ) -> DbResult<bool> {
        let affected = sqlx::query(
            r#"
            UPDATE jobs SET status = 'processing', updated_at = ?1
            WHERE id = ?2 AND user_id = ?3 AND status = 'queued' AND attempts = ?4
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(user_id)
        .bind(attempts)
        .execute(self.pool())
        .await?
        .rows_affected();
        Ok(affected == 1)
    }

    // ========================================================================
    // Terminal / retry writes
    // ========================================================================

    /// Mark a claimed job `done`. Guarded on `processing` so a stray
    /// call can never resurrect a terminal row.
    pub async fn complete_job(&self, user_id: &str, id: &str, now: i64) -> DbResult<bool> {
        let affected = sqlx::query(
            r#"
            UPDATE jobs SET status = 'done', last_error = NULL, updated_at = ?1
            WHERE id = ?2 AND user_id = ?3 AND status = 'processing'
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(self.pool())
        .await?
        .rows_affected();
        Ok(affected == 1)
    }

    /// Record a failed attempt on a claimed job.
    ///
    /// With `will_retry` the row returns to `queued` with `updated_at`
    /// refreshed, which arms the backoff window for the next pass.
    /// Otherwise the row becomes terminal `error`.
    pub async fn fail_job(
        &self,
        user_id: &str,
        id: &str,
        attempts: i64,
        error: &str,
        will_retry: bool,
        now: i64,
    ) -> DbResult<bool> {
        let status = if will_retry {
            JobStatus::Queued
        } else {
            JobStatus::Error
        };
        let affected = sqlx::query(
            r#"
            UPDATE jobs SET status = ?1, attempts = ?2, last_error = ?3, updated_at = ?4
            WHERE id = ?5 AND user_id = ?6 AND status = 'processing'
            "#,
        )
        .bind(status)
        .bind(attempts)
        .bind(error)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(self.pool())
        .await?
        .rows_affected();
        Ok(affected == 1)
    }

    // ========================================================================
    // Retention
    // ========================================================================

    /// Delete terminal (`done`/`error`) rows last touched before
    /// `cutoff` (epoch ms). Returns the number of rows removed.
    pub async fn purge_finished_jobs(&self, user_id: &str, cutoff: i64) -> DbResult<u64> {
        let purged = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE user_id = ?1 AND status IN ('done', 'error') AND updated_at < ?2
            "#,
        )
        .bind(user_id)
        .bind(cutoff)
        .execute(self.pool())
        .await?
        .rows_affected();

        if purged > 0 {
            tracing::info!(user_id = %user_id, purged, "Purged finished jobs");
        }
        Ok(purged)
    }
}
