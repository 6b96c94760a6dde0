// crates/db/src/queries/stats.rs
// Read-only aggregation queries for job status reporting.

use serde::Serialize;

use super::types::Job;
use crate::{Database, DbResult};

/// Per-status tallies for one user's jobs.
///
/// `retrying` is the UI-facing subset of `queued` with `attempts > 0`;
/// `queued` here counts only first-attempt rows so the two are disjoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub queued: i64,
    pub retrying: i64,
    pub processing: i64,
    pub done: i64,
    pub error: i64,
    pub total: i64,
}

/// Raw-vs-processed tallies for one pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessCounts {
    pub total: i64,
    pub processed: i64,
}

impl Database {
    // ========================================================================
    // Job tallies
    // ========================================================================

    /// Count the user's jobs per status, optionally scoped to a batch.
    pub async fn job_status_counts(
        &self,
        user_id: &str,
        batch_id: Option<&str>,
    ) -> DbResult<StatusCounts> {
        let (queued, retrying, processing, done, error, total): (i64, i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN status = 'queued' AND attempts = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'queued' AND attempts > 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'processing' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'error' THEN 1 ELSE 0 END), 0),
                    COUNT(*)
                FROM jobs
                WHERE user_id = ?1
                  AND (?2 IS NULL OR batch_id = ?2)
                "#,
            )
            .bind(user_id)
            .bind(batch_id)
            .fetch_one(self.pool())
            .await?;

        Ok(StatusCounts {
            queued,
            retrying,
            processing,
            done,
            error,
            total,
        })
    }

    /// Count the user's jobs per kind, optionally scoped to a batch.
    /// Kind is reported as stored text so unknown kinds still show up.
    pub async fn job_kind_counts(
        &self,
        user_id: &str,
        batch_id: Option<&str>,
    ) -> DbResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT kind, COUNT(*)
            FROM jobs
            WHERE user_id = ?1
              AND (?2 IS NULL OR batch_id = ?2)
            GROUP BY kind
            ORDER BY kind
            "#,
        )
        .bind(user_id)
        .bind(batch_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    // ========================================================================
    // Job lists
    // ========================================================================

    /// The user's `queued`/`processing` jobs, most recent first.
    pub async fn list_pending_jobs(
        &self,
        user_id: &str,
        batch_id: Option<&str>,
        limit: i64,
    ) -> DbResult<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE user_id = ?1
              AND status IN ('queued', 'processing')
              AND (?2 IS NULL OR batch_id = ?2)
            ORDER BY created_at DESC
            LIMIT ?3
            "#,
        )
        .bind(user_id)
        .bind(batch_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(jobs)
    }

    /// Jobs stuck in `processing`: last touched before `cutoff` (epoch
    /// ms). Flag-only; nothing here re-queues them.
    pub async fn list_stuck_jobs(&self, user_id: &str, cutoff: i64) -> DbResult<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE user_id = ?1 AND status = 'processing' AND updated_at < ?2
            ORDER BY updated_at ASC
            "#,
        )
        .bind(user_id)
        .bind(cutoff)
        .fetch_all(self.pool())
        .await?;
        Ok(jobs)
    }

    /// Recent terminal jobs, newest first (for the status history view).
    pub async fn list_recent_finished_jobs(
        &self,
        user_id: &str,
        batch_id: Option<&str>,
        limit: i64,
    ) -> DbResult<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE user_id = ?1
              AND status IN ('done', 'error')
              AND (?2 IS NULL OR batch_id = ?2)
            ORDER BY updated_at DESC
            LIMIT ?3
            "#,
        )
        .bind(user_id)
        .bind(batch_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(jobs)
    }

    /// Count jobs that recorded a failure since `since` (epoch ms).
    /// Covers both terminal errors and re-queued retries, which both
    /// carry `last_error`.
    pub async fn count_recent_failures(&self, user_id: &str, since: i64) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM jobs
            WHERE user_id = ?1 AND last_error IS NOT NULL AND updated_at >= ?2
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }

    // ========================================================================
    // Data freshness (raw ingest vs processed outputs)
    // ========================================================================

    /// Raw gmail/calendar items vs those already normalized.
    pub async fn raw_item_freshness(&self, user_id: &str) -> DbResult<FreshnessCounts> {
        let (total, processed): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN normalized_at IS NOT NULL THEN 1 ELSE 0 END), 0)
            FROM raw_items
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;
        Ok(FreshnessCounts { total, processed })
    }

    /// Normalized artifacts vs those with embeddings generated.
    pub async fn artifact_embedding_freshness(&self, user_id: &str) -> DbResult<FreshnessCounts> {
        let (total, processed): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN embedded_at IS NOT NULL THEN 1 ELSE 0 END), 0)
            FROM artifacts
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;
        Ok(FreshnessCounts { total, processed })
    }

    /// Normalized artifacts vs those with insights generated.
    pub async fn artifact_insight_freshness(&self, user_id: &str) -> DbResult<FreshnessCounts> {
        let (total, processed): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN insight_at IS NOT NULL THEN 1 ELSE 0 END), 0)
            FROM artifacts
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;
        Ok(FreshnessCounts { total, processed })
    }
}
