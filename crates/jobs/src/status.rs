// crates/jobs/src/status.rs
//! Read-only status aggregation over the job store.
//!
//! [`comprehensive_status`] must never fail: dashboards poll it, so an
//! internal error degrades to a fully-populated zeroed payload with
//! `critical` health and an explanatory issue instead of a 500.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::error;

use rolo_db::{now_ms, Database, DbResult, FreshnessCounts, Job, JobKind, StatusCounts};

use crate::config::StatusConfig;

/// Flags for one status query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOptions {
    #[serde(default)]
    pub include_history: bool,
    #[serde(default)]
    pub include_freshness: bool,
    #[serde(default)]
    pub batch_id: Option<String>,
}

/// A pending or stuck job annotated with its age.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgedJob {
    #[serde(flatten)]
    pub job: Job,
    pub age_minutes: i64,
}

/// ETA over the pending queue, from a static per-kind duration heuristic.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedCompletion {
    pub pending_count: i64,
    pub estimated_seconds: i64,
    /// Epoch ms; absent when nothing is pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Critical,
    Warning,
    Good,
    Excellent,
}

/// Derived 0–100 health score with its categorical status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub score: i64,
    pub status: HealthLevel,
    pub issues: Vec<String>,
}

/// Raw-vs-processed backlog for one pipeline stage.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageFreshness {
    pub total: i64,
    pub processed: i64,
    pub backlog_pct: f64,
}

impl From<FreshnessCounts> for StageFreshness {
    fn from(c: FreshnessCounts) -> Self {
        let backlog_pct = if c.total > 0 {
            ((c.total - c.processed) as f64 / c.total as f64) * 100.0
        } else {
            0.0
        };
        Self {
            total: c.total,
            processed: c.processed,
            backlog_pct,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFreshness {
    pub normalization: StageFreshness,
    pub embedding: StageFreshness,
    pub insight: StageFreshness,
}

/// Everything a dashboard needs about one user's job queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveStatus {
    pub status_counts: StatusCounts,
    pub kind_counts: BTreeMap<String, i64>,
    pub pending_jobs: Vec<AgedJob>,
    pub stuck_jobs: Vec<AgedJob>,
    pub estimated_completion: EstimatedCompletion,
    pub health: Health,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<Job>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_freshness: Option<DataFreshness>,
    pub generated_at: i64,
}

/// Static duration heuristic (seconds) per job kind, for the ETA sum.
/// Sync kinds dominate; normalization is per-item cheap.
fn estimated_duration_secs(kind: &str) -> i64 {
    match kind.parse::<JobKind>() {
        Ok(JobKind::SyncGmail) => 120,
        Ok(JobKind::SyncCalendar) => 90,
        Ok(JobKind::NormalizeEmail) => 5,
        Ok(JobKind::NormalizeEvent) => 5,
        Ok(JobKind::GenerateEmbedding) => 15,
        Ok(JobKind::GenerateInsight) => 45,
        Err(()) => 30,
    }
}

/// Score health from the aggregates.
///
/// Starts at 100 and deducts: up to 40 proportional to the terminal
/// failure ratio, 20 per stuck job, 15 when more than half the queue
/// is backlog, and 5 per recent failure beyond the third.
fn score_health(counts: &StatusCounts, stuck_count: usize, recent_failures: i64) -> Health {
    let mut score = 100.0_f64;
    let mut issues = Vec::new();

    if counts.total > 0 && counts.error > 0 {
        let failure_ratio = counts.error as f64 / counts.total as f64;
        score -= 40.0 * failure_ratio;
        issues.push(format!(
            "{} of {} jobs ended in error",
            counts.error, counts.total
        ));
    }

    if stuck_count > 0 {
        score -= 20.0 * stuck_count as f64;
        issues.push(format!(
            "{} job(s) stuck in processing — a previous run may have crashed",
            stuck_count
        ));
    }

    if counts.total > 0 {
        let backlog = counts.queued + counts.retrying;
        let backlog_ratio = backlog as f64 / counts.total as f64;
        if backlog_ratio > 0.5 {
            score -= 15.0;
            issues.push(format!(
                "queue backlog at {:.0}% of all jobs",
                backlog_ratio * 100.0
            ));
        }
    }

    if recent_failures > 3 {
        score -= 5.0 * (recent_failures - 3) as f64;
        issues.push(format!("{} failures in the last hour", recent_failures));
    }

    let score = score.clamp(0.0, 100.0).round() as i64;
    let status = if score >= 90 {
        HealthLevel::Excellent
    } else if score >= 70 {
        HealthLevel::Good
    } else if score >= 50 {
        HealthLevel::Warning
    } else {
        HealthLevel::Critical
    };

    Health {
        score,
        status,
        issues,
    }
}

fn age_minutes(since: i64, now: i64) -> i64 {
    (now.saturating_sub(since)) / 60_000
}

/// Compute the full status payload for one user.
///
/// Never returns an error: any job-store failure is logged and
/// replaced by [`degraded_status`] so dependent UIs keep rendering.
pub async fn comprehensive_status(
    db: &Database,
    user_id: &str,
    opts: &StatusOptions,
    config: &StatusConfig,
) -> ComprehensiveStatus {
    match gather(db, user_id, opts, config).await {
        Ok(status) => status,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Status aggregation failed, returning degraded payload");
            degraded_status(&e.to_string())
        }
    }
}

async fn gather(
    db: &Database,
    user_id: &str,
    opts: &StatusOptions,
    config: &StatusConfig,
) -> DbResult<ComprehensiveStatus> {
    let now = now_ms();
    let batch_id = opts.batch_id.as_deref();

    let status_counts = db.job_status_counts(user_id, batch_id).await?;
    let kind_counts: BTreeMap<String, i64> = db
        .job_kind_counts(user_id, batch_id)
        .await?
        .into_iter()
        .collect();

    let pending = db
        .list_pending_jobs(user_id, batch_id, config.pending_limit)
        .await?;
    let estimated_seconds: i64 = pending
        .iter()
        .map(|j| estimated_duration_secs(&j.kind))
        .sum();
    let estimated_completion = EstimatedCompletion {
        pending_count: status_counts.queued + status_counts.retrying + status_counts.processing,
        estimated_seconds,
        eta: (!pending.is_empty()).then(|| now + estimated_seconds * 1000),
    };
    let pending_jobs: Vec<AgedJob> = pending
        .into_iter()
        .map(|job| AgedJob {
            age_minutes: age_minutes(job.created_at, now),
            job,
        })
        .collect();

    let stuck_cutoff = now - config.stuck_threshold.as_millis() as i64;
    let stuck_jobs: Vec<AgedJob> = db
        .list_stuck_jobs(user_id, stuck_cutoff)
        .await?
        .into_iter()
        .map(|job| AgedJob {
            age_minutes: age_minutes(job.updated_at, now),
            job,
        })
        .collect();

    let failure_window = now - config.recent_failure_window.as_millis() as i64;
    let recent_failures = db.count_recent_failures(user_id, failure_window).await?;

    let health = score_health(&status_counts, stuck_jobs.len(), recent_failures);

    let history = if opts.include_history {
        Some(
            db.list_recent_finished_jobs(user_id, batch_id, config.history_limit)
                .await?,
        )
    } else {
        None
    };

    let data_freshness = if opts.include_freshness {
        Some(DataFreshness {
            normalization: db.raw_item_freshness(user_id).await?.into(),
            embedding: db.artifact_embedding_freshness(user_id).await?.into(),
            insight: db.artifact_insight_freshness(user_id).await?.into(),
        })
    } else {
        None
    };

    Ok(ComprehensiveStatus {
        status_counts,
        kind_counts,
        pending_jobs,
        stuck_jobs,
        estimated_completion,
        health,
        history,
        data_freshness,
        generated_at: now,
    })
}

/// The safe fallback payload: all tallies zeroed, health critical.
fn degraded_status(reason: &str) -> ComprehensiveStatus {
    ComprehensiveStatus {
        status_counts: StatusCounts::default(),
        kind_counts: BTreeMap::new(),
        pending_jobs: Vec::new(),
        stuck_jobs: Vec::new(),
        estimated_completion: EstimatedCompletion::default(),
        health: Health {
            score: 0,
            status: HealthLevel::Critical,
            issues: vec![format!("status query failed: {}", reason)],
        },
        history: None,
        data_freshness: None,
        generated_at: now_ms(),
    }
}
