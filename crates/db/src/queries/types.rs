// crates/db/src/queries/types.rs
//! Persisted job types — the durable contract of the `jobs` table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed enumeration of job kinds.
///
/// Enqueue is typed, so new rows always carry one of these. Rows read
/// back keep the kind as raw text (`Job::kind`) so that a row written
/// by a newer schema never breaks a select; the runner treats text it
/// cannot parse as a permanent failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    SyncGmail,
    SyncCalendar,
    NormalizeEmail,
    NormalizeEvent,
    GenerateEmbedding,
    GenerateInsight,
}

impl JobKind {
    /// All kinds, in dispatch-registration order.
    pub const ALL: [JobKind; 6] = [
        JobKind::SyncGmail,
        JobKind::SyncCalendar,
        JobKind::NormalizeEmail,
        JobKind::NormalizeEvent,
        JobKind::GenerateEmbedding,
        JobKind::GenerateInsight,
    ];

    /// The wire/database representation, e.g. `sync-gmail`.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::SyncGmail => "sync-gmail",
            JobKind::SyncCalendar => "sync-calendar",
            JobKind::NormalizeEmail => "normalize-email",
            JobKind::NormalizeEvent => "normalize-event",
            JobKind::GenerateEmbedding => "generate-embedding",
            JobKind::GenerateInsight => "generate-insight",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or(())
    }
}

/// Lifecycle status of a job.
///
/// Transitions are `queued → processing → {done | queued | error}`;
/// `done` and `error` are terminal. A "retrying" job is simply
/// `queued` with `attempts > 0` — there is no separate stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    /// Terminal statuses never re-enter the queue.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the `jobs` table.
///
/// `payload` is opaque JSON text interpreted only by the handler for
/// the matching kind. Timestamps are epoch milliseconds; `updated_at`
/// is refreshed on every status write and doubles as the backoff
/// reference point for re-queued jobs.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub payload: String,
    pub status: JobStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub batch_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    /// Parse the stored kind text back into the closed enumeration.
    /// `None` means the row predates (or postdates) this binary's enum.
    pub fn parsed_kind(&self) -> Option<JobKind> {
        self.kind.parse().ok()
    }

    /// Whether this queued job is a retry of a previous failure.
    pub fn is_retrying(&self) -> bool {
        self.status == JobStatus::Queued && self.attempts > 0
    }
}
