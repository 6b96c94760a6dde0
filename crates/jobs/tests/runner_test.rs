// crates/jobs/tests/runner_test.rs
//! End-to-end runner scenarios against an in-memory database.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use rolo_db::{now_ms, Database, Job, JobKind, JobStatus, NewJob};
use rolo_jobs::{HandlerRegistry, JobHandler, Runner, RunnerConfig};

/// Handler that succeeds and counts its executions.
struct CountingHandler {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingHandler {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobHandler for CountingHandler {
    async fn run(&self, _job: &Job) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}

/// Handler that always fails with a fixed message.
struct FailingHandler(&'static str);

#[async_trait]
impl JobHandler for FailingHandler {
    async fn run(&self, _job: &Job) -> anyhow::Result<()> {
        anyhow::bail!("{}", self.0)
    }
}

/// Config with no pacing and no backoff, for fast deterministic tests.
fn fast_config() -> RunnerConfig {
    RunnerConfig {
        base_delay: Duration::ZERO,
        inter_job_delay: Duration::ZERO,
        ..RunnerConfig::default()
    }
}

async fn test_db() -> Database {
    Database::new_in_memory().await.expect("in-memory DB")
}

async fn enqueue(db: &Database, user: &str, kind: JobKind) -> String {
    db.enqueue_job(NewJob {
        user_id: user,
        kind,
        payload: serde_json::json!({}),
        batch_id: None,
    })
    .await
    .expect("enqueue should succeed")
}

#[tokio::test]
async fn test_batch_of_three_all_succeed() {
    let db = test_db().await;
    let handler = Arc::new(CountingHandler::new());
    let mut registry = HandlerRegistry::new();
    for kind in [JobKind::SyncGmail, JobKind::GenerateEmbedding, JobKind::NormalizeEvent] {
        registry.register(kind, handler.clone());
    }
    let runner = Runner::new(db.clone(), Arc::new(registry), fast_config());

    let ids = [
        enqueue(&db, "u1", JobKind::SyncGmail).await,
        enqueue(&db, "u1", JobKind::GenerateEmbedding).await,
        enqueue(&db, "u1", JobKind::NormalizeEvent).await,
    ];

    let summary = runner.run_pending("u1").await.unwrap();
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);
    assert!(summary.errors.is_empty());
    assert_eq!(handler.count(), 3);

    for id in &ids {
        let job = db.get_job("u1", id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.attempts, 0);
    }
}

#[tokio::test]
async fn test_failure_requeues_with_error_message() {
    let db = test_db().await;
    let mut registry = HandlerRegistry::new();
    registry.register(JobKind::SyncGmail, Arc::new(FailingHandler("rate limited")));
    let runner = Runner::new(db.clone(), Arc::new(registry), fast_config());

    let id = enqueue(&db, "u1", JobKind::SyncGmail).await;
    let summary = runner.run_pending("u1").await.unwrap();

    assert_eq!((summary.processed, summary.failed), (1, 1));
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].message, "rate limited");
    assert!(summary.errors[0].will_retry);

    let job = db.get_job("u1", &id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.last_error.as_deref(), Some("rate limited"));
}

#[tokio::test]
async fn test_retry_exhaustion_ends_in_terminal_error() {
    let db = test_db().await;
    let mut registry = HandlerRegistry::new();
    registry.register(JobKind::SyncGmail, Arc::new(FailingHandler("rate limited")));
    let config = fast_config();
    let max_attempts = config.max_attempts;
    let runner = Runner::new(db.clone(), Arc::new(registry), config);

    let id = enqueue(&db, "u1", JobKind::SyncGmail).await;

    // With zero backoff every pass retries immediately.
    for expected_attempts in 1..=max_attempts {
        let summary = runner.run_pending("u1").await.unwrap();
        assert_eq!(summary.processed, 1);
        let job = db.get_job("u1", &id).await.unwrap().unwrap();
        assert_eq!(job.attempts, expected_attempts);
        if expected_attempts < max_attempts {
            assert_eq!(job.status, JobStatus::Queued);
        } else {
            assert_eq!(job.status, JobStatus::Error);
        }
    }

    // Terminal: further passes find nothing, attempts never exceed the cap.
    let summary = runner.run_pending("u1").await.unwrap();
    assert_eq!(summary.processed, 0);
    let job = db.get_job("u1", &id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.attempts, max_attempts);
    assert_eq!(job.last_error.as_deref(), Some("rate limited"));
}

#[tokio::test]
async fn test_backoff_window_skips_fresh_failure() {
    let db = test_db().await;
    let mut registry = HandlerRegistry::new();
    registry.register(JobKind::SyncGmail, Arc::new(FailingHandler("boom")));
    let config = RunnerConfig {
        base_delay: Duration::from_secs(3600),
        inter_job_delay: Duration::ZERO,
        ..RunnerConfig::default()
    };
    let runner = Runner::new(db.clone(), Arc::new(registry), config);

    let id = enqueue(&db, "u1", JobKind::SyncGmail).await;
    let first = runner.run_pending("u1").await.unwrap();
    assert_eq!(first.processed, 1);

    // Immediately re-run: the job sits inside its hour-long window.
    let second = runner.run_pending("u1").await.unwrap();
    assert_eq!(second.processed, 0);
    let job = db.get_job("u1", &id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 1);

    // Age the failure past the window; the next pass picks it up.
    sqlx::query("UPDATE jobs SET updated_at = ?1 WHERE id = ?2")
        .bind(now_ms() - 2 * 3600 * 1000)
        .bind(&id)
        .execute(db.pool())
        .await
        .unwrap();
    let third = runner.run_pending("u1").await.unwrap();
    assert_eq!(third.processed, 1);
}

#[tokio::test]
async fn test_unknown_kind_is_permanent_after_one_attempt() {
    let db = test_db().await;
    let handler = Arc::new(CountingHandler::new());
    let mut registry = HandlerRegistry::new();
    registry.register(JobKind::SyncGmail, handler.clone());
    let runner = Runner::new(db.clone(), Arc::new(registry), fast_config());

    // A row written by some other schema version: kind text outside the enum.
    let now = now_ms();
    sqlx::query(
        r#"
        INSERT INTO jobs (id, user_id, kind, payload, status, attempts, created_at, updated_at)
        VALUES ('j-unknown', 'u1', 'sync-linkedin', '{}', 'queued', 0, ?1, ?1)
        "#,
    )
    .bind(now)
    .execute(db.pool())
    .await
    .unwrap();

    let summary = runner.run_pending("u1").await.unwrap();
    assert_eq!((summary.processed, summary.failed), (1, 1));
    assert!(!summary.errors[0].will_retry);
    assert!(summary.errors[0].message.contains("unknown job kind"));

    let job = db.get_job("u1", "j-unknown").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.attempts, 1);
    assert_eq!(handler.count(), 0, "no handler may run for an unknown kind");

    // Never re-queued: the next pass leaves it terminal.
    let summary = runner.run_pending("u1").await.unwrap();
    assert_eq!(summary.processed, 0);
}

#[tokio::test]
async fn test_unregistered_kind_is_permanent() {
    let db = test_db().await;
    // Registry knows gmail only; calendar jobs are unroutable.
    let mut registry = HandlerRegistry::new();
    registry.register(JobKind::SyncGmail, Arc::new(CountingHandler::new()));
    let runner = Runner::new(db.clone(), Arc::new(registry), fast_config());

    let id = enqueue(&db, "u1", JobKind::SyncCalendar).await;
    let summary = runner.run_pending("u1").await.unwrap();

    assert_eq!(summary.failed, 1);
    assert!(summary.errors[0].message.contains("no handler registered"));
    let job = db.get_job("u1", &id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.attempts, 1);
}

#[tokio::test]
async fn test_timeout_is_treated_as_failure() {
    let db = test_db().await;
    let mut registry = HandlerRegistry::new();
    registry.register(
        JobKind::GenerateInsight,
        Arc::new(CountingHandler::slow(Duration::from_secs(60))),
    );
    let config = RunnerConfig {
        handler_timeout: Duration::from_millis(50),
        ..fast_config()
    };
    let runner = Runner::new(db.clone(), Arc::new(registry), config);

    let id = enqueue(&db, "u1", JobKind::GenerateInsight).await;
    let summary = runner.run_pending("u1").await.unwrap();

    assert_eq!(summary.failed, 1);
    assert!(summary.errors[0].message.contains("timed out"));
    assert!(summary.errors[0].will_retry);

    let job = db.get_job("u1", &id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_one_failure_never_aborts_the_batch() {
    let db = test_db().await;
    let mut registry = HandlerRegistry::new();
    registry.register(JobKind::SyncGmail, Arc::new(FailingHandler("boom")));
    registry.register(JobKind::SyncCalendar, Arc::new(CountingHandler::new()));
    let runner = Runner::new(db.clone(), Arc::new(registry), fast_config());

    enqueue(&db, "u1", JobKind::SyncGmail).await;
    enqueue(&db, "u1", JobKind::SyncCalendar).await;

    let summary = runner.run_pending("u1").await.unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors.len(), 1);
}

#[tokio::test]
async fn test_runner_is_user_scoped() {
    let db = test_db().await;
    let handler = Arc::new(CountingHandler::new());
    let mut registry = HandlerRegistry::new();
    registry.register(JobKind::SyncGmail, handler.clone());
    let runner = Runner::new(db.clone(), Arc::new(registry), fast_config());

    let other = enqueue(&db, "u2", JobKind::SyncGmail).await;
    let summary = runner.run_pending("u1").await.unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(handler.count(), 0);
    let job = db.get_job("u2", &other).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
}

#[tokio::test]
async fn test_concurrent_invocations_process_each_job_once() {
    let db = test_db().await;
    let handler = Arc::new(CountingHandler::slow(Duration::from_millis(30)));
    let mut registry = HandlerRegistry::new();
    registry.register(JobKind::GenerateEmbedding, handler.clone());
    let registry = Arc::new(registry);

    let runner_a = Runner::new(db.clone(), registry.clone(), fast_config());
    let runner_b = Runner::new(db.clone(), registry, fast_config());

    for _ in 0..4 {
        enqueue(&db, "u1", JobKind::GenerateEmbedding).await;
    }

    // Duplicate triggers: both invocations race over the same queue.
    let (a, b) = tokio::join!(runner_a.run_pending("u1"), runner_b.run_pending("u1"));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.processed + b.processed, 4, "claim races must not double-count");
    assert_eq!(a.succeeded + b.succeeded, 4);
    assert_eq!(handler.count(), 4, "each job executes exactly once");
}

#[tokio::test]
async fn test_batch_size_bounds_one_pass() {
    let db = test_db().await;
    let handler = Arc::new(CountingHandler::new());
    let mut registry = HandlerRegistry::new();
    registry.register(JobKind::NormalizeEmail, handler.clone());
    let config = RunnerConfig {
        batch_size: 2,
        ..fast_config()
    };
    let runner = Runner::new(db.clone(), Arc::new(registry), config);

    for _ in 0..5 {
        enqueue(&db, "u1", JobKind::NormalizeEmail).await;
    }

    let summary = runner.run_pending("u1").await.unwrap();
    assert_eq!(summary.processed, 2);

    // Remaining jobs stay queued for future passes.
    let left = db.list_queued_jobs("u1", 100).await.unwrap();
    assert_eq!(left.len(), 3);
}
