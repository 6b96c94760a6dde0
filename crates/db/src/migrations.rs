/// Inline SQL migrations for the rolo database schema.
///
/// We use simple inline migrations rather than sqlx migration files
/// because the schema is small and self-contained.

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: jobs table — the durable job queue contract.
    // Timestamps are epoch milliseconds; updated_at doubles as the
    // backoff reference point for re-queued jobs.
    r#"
CREATE TABLE IF NOT EXISTS jobs (
    id         TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL,
    kind       TEXT NOT NULL,
    payload    TEXT NOT NULL DEFAULT '{}',
    status     TEXT NOT NULL DEFAULT 'queued'
               CHECK (status IN ('queued', 'processing', 'done', 'error')),
    attempts   INTEGER NOT NULL DEFAULT 0 CHECK (attempts >= 0),
    last_error TEXT,
    batch_id   TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#,
    // Migration 2: jobs indexes
    r#"CREATE INDEX IF NOT EXISTS idx_jobs_user_status ON jobs(user_id, status);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_jobs_user_batch ON jobs(user_id, batch_id);"#,
    r#"CREATE INDEX IF NOT EXISTS idx_jobs_created ON jobs(created_at DESC);"#,
    // Migration 3: raw_items — ingested-but-maybe-unprocessed rows
    // written by the sync handlers. Read here only for data freshness.
    r#"
CREATE TABLE IF NOT EXISTS raw_items (
    id            TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL,
    source        TEXT NOT NULL CHECK (source IN ('gmail', 'calendar')),
    created_at    INTEGER NOT NULL,
    normalized_at INTEGER
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_raw_items_user ON raw_items(user_id, source);"#,
    // Migration 4: artifacts — normalized records awaiting embedding
    // and insight generation. Read here only for data freshness.
    r#"
CREATE TABLE IF NOT EXISTS artifacts (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    kind        TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    embedded_at INTEGER,
    insight_at  INTEGER
);
"#,
    r#"CREATE INDEX IF NOT EXISTS idx_artifacts_user ON artifacts(user_id);"#,
];
