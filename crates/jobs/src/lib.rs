// crates/jobs/src/lib.rs
//! Background job scheduling core for rolo.
//!
//! Provides:
//! - `Runner` — claims and executes one bounded batch of a user's due
//!   jobs per invocation, with retry, exponential backoff, and per-job
//!   failure isolation
//! - `HandlerRegistry` / `JobHandler` — kind-to-handler dispatch
//! - `comprehensive_status` — read-only status aggregation with a
//!   derived health score
//!
//! There is no persistent worker loop: callers (a periodic trigger or
//! an explicit API call) invoke the runner on demand, and the atomic
//! claim in the job store makes concurrent invocations safe.

pub mod backoff;
pub mod config;
pub mod dispatch;
pub mod runner;
pub mod status;

pub use config::{RunnerConfig, StatusConfig};
pub use dispatch::{HandlerRegistry, JobHandler};
pub use runner::{JobFailure, RunSummary, Runner};
pub use status::{comprehensive_status, ComprehensiveStatus, HealthLevel, StatusOptions};
