// crates/db/src/queries/mod.rs
//! Query methods on [`Database`](crate::Database), grouped by concern.

pub mod jobs;
pub mod stats;
pub mod types;
