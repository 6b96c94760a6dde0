// crates/jobs/src/dispatch.rs
//! Kind-to-handler dispatch.
//!
//! A pure routing table: exactly one handler per [`JobKind`]. Business
//! logic (what a `sync-gmail` job actually does) lives in the handler
//! implementations registered by the embedding application; this
//! module performs no work of its own.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rolo_db::{Job, JobKind};

/// Capability interface implemented per job kind.
///
/// The handler receives the claimed job row (owner and payload
/// included) and signals failure by returning an error. Errors are
/// retryable up to the attempt ceiling; an unregistered kind is a
/// permanent failure before the handler is ever consulted.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: &Job) -> anyhow::Result<()>;
}

/// Static routing table mapping job kind to handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for a kind, replacing any previous one.
    pub fn register(&mut self, kind: JobKind, handler: Arc<dyn JobHandler>) -> &mut Self {
        tracing::debug!(kind = %kind, "Registered job handler");
        self.handlers.insert(kind, handler);
        self
    }

    /// Resolve the handler for a kind. `None` means the kind is
    /// unroutable and the job must fail permanently.
    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
