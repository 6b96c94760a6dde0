// crates/server/src/main.rs
//! Rolo job-queue server binary.
//!
//! Opens the SQLite job store, builds the handler registry, and serves
//! the queue API over HTTP. Job execution only happens when a client
//! triggers a runner pass, so the binary has no background loops.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rolo_db::Database;
use rolo_jobs::HandlerRegistry;
use rolo_server::{create_app, AppState};
use tracing_subscriber::EnvFilter;

/// Default port for the server.
const DEFAULT_PORT: u16 = 47310;

#[derive(Debug, Parser)]
#[command(name = "rolo-server", version, about = "Per-user background job queue server")]
struct Args {
    /// Port to listen on (also honors the PORT environment variable).
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Path to the SQLite database file. Defaults to the platform data
    /// directory (e.g. ~/.local/share/rolo/rolo.db).
    #[arg(long)]
    db_path: Option<PathBuf>,
}

/// Build the handler registry for this binary.
///
/// The sync, normalize, and enrichment handlers live in their own
/// integration crates and are registered here as they land. A kind with
/// no handler fails permanently at dispatch rather than at enqueue, so
/// an incomplete registry degrades loudly instead of silently.
fn build_registry() -> Arc<HandlerRegistry> {
    let registry = HandlerRegistry::new();
    if registry.is_empty() {
        tracing::warn!("No job handlers registered; enqueued jobs will fail at dispatch");
    }
    Arc::new(registry)
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let db = match &args.db_path {
        Some(path) => Database::new(path).await?,
        None => Database::open_default().await?,
    };

    let state = AppState::new(db, build_registry());
    let app = create_app(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("rolo-server v{} listening on http://{}", env!("CARGO_PKG_VERSION"), addr);

    axum::serve(listener, app).await?;

    Ok(())
}
