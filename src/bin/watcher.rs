//! `atom-watcher`: stand-alone filesystem watcher process.
//!
//! Watches the directories named on the command line (or `./inbox` if
//! none are given), dispatching every quiescent file through the
//! Sanitizer → Atomizer → Persistence pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use atom_engine::config::Config;
use atom_engine::persistence::{Backend, SqliteBackend};
use atom_engine::Engine;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let db_path = std::env::var("ATOM_DB_PATH").unwrap_or_else(|_| "atom-engine.db".to_string());
    let database_url = format!("sqlite://{db_path}?mode=rwc");
    let backend: Arc<dyn Backend> = Arc::new(SqliteBackend::connect(&database_url).await?);
    let engine = Engine::new(backend, config);

    let dirs: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    let dirs = if dirs.is_empty() { vec![PathBuf::from("inbox")] } else { dirs };
    for dir in &dirs {
        std::fs::create_dir_all(dir)?;
    }

    tracing::info!(?dirs, "starting watcher");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(());
    });

    engine.watcher().run(dirs, shutdown_rx).await?;
    Ok(())
}
