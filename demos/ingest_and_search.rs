//! End-to-end walkthrough: ingest a couple of notes, then search them.
//!
//! Run with `cargo run --example ingest_and_search`.

use std::sync::Arc;

use atom_engine::api::{self, IngestRequest, SearchRequest};
use atom_engine::persistence::{Backend, SqliteBackend};
use atom_engine::{Config, Engine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let backend: Arc<dyn Backend> = Arc::new(SqliteBackend::connect_in_memory().await?);
    let engine = Engine::new(backend.clone(), Config::default());

    let notes = [
        ("inbox/rust.md", "Rust's borrow checker enforces memory safety without a garbage collector."),
        ("inbox/sqlite.md", "SQLite with WAL mode handles concurrent readers well for local-first apps."),
    ];

    for (source, content) in notes {
        let req = IngestRequest {
            content: content.to_string(),
            source: source.to_string(),
            kind: None,
            buckets: None,
            tags: None,
        };
        let resp = api::ingest_content(req, &backend, &engine.keyword_registry, &engine.config, 0).await?;
        println!("ingested {source}: {:?} ({})", resp.status, resp.id);
    }

    let retrieval = engine.retrieval_engine();
    let results = api::search(
        SearchRequest { query: "borrow checker memory".to_string(), budget: None, tags: None },
        &retrieval,
        0,
    )
    .await;

    println!("\nsearch results:");
    for result in results {
        println!("  [{:.2}] {} — {}", result.score, result.source_path, result.content);
    }

    Ok(())
}
