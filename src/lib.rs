//! A local-first knowledge ingestion and retrieval engine.
//!
//! ```text
//!                 ┌─────────────┐
//!   inbox/*  ───▶  │   Watcher   │ ───┐
//!                 └─────────────┘    │
//!   POST /v1/ingest ──────────────────┤
//!                                     ▼
//!                              ┌─────────────┐      ┌────────────┐
//!   github repo sync ───────▶  │  Sanitizer  │ ───▶ │  Atomizer  │
//!                              └─────────────┘      └──────┬─────┘
//!                                                           ▼
//!                              ┌─────────────┐      ┌──────────────┐
//!   GET  /v1/memory/search ◀── │  Retrieval  │ ◀──  │ Persistence  │
//!                              └─────────────┘      └──────┬───────┘
//!                                                           ▼
//!                                                   ┌───────────────┐
//!                                                   │    Mirror     │
//!                                                   │  (filesystem) │
//!                                                   └───────────────┘
//! ```
//!
//! Every arrow above is a module in this crate: [`watcher`] and
//! [`remote_fetcher`] are the two ingest entry points, [`sanitizer`] and
//! [`atomizer`] turn raw bytes into a [`model::Topology`], [`persistence`]
//! durably stores it behind a [`persistence::Backend`] trait object,
//! [`registry`] tracks what's already been seen, [`retrieval`] answers
//! search queries over what's stored, and [`mirror`] periodically dumps
//! the whole graph to readable Markdown. [`api`] is the thin DTO layer
//! a router would sit in front of.

pub mod api;
pub mod atomizer;
pub mod config;
pub mod error;
pub mod mirror;
pub mod model;
pub mod persistence;
pub mod registry;
pub mod remote_fetcher;
pub mod retrieval;
pub mod sanitizer;
pub mod watcher;

pub use config::Config;
pub use error::IngestError;
pub use persistence::{Backend, SqliteBackend};

use std::sync::Arc;

use atomizer::KeywordRegistry;
use mirror::MirrorProjector;
use remote_fetcher::RemoteFetcher;
use retrieval::RetrievalEngine;
use watcher::Watcher;

/// Every long-lived component wired to a shared [`Backend`], built once at
/// process startup and handed to whichever binary or router needs it.
pub struct Engine {
    pub backend: Arc<dyn Backend>,
    pub keyword_registry: Arc<KeywordRegistry>,
    pub config: Config,
}

impl Engine {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, config: Config) -> Self {
        Self { backend, keyword_registry: Arc::new(KeywordRegistry::default()), config }
    }

    #[must_use]
    pub fn watcher(&self) -> Watcher {
        Watcher::new(self.backend.clone(), self.keyword_registry.clone(), self.config.clone())
    }

    #[must_use]
    pub fn remote_fetcher(&self) -> RemoteFetcher {
        RemoteFetcher::new(self.backend.clone(), self.keyword_registry.clone(), self.config.clone())
    }

    #[must_use]
    pub fn retrieval_engine(&self) -> RetrievalEngine {
        RetrievalEngine::new(self.backend.clone(), self.config.clone())
    }

    #[must_use]
    pub fn mirror_projector(&self, output_dir: impl Into<std::path::PathBuf>) -> MirrorProjector {
        MirrorProjector::new(self.backend.clone(), output_dir)
    }
}
