//! The Source Registry: `(path → content-hash)` change detection
//! (`spec.md` §4.D).
//!
//! Grounded on the teacher's `ResumeTracker` (an `Arc`-shared tracker
//! consulted before expensive work, updated after it succeeds) but backed
//! by the Persistence Layer's `sources` table instead of a JSON file, so
//! the registry survives process restarts and stays consistent with the
//! graph it describes.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::error::RegistryError;
use crate::model::SourceRecord;
use crate::persistence::Backend;

/// Owned by the Watcher (`spec.md` §5): external actors mutate it only
/// through the ingest API, never directly.
pub struct SourceRegistry {
    backend: Arc<dyn Backend>,
}

impl SourceRegistry {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// SHA-256 content hash used for change detection.
    #[must_use]
    pub fn hash_content(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// `true` if `path` is registered with exactly `content_hash` — the
    /// short-circuit that lets the Watcher skip re-ingesting unchanged
    /// files.
    #[instrument(skip(self, content_hash))]
    pub async fn is_unchanged(&self, path: &str, content_hash: &str) -> Result<bool, RegistryError> {
        Ok(self
            .backend
            .get_source(path)
            .await?
            .is_some_and(|record| record.content_hash == content_hash))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, path: &str) -> Result<Option<SourceRecord>, RegistryError> {
        self.backend.get_source(path).await
    }

    /// Record a successful ingest: `INSERT … ON CONFLICT(path) DO UPDATE`.
    #[instrument(skip(self))]
    pub async fn record_ingest(&self, path: &str, content_hash: &str, total_atoms: u64, ingested_at_ms: i64) -> Result<(), RegistryError> {
        self.backend
            .upsert_source(&SourceRecord {
                path: path.to_string(),
                content_hash: content_hash.to_string(),
                total_atoms,
                last_ingest_ms: ingested_at_ms,
            })
            .await
    }

    /// Paths registered but absent from the most recent full directory
    /// walk — candidates for an administrative prune (supplemental, see
    /// `SPEC_FULL.md` §4.D).
    #[instrument(skip(self, seen_paths))]
    pub async fn stale_paths(&self, seen_paths: &[String]) -> Result<Vec<String>, RegistryError> {
        self.backend.stale_paths(seen_paths).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SqliteBackend;

    #[tokio::test]
    async fn unchanged_short_circuits_on_matching_hash() {
        let backend: Arc<dyn Backend> = Arc::new(SqliteBackend::connect_in_memory().await.unwrap());
        let registry = SourceRegistry::new(backend);

        let hash = SourceRegistry::hash_content(b"hello world");
        assert!(!registry.is_unchanged("inbox/a.md", &hash).await.unwrap());

        registry.record_ingest("inbox/a.md", &hash, 2, 1000).await.unwrap();
        assert!(registry.is_unchanged("inbox/a.md", &hash).await.unwrap());
        assert!(!registry.is_unchanged("inbox/a.md", "different-hash").await.unwrap());
    }

    #[tokio::test]
    async fn stale_paths_excludes_seen() {
        let backend: Arc<dyn Backend> = Arc::new(SqliteBackend::connect_in_memory().await.unwrap());
        let registry = SourceRegistry::new(backend);
        registry.record_ingest("inbox/a.md", "h1", 1, 0).await.unwrap();
        registry.record_ingest("inbox/b.md", "h2", 1, 0).await.unwrap();

        let stale = registry.stale_paths(&["inbox/a.md".to_string()]).await.unwrap();
        assert_eq!(stale, vec!["inbox/b.md".to_string()]);
    }
}
