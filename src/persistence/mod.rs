//! The Persistence Layer: idempotent upsert with read-after-write
//! verification (`spec.md` §4.C), behind a [`Backend`] trait so the rest
//! of the crate depends on an interface rather than a SQL dialect.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::QuarantinePolicy;
use crate::error::{PersistError, RegistryError, RetrievalError};
use crate::model::{GithubRepoRecord, SourceRecord, Topology};

pub use sqlite::SqliteBackend;

/// A molecule as read back for retrieval — the "legacy atoms retrieval
/// table" projection named in `spec.md` §4.C, carrying everything a
/// caller needs to rehydrate context without a Molecule→Compound join.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoleculeRecord {
    pub id: String,
    pub content: String,
    pub source_path: String,
    pub timestamp_ms: i64,
    pub signature: u64,
    pub provenance: String,
    pub tags: Vec<String>,
    pub compound_id: String,
    pub start_byte: usize,
    pub end_byte: usize,
}

/// Storage operations the rest of the crate depends on. Implementations
/// must honor the Ghost Data Protocol: every write is followed by a
/// verification read before the call returns successfully.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Durably write a complete topology in batches of `batch_size`,
    /// verifying each batch by reading back its ids.
    async fn upsert_topology(&self, topology: &Topology, batch_size: usize) -> Result<(), PersistError>;

    /// Apply the configured quarantine policy to every molecule/atom
    /// previously written for `source_path` (invariant 5).
    async fn quarantine_source(&self, source_path: &str, policy: QuarantinePolicy) -> Result<(), PersistError>;

    /// Apply the configured quarantine policy to every molecule/compound
    /// whose `source_path` starts with `prefix` (repo-wide quarantine for
    /// the Remote Fetcher, `spec.md` §4.F). Returns the number of
    /// molecules affected.
    async fn quarantine_prefix(&self, prefix: &str, policy: QuarantinePolicy) -> Result<u64, PersistError>;

    /// Look up the registered content-hash for `path`, if any.
    async fn get_source(&self, path: &str) -> Result<Option<SourceRecord>, RegistryError>;

    /// `INSERT … ON CONFLICT(path) DO UPDATE` the source record.
    async fn upsert_source(&self, record: &SourceRecord) -> Result<(), RegistryError>;

    /// Paths registered in the source table but absent from
    /// `seen_paths` — candidates for administrative pruning.
    async fn stale_paths(&self, seen_paths: &[String]) -> Result<Vec<String>, RegistryError>;

    /// Full-text search over molecule content, 2× boosted when a query
    /// term also appears in the molecule's tags (Anchor phase).
    async fn search_anchor(&self, terms: &[String], limit: usize) -> Result<Vec<(MoleculeRecord, f64)>, RetrievalError>;

    /// Molecules carrying any of `tags`, excluding `exclude_ids`
    /// (Neighbor-Walk phase).
    async fn search_by_tags(
        &self,
        tags: &[String],
        exclude_ids: &[String],
        limit: usize,
    ) -> Result<Vec<MoleculeRecord>, RetrievalError>;

    /// Every molecule currently stored, for the Mirror Projector's
    /// wipe-and-re-emit pass.
    async fn all_molecules(&self) -> Result<Vec<MoleculeRecord>, RetrievalError>;

    /// `INSERT … ON CONFLICT(id) DO UPDATE` a tracked GitHub repo row
    /// (supplemental, backs `GET/POST /v1/github/repos`).
    async fn upsert_github_repo(&self, record: &GithubRepoRecord) -> Result<(), RegistryError>;

    async fn get_github_repo(&self, id: &str) -> Result<Option<GithubRepoRecord>, RegistryError>;

    async fn list_github_repos(&self) -> Result<Vec<GithubRepoRecord>, RegistryError>;

    async fn delete_github_repo(&self, id: &str) -> Result<(), RegistryError>;
}
