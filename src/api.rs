//! External interface types and library functions (`spec.md` §6).
//!
//! No HTTP framework wiring lives here — routing is explicitly out of
//! scope. These are the request/response shapes and plain async
//! functions a thin router (or any other caller) would invoke directly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::atomizer::{self, KeywordRegistry};
use crate::config::Config;
use crate::error::{IngestError, RegistryError};
use crate::mirror::MirrorProjector;
use crate::model::{Atom, AtomKind, Edge, GithubRepoRecord, Provenance, RelationKind};
use crate::persistence::Backend;
use crate::registry::SourceRegistry;
use crate::remote_fetcher::{RateLimit, RemoteFetcher};
use crate::retrieval::RetrievalEngine;

#[derive(Clone, Debug, Deserialize)]
pub struct IngestRequest {
    pub content: String,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub buckets: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Success,
    Skipped,
}

#[derive(Clone, Debug, Serialize)]
pub struct IngestResponse {
    pub status: IngestStatus,
    pub id: String,
    pub message: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegisterGithubRepoRequest {
    pub url: String,
    pub bucket: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RegisterGithubRepoResponse {
    pub id: String,
    pub status: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct SyncGithubRepoResponse {
    pub status: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RemoveGithubRepoResponse {
    pub status: String,
    pub quarantined_atoms: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub budget: Option<usize>,
    pub tags: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResultDto {
    pub id: String,
    pub content: String,
    pub source_path: String,
    pub compound_id: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub tags: Vec<String>,
    pub timestamp: i64,
    pub score: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ErrorBody {
    pub error_code: String,
    pub message: String,
    pub detail: Option<String>,
}

impl From<&IngestError> for ErrorBody {
    fn from(err: &IngestError) -> Self {
        Self { error_code: err.error_code().to_string(), message: err.to_string(), detail: None }
    }
}

/// Attach caller-supplied tags to a freshly-atomized topology: one system
/// atom per tag, linked to the compound and every one of its molecules,
/// the same way path-derived system atoms are (`atomizer::tags::system_atoms`).
fn apply_explicit_tags(topology: &mut crate::model::Topology, tags: &[String]) {
    let Some(compound) = topology.compound.as_mut() else {
        return;
    };

    for raw_tag in tags {
        let label = if raw_tag.starts_with('#') { raw_tag.clone() } else { format!("#{raw_tag}") };
        let atom = Atom::new(label, AtomKind::System, 1.0);

        if !topology.atoms.iter().any(|a| a.id == atom.id) {
            topology.atoms.push(atom.clone());
        }
        if !compound.atom_ids.contains(&atom.id) {
            compound.atom_ids.push(atom.id.clone());
        }
        topology.edges.push(Edge {
            source_id: compound.id.clone(),
            target_id: atom.id.clone(),
            relation: RelationKind::HasTag,
            weight: 1.0,
        });

        for molecule in &mut topology.molecules {
            if !molecule.atom_ids.contains(&atom.id) {
                molecule.atom_ids.push(atom.id.clone());
            }
            topology.edges.push(Edge {
                source_id: molecule.id.clone(),
                target_id: atom.id.clone(),
                relation: RelationKind::Tagged,
                weight: 1.0,
            });
        }
    }
}

/// `POST /v1/ingest`.
#[instrument(skip(req, backend, keyword_registry, config))]
pub async fn ingest_content(
    req: IngestRequest,
    backend: &Arc<dyn Backend>,
    keyword_registry: &KeywordRegistry,
    config: &Config,
    now_ms: i64,
) -> Result<IngestResponse, IngestError> {
    let registry = SourceRegistry::new(backend.clone());
    let content_hash = SourceRegistry::hash_content(req.content.as_bytes());

    if registry.is_unchanged(&req.source, &content_hash).await.map_err(IngestError::Registry)? {
        return Ok(IngestResponse {
            status: IngestStatus::Skipped,
            id: req.source.clone(),
            message: "content unchanged, ingest skipped".to_string(),
        });
    }

    if registry.get(&req.source).await.map_err(IngestError::Registry)?.is_some() {
        backend
            .quarantine_source(&req.source, config.quarantine_on_resync)
            .await
            .map_err(IngestError::Persist)?;
    }

    let mut topology = atomizer::atomize(
        req.content.as_bytes(),
        &req.source,
        Provenance::Internal,
        config.ingest_max_molecule_bytes,
        now_ms,
        keyword_registry,
    );

    if let Some(tags) = &req.tags {
        apply_explicit_tags(&mut topology, tags);
    }

    let Some(compound) = topology.compound.clone() else {
        return Ok(IngestResponse {
            status: IngestStatus::Skipped,
            id: req.source.clone(),
            message: "content sanitized to empty, nothing to ingest".to_string(),
        });
    };

    backend
        .upsert_topology(&topology, config.ingest_batch_size)
        .await
        .map_err(IngestError::Persist)?;

    registry
        .record_ingest(&req.source, &content_hash, topology.atoms.len() as u64, now_ms)
        .await
        .map_err(IngestError::Registry)?;

    if let Err(e) = MirrorProjector::new(backend.clone(), config.mirror_dir.clone()).project().await {
        tracing::warn!(source = %req.source, error = %e, "mirror projection failed after ingest");
    }

    Ok(IngestResponse { status: IngestStatus::Success, id: compound.id, message: "ingested".to_string() })
}

/// `POST /v1/github/repos`.
pub async fn register_github_repo(
    req: RegisterGithubRepoRequest,
    fetcher: &RemoteFetcher,
) -> Result<RegisterGithubRepoResponse, IngestError> {
    let record = fetcher.register_repo(&req.url, &req.bucket).await.map_err(IngestError::Fetch)?;
    Ok(RegisterGithubRepoResponse { id: record.id, status: "ingesting".to_string() })
}

/// `GET /v1/github/repos`.
pub async fn list_github_repos(backend: &Arc<dyn Backend>) -> Result<Vec<GithubRepoRecord>, RegistryError> {
    backend.list_github_repos().await
}

/// `POST /v1/github/repos/:id/sync`.
pub async fn sync_github_repo(
    id: &str,
    fetcher: &RemoteFetcher,
    token: Option<&str>,
) -> Result<SyncGithubRepoResponse, IngestError> {
    fetcher.sync_repo(id, token).await.map_err(IngestError::Fetch)?;
    Ok(SyncGithubRepoResponse { status: "syncing".to_string() })
}

/// `DELETE /v1/github/repos/:id`.
pub async fn remove_github_repo(id: &str, fetcher: &RemoteFetcher) -> Result<RemoveGithubRepoResponse, IngestError> {
    let quarantined = fetcher.remove_repo(id).await.map_err(IngestError::Fetch)?;
    Ok(RemoveGithubRepoResponse { status: "removed".to_string(), quarantined_atoms: quarantined })
}

/// `GET /v1/github/rate-limit`. Static placeholder until a live
/// `X-RateLimit-*` probe is wired to a real GitHub request.
#[must_use]
pub fn rate_limit(authenticated: bool) -> RateLimit {
    if authenticated {
        RateLimit { limit: 5000, remaining: 5000, reset_at: 0, authenticated: true }
    } else {
        RateLimit { limit: 60, remaining: 60, reset_at: 0, authenticated: false }
    }
}

/// `POST /v1/memory/search`.
pub async fn search(req: SearchRequest, engine: &RetrievalEngine, now_ms: i64) -> Vec<SearchResultDto> {
    let response = engine.search(&req.query, req.budget, now_ms).await;
    response
        .results
        .into_iter()
        .filter(|r| match &req.tags {
            Some(tags) if !tags.is_empty() => tags.iter().any(|t| r.tags.iter().any(|rt| rt.eq_ignore_ascii_case(t))),
            _ => true,
        })
        .map(|r| SearchResultDto {
            id: r.id,
            content: r.content,
            source_path: r.source_path,
            compound_id: r.compound_id,
            start_byte: r.start_byte,
            end_byte: r.end_byte,
            tags: r.tags,
            timestamp: r.timestamp_ms,
            score: r.score,
        })
        .collect()
}
