//! The Remote Fetcher: download-and-extract of GitHub repository tarballs
//! (`spec.md` §4.F).

use std::io::Read as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use flate2::read::GzDecoder;
use tracing::instrument;

use crate::atomizer::{self, KeywordRegistry};
use crate::config::Config;
use crate::error::FetchError;
use crate::mirror::MirrorProjector;
use crate::model::{GithubRepoRecord, GithubRepoStatus, Provenance};
use crate::persistence::Backend;
use crate::registry::SourceRegistry;

const DOWNLOAD_RETRY_BACKOFF: [Duration; 3] = [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)];
const PER_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_PAYLOAD_BYTES: usize = 1024;
const YIELD_EVERY_N_FILES: usize = 10;

const HARD_EXCLUDE_DIRS: &[&str] = &["node_modules/", ".git/", "dist/", "build/", "target/", "vendor/"];
const HARD_EXCLUDE_EXTENSIONS: &[&str] = &[
    "bin", "exe", "dll", "so", "dylib", "png", "jpg", "jpeg", "gif", "ico", "pdf", "woff", "woff2",
];
const HARD_EXCLUDE_FILENAMES: &[&str] = &["Cargo.lock", "package-lock.json", "yarn.lock", "poetry.lock"];

/// A GitHub repo URL decomposed into its parts.
#[derive(Clone, Debug, PartialEq)]
pub struct RepoCoordinates {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

/// Result of one sync cycle, mirroring the `sync_repo` contract in
/// `spec.md` §4.F.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncResult {
    pub files: u64,
    pub atoms: u64,
    pub molecules: u64,
    pub bytes: u64,
    pub duration_ms: u64,
}

/// GitHub API rate-limit snapshot backing `GET /v1/github/rate-limit`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RateLimit {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: i64,
    pub authenticated: bool,
}

/// Parse a GitHub repo URL into `(owner, repo, branch)`. Accepts plain
/// `https://github.com/{owner}/{repo}` (branch defaults to `main`) and
/// `.../tree/{branch}/...` forms.
pub fn parse_repo_url(url: &str) -> Result<RepoCoordinates, FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    if parsed.host_str() != Some("github.com") {
        return Err(FetchError::InvalidUrl(format!("not a github.com url: {url}")));
    }
    let segments: Vec<&str> = parsed.path_segments().map(Iterator::collect).unwrap_or_default();
    let (owner, repo) = match (segments.first(), segments.get(1)) {
        (Some(o), Some(r)) => (*o, r.trim_end_matches(".git")),
        _ => return Err(FetchError::InvalidUrl(format!("missing owner/repo in: {url}"))),
    };

    let branch = if segments.get(2) == Some(&"tree") {
        segments.get(3).map(|s| s.to_string()).unwrap_or_else(|| "main".to_string())
    } else {
        "main".to_string()
    };

    Ok(RepoCoordinates { owner: owner.to_string(), repo: repo.to_string(), branch })
}

/// `true` if `relpath` (forward-slash separated, relative to the repo
/// root) matches a hard-exclude rule.
#[must_use]
pub fn is_excluded(relpath: &str, extra_patterns: &[String]) -> bool {
    if HARD_EXCLUDE_DIRS.iter().any(|dir| relpath.contains(dir)) {
        return true;
    }
    let file_name = relpath.rsplit('/').next().unwrap_or(relpath);
    if HARD_EXCLUDE_FILENAMES.contains(&file_name) {
        return true;
    }
    if let Some(ext) = relpath.rsplit('.').next()
        && ext != relpath
        && HARD_EXCLUDE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
    {
        return true;
    }
    extra_patterns.iter().any(|pattern| glob_match(pattern, relpath))
}

fn glob_match(pattern: &str, path: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix('*') {
        return path.ends_with(suffix);
    }
    if let Some(prefix) = pattern.strip_suffix("/*") {
        return path.starts_with(prefix);
    }
    path == pattern
}

/// `true` if the first 8 KB contain a null byte (`spec.md` §4.F).
#[must_use]
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(8192).any(|&b| b == 0)
}

const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://codeload.github.com";

pub struct RemoteFetcher {
    client: reqwest::Client,
    backend: Arc<dyn Backend>,
    registry: Arc<SourceRegistry>,
    keyword_registry: Arc<KeywordRegistry>,
    mirror: MirrorProjector,
    config: Config,
    download_base_url: String,
}

impl RemoteFetcher {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, keyword_registry: Arc<KeywordRegistry>, config: Config) -> Self {
        let registry = Arc::new(SourceRegistry::new(backend.clone()));
        let mirror = MirrorProjector::new(backend.clone(), config.mirror_dir.clone());
        let client = reqwest::Client::builder()
            .timeout(PER_ATTEMPT_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self {
            client,
            backend,
            registry,
            keyword_registry,
            mirror,
            config,
            download_base_url: DEFAULT_DOWNLOAD_BASE_URL.to_string(),
        }
    }

    /// Override the tarball download host (tests, GitHub Enterprise
    /// deployments); defaults to `codeload.github.com`.
    #[must_use]
    pub fn with_download_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.download_base_url = base_url.into();
        self
    }

    /// Register a repo for sync (`POST /v1/github/repos`), returning the
    /// id the caller will poll/`sync`/`DELETE`.
    #[instrument(skip(self))]
    pub async fn register_repo(&self, url: &str, bucket: &str) -> Result<GithubRepoRecord, FetchError> {
        let coords = parse_repo_url(url)?;
        let id = format!("gh_{}_{}", coords.owner, coords.repo);
        let record = GithubRepoRecord {
            id,
            url: url.to_string(),
            bucket: bucket.to_string(),
            branch: coords.branch,
            status: GithubRepoStatus::Pending,
            total_files: 0,
            total_atoms: 0,
            last_error: None,
            last_synced_ms: None,
        };
        self.backend.upsert_github_repo(&record).await.map_err(FetchError::from)?;
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn remove_repo(&self, id: &str) -> Result<u64, FetchError> {
        let record = self.backend.get_github_repo(id).await.map_err(FetchError::from)?;
        let Some(record) = record else {
            return Ok(0);
        };
        let prefix = format!("github:{}/{}/", record.url_owner_repo().0, record.url_owner_repo().1);
        let quarantined = self.quarantine_prefix(&prefix).await?;
        self.backend.delete_github_repo(id).await.map_err(FetchError::from)?;
        Ok(quarantined)
    }

    /// Download, extract, and ingest every accepted file in the repo's
    /// tarball (`spec.md` §4.F contract).
    #[instrument(skip(self))]
    pub async fn sync_repo(&self, id: &str, token: Option<&str>) -> Result<SyncResult, FetchError> {
        let started = Instant::now();
        let mut record = self
            .backend
            .get_github_repo(id)
            .await
            .map_err(FetchError::from)?
            .ok_or_else(|| FetchError::InvalidPayload(format!("unknown repo id: {id}")))?;

        record.status = GithubRepoStatus::Ingesting;
        self.backend.upsert_github_repo(&record).await.map_err(FetchError::from)?;

        let (owner, repo) = record.url_owner_repo();
        let prefix = format!("github:{owner}/{repo}/");
        self.quarantine_prefix(&prefix).await?;

        let tarball = match self.download_tarball(&owner, &repo, &record.branch, token).await {
            Ok(bytes) => bytes,
            Err(e) => {
                record.status = GithubRepoStatus::Failed;
                record.last_error = Some(e.to_string());
                self.backend.upsert_github_repo(&record).await.map_err(FetchError::from)?;
                return Err(e);
            }
        };
        let total_bytes = tarball.len() as u64;

        let entries = extract_tarball(&tarball)?;

        let mut files = 0u64;
        let mut atoms = 0u64;
        let mut molecules = 0u64;

        for (i, (relpath, bytes)) in entries.into_iter().enumerate() {
            if is_excluded(&relpath, &self.config.github_exclude_patterns) || looks_binary(&bytes) {
                continue;
            }

            let source_path = format!("{prefix}{relpath}");
            let topology = atomizer::atomize(
                &bytes,
                &source_path,
                Provenance::External,
                self.config.ingest_max_molecule_bytes,
                record.last_synced_ms.unwrap_or(0),
                &self.keyword_registry,
            );
            if topology.compound.is_none() {
                continue;
            }

            if let Err(e) = self
                .backend
                .upsert_topology(&topology, self.config.ingest_batch_size)
                .await
            {
                tracing::warn!(path = %source_path, error = %e, "github file persist failed, skipping");
                continue;
            }

            let hash = SourceRegistry::hash_content(&bytes);
            let _ = self.registry.record_ingest(&source_path, &hash, topology.atoms.len() as u64, 0).await;

            files += 1;
            atoms += topology.atoms.len() as u64;
            molecules += topology.molecules.len() as u64;

            if i % YIELD_EVERY_N_FILES == 0 {
                tokio::task::yield_now().await;
            }
        }

        if let Err(e) = self.mirror.project().await {
            tracing::warn!(repo = id, error = %e, "mirror projection failed after github sync");
        }

        record.status = GithubRepoStatus::Synced;
        record.total_files = files;
        record.total_atoms = atoms;
        record.last_error = None;
        record.last_synced_ms = Some(chrono::Utc::now().timestamp_millis());
        self.backend.upsert_github_repo(&record).await.map_err(FetchError::from)?;

        Ok(SyncResult { files, atoms, molecules, bytes: total_bytes, duration_ms: started.elapsed().as_millis() as u64 })
    }

    async fn quarantine_prefix(&self, prefix: &str) -> Result<u64, FetchError> {
        self.backend
            .quarantine_prefix(prefix, self.config.quarantine_on_resync)
            .await
            .map_err(FetchError::from)
    }

    async fn download_tarball(&self, owner: &str, repo: &str, branch: &str, token: Option<&str>) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}/{owner}/{repo}/tar.gz/refs/heads/{branch}", self.download_base_url);

        let mut last_err = String::new();
        for (attempt, backoff) in std::iter::once(Duration::ZERO).chain(DOWNLOAD_RETRY_BACKOFF).enumerate() {
            if attempt > 0 {
                tokio::time::sleep(backoff).await;
            }

            let mut request = self.client.get(&url);
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    if response.status() == reqwest::StatusCode::FORBIDDEN || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let reset_at = response
                            .headers()
                            .get("x-ratelimit-reset")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0);
                        return Err(FetchError::RateLimited { reset_at });
                    }
                    let is_json = response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .is_some_and(|ct| ct.contains("application/json"));
                    match response.bytes().await {
                        Ok(bytes) if !is_json && bytes.len() >= MIN_PAYLOAD_BYTES => return Ok(bytes.to_vec()),
                        Ok(bytes) => last_err = format!("rejected payload ({} bytes, json={is_json})", bytes.len()),
                        Err(e) => last_err = e.to_string(),
                    }
                }
                Err(e) => last_err = e.to_string(),
            }
        }

        Err(FetchError::Download { attempts: (DOWNLOAD_RETRY_BACKOFF.len() + 1) as u32, message: last_err })
    }
}

impl From<crate::error::RegistryError> for FetchError {
    fn from(err: crate::error::RegistryError) -> Self {
        FetchError::Persist(crate::error::PersistError::Backend(err.to_string()))
    }
}

fn extract_tarball(tarball: &[u8]) -> Result<Vec<(String, Vec<u8>)>, FetchError> {
    let decoder = GzDecoder::new(tarball);
    let mut archive = tar::Archive::new(decoder);
    let mut entries = Vec::new();

    let tar_entries = archive.entries().map_err(|e| FetchError::Extract(e.to_string()))?;
    for entry in tar_entries {
        let mut entry = entry.map_err(|e| FetchError::Extract(e.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path().map_err(|e| FetchError::Extract(e.to_string()))?.to_path_buf();
        // The tarball root is "{repo}-{branch}/..."; strip that component.
        let relpath: String = path.components().skip(1).collect::<std::path::PathBuf>().to_string_lossy().replace('\\', "/");
        if relpath.is_empty() {
            continue;
        }
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).map_err(|e| FetchError::Extract(e.to_string()))?;
        entries.push((relpath, bytes));
    }
    Ok(entries)
}

impl GithubRepoRecord {
    fn url_owner_repo(&self) -> (String, String) {
        parse_repo_url(&self.url)
            .map(|c| (c.owner, c.repo))
            .unwrap_or_else(|_| ("unknown".to_string(), "unknown".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_repo_url() {
        let coords = parse_repo_url("https://github.com/rust-lang/rust").unwrap();
        assert_eq!(coords.owner, "rust-lang");
        assert_eq!(coords.repo, "rust");
        assert_eq!(coords.branch, "main");
    }

    #[test]
    fn parses_tree_branch_form() {
        let coords = parse_repo_url("https://github.com/rust-lang/rust/tree/stable").unwrap();
        assert_eq!(coords.branch, "stable");
    }

    #[test]
    fn rejects_non_github_host() {
        assert!(parse_repo_url("https://gitlab.com/a/b").is_err());
    }

    #[test]
    fn excludes_hard_patterns() {
        assert!(is_excluded("node_modules/pkg/index.js", &[]));
        assert!(is_excluded("assets/logo.png", &[]));
        assert!(is_excluded("Cargo.lock", &[]));
        assert!(!is_excluded("src/main.rs", &[]));
    }

    #[test]
    fn detects_binary_via_null_byte() {
        assert!(looks_binary(&[0x50, 0x4B, 0x00, 0x03]));
        assert!(!looks_binary(b"plain text content"));
    }
}
