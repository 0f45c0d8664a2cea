//! Runtime configuration, loaded from the environment.
//!
//! Mirrors the teacher crate's convention of a single `Config` struct with
//! an `from_env()` constructor: `.env` is loaded via `dotenvy` if present,
//! then every option is read from `std::env` with a typed default so the
//! crate runs out of the box with no environment at all.

use std::path::PathBuf;
use std::time::Duration;

/// How a changed-on-disk source's old molecules are handled on re-ingest
/// (invariant 7, `spec.md` §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuarantinePolicy {
    /// Delete superseded molecules/atoms outright.
    Delete,
    /// Keep them, tagged `Provenance::Quarantine`.
    Tag,
}

impl std::str::FromStr for QuarantinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "delete" => Ok(QuarantinePolicy::Delete),
            "tag" => Ok(QuarantinePolicy::Tag),
            other => Err(format!("unknown QUARANTINE_ON_RESYNC value: {other}")),
        }
    }
}

/// Crate-wide runtime configuration.
///
/// Every field corresponds to one option named in `spec.md` §6. Construct
/// with [`Config::from_env`] in production or [`Config::default`] in
/// tests.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Dimensionality reserved for a future embedding column; unused by
    /// the core (vector search is a Non-goal) but part of the schema
    /// contract external callers read.
    pub embedding_dim: usize,
    pub github_token: Option<String>,
    pub github_exclude_patterns: Vec<String>,
    pub ingest_max_molecule_bytes: usize,
    pub ingest_batch_size: usize,
    pub watcher_debounce: Duration,
    pub retrieval_budget_bytes: usize,
    pub retrieval_anchor_fraction: f64,
    pub quarantine_on_resync: QuarantinePolicy,
    /// Output directory for the Mirror Projector's filesystem dump
    /// (`spec.md` §6, default `mirrored_brain/`).
    pub mirror_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding_dim: 384,
            github_token: None,
            github_exclude_patterns: default_exclude_patterns(),
            ingest_max_molecule_bytes: 1024,
            ingest_batch_size: 50,
            watcher_debounce: Duration::from_millis(2000),
            retrieval_budget_bytes: 16384,
            retrieval_anchor_fraction: 0.7,
            quarantine_on_resync: QuarantinePolicy::Delete,
            mirror_dir: PathBuf::from("mirrored_brain"),
        }
    }
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// [`Config::default`] for any variable that's unset or unparsable.
    ///
    /// Attempts to load a `.env` file first via `dotenvy`; a missing file
    /// is not an error.
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            embedding_dim: env_parsed("EMBEDDING_DIM", defaults.embedding_dim),
            github_token: std::env::var("GITHUB_TOKEN").ok().filter(|v| !v.is_empty()),
            github_exclude_patterns: std::env::var("GITHUB_EXCLUDE_PATTERNS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.github_exclude_patterns),
            ingest_max_molecule_bytes: env_parsed(
                "INGEST_MAX_MOLECULE_BYTES",
                defaults.ingest_max_molecule_bytes,
            ),
            ingest_batch_size: env_parsed("INGEST_BATCH_SIZE", defaults.ingest_batch_size),
            watcher_debounce: Duration::from_millis(env_parsed(
                "WATCHER_DEBOUNCE_MS",
                defaults.watcher_debounce.as_millis() as u64,
            )),
            retrieval_budget_bytes: env_parsed(
                "RETRIEVAL_BUDGET_BYTES",
                defaults.retrieval_budget_bytes,
            ),
            retrieval_anchor_fraction: env_parsed(
                "RETRIEVAL_ANCHOR_FRACTION",
                defaults.retrieval_anchor_fraction,
            ),
            quarantine_on_resync: std::env::var("QUARANTINE_ON_RESYNC")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.quarantine_on_resync),
            mirror_dir: std::env::var("MIRROR_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.mirror_dir),
        }
    }

    #[must_use]
    pub fn neighbor_walk_fraction(&self) -> f64 {
        1.0 - self.retrieval_anchor_fraction
    }
}

fn default_exclude_patterns() -> Vec<String> {
    [
        "*.png", "*.jpg", "*.jpeg", "*.gif", "*.ico", "*.woff", "*.woff2", "*.ttf", "*.eot",
        "*.zip", "*.tar", "*.gz", "*.pdf", "*.lock", "node_modules/*", ".git/*", "target/*",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.ingest_max_molecule_bytes, 1024);
        assert_eq!(cfg.ingest_batch_size, 50);
        assert_eq!(cfg.watcher_debounce, Duration::from_millis(2000));
        assert_eq!(cfg.retrieval_budget_bytes, 16384);
        assert!((cfg.retrieval_anchor_fraction - 0.7).abs() < f64::EPSILON);
        assert!((cfg.neighbor_walk_fraction() - 0.3).abs() < f64::EPSILON);
        assert_eq!(cfg.quarantine_on_resync, QuarantinePolicy::Delete);
    }

    #[test]
    fn quarantine_policy_parses_case_insensitively() {
        assert_eq!("Tag".parse::<QuarantinePolicy>().unwrap(), QuarantinePolicy::Tag);
        assert_eq!(
            "DELETE".parse::<QuarantinePolicy>().unwrap(),
            QuarantinePolicy::Delete
        );
        assert!("bogus".parse::<QuarantinePolicy>().is_err());
    }
}
