//! Crate-wide error types.
//!
//! Each pipeline stage gets its own `thiserror` enum with a
//! `miette::Diagnostic` impl (gated behind the `diagnostics` feature, on
//! by default), mirroring the teacher crate's `CheckpointerError` /
//! `SQLiteCheckpointerError` split: narrow, stage-local errors that fold
//! into the crate-wide [`IngestError`] at API boundaries.

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;
use thiserror::Error;

/// Errors from the Persistence Layer.
///
/// The sanitizer and atomizer are total functions over their input (see
/// `spec.md` §7: "ParseError (Atomizer): never raised") and therefore have
/// no error enum of their own — failures below originate at or after the
/// storage boundary.
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum PersistError {
    /// Standard 059 / Ghost-Data Protocol: a write batch's read-after-write
    /// verification found fewer rows than were written.
    #[error("verify failed: wrote {expected} rows, read back {actual}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(atom_engine::persist::verify_failed),
            help("the store silently dropped rows from the last batch; check backend health")
        )
    )]
    VerifyFailed { expected: usize, actual: usize },

    /// Lock contention exhausted its retry budget.
    #[error("store busy after {attempts} attempts")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(code(atom_engine::persist::store_busy))
    )]
    StoreBusy { attempts: u32 },

    #[error("backend error: {0}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atom_engine::persist::backend)))]
    Backend(String),
}

impl From<sqlx::Error> for PersistError {
    fn from(err: sqlx::Error) -> Self {
        PersistError::Backend(err.to_string())
    }
}

/// Errors from the Source Registry.
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum RegistryError {
    #[error("registry backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        RegistryError::Backend(err.to_string())
    }
}

/// Errors from the Watcher. File-scoped failures never reach here — the
/// watcher logs and continues per file (`spec.md` §4.E) — these are
/// failures of the watcher service itself (e.g. the inbox directory
/// disappearing).
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum WatchError {
    #[error("failed to watch {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("notify backend error: {0}")]
    Notify(#[from] notify::Error),
}

/// Errors from the Remote Fetcher (`spec.md` §4.F, §7).
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum FetchError {
    #[error("invalid github url: {0}")]
    InvalidUrl(String),

    #[error("download failed after {attempts} attempts: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atom_engine::fetch::download)))]
    Download { attempts: u32, message: String },

    #[error("rate limited, resets at {reset_at}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(help("authenticate with GITHUB_TOKEN to raise the 60 req/h limit"))
    )]
    RateLimited { reset_at: i64 },

    #[error("payload rejected: {0}")]
    InvalidPayload(String),

    #[error("archive extraction failed: {0}")]
    Extract(String),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Errors from the Retrieval Engine. `FtsSyntaxError` is swallowed per
/// phase (`spec.md` §7) so it never escapes `search()`; this enum exists
/// for the remaining failure mode, a hard timeout.
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum RetrievalError {
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for RetrievalError {
    fn from(err: sqlx::Error) -> Self {
        RetrievalError::Backend(err.to_string())
    }
}

/// Crate-wide error returned at the `api` boundary.
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum IngestError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error("config error: {0}")]
    Config(String),
}

impl IngestError {
    /// The stable error code used in the `{error_code, message, detail}`
    /// JSON shape the Ingest API returns (`spec.md` §7).
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            IngestError::Persist(PersistError::VerifyFailed { .. }) => "INGEST_VERIFY_FAILED",
            IngestError::Persist(PersistError::StoreBusy { .. }) => "STORE_BUSY",
            IngestError::Persist(PersistError::Backend(_)) => "STORE_BUSY",
            IngestError::Registry(_) => "REGISTRY_ERROR",
            IngestError::Watch(_) => "WATCH_ERROR",
            IngestError::Fetch(FetchError::RateLimited { .. }) => "RATE_LIMITED",
            IngestError::Fetch(_) => "FETCH_ERROR",
            IngestError::Retrieval(_) => "RETRIEVAL_ERROR",
            IngestError::Config(_) => "CONFIG_ERROR",
        }
    }
}
