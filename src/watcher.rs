//! The Watcher: debounced filesystem observation of the inbox
//! directories, dispatching into Sanitizer → Atomizer → Persistence
//! (`spec.md` §4.E).
//!
//! Built on `notify` rather than `notify-debouncer-full` so the exact
//! 2-second-quiescence rule stays under our control: a background flush
//! task walks a `HashMap<PathBuf, Instant>` of last-seen-write times and
//! fires the pipeline only once a path has gone quiet for the configured
//! debounce window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::atomizer::{self, KeywordRegistry};
use crate::config::Config;
use crate::error::WatchError;
use crate::mirror::MirrorProjector;
use crate::model::Provenance;
use crate::persistence::Backend;
use crate::registry::SourceRegistry;

const DEFAULT_ACCEPTED_EXTENSIONS: &[&str] = &["md", "txt", "yaml", "csv", "json"];
const FLUSH_INTERVAL: Duration = Duration::from_millis(250);

/// Assign the provenance a freshly-observed path should carry
/// (`spec.md` §4.E).
#[must_use]
pub fn classify_provenance(path: &str) -> Provenance {
    let normalized = path.replace('\\', "/");
    if normalized.contains("/external-inbox/") {
        Provenance::External
    } else if normalized.contains("/inbox/") {
        Provenance::Internal
    } else {
        Provenance::External
    }
}

/// `true` if the Watcher should consider `path` at all: not a dotfile,
/// not inside the mirror projection directory, and carrying an accepted
/// extension.
#[must_use]
pub fn should_watch(path: &Path, accepted_extensions: &[String]) -> bool {
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    if file_name.starts_with('.') {
        return false;
    }
    let normalized = path.to_string_lossy().replace('\\', "/");
    if normalized.contains("/mirrored_brain/") {
        return false;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => accepted_extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Long-running filesystem watcher service.
pub struct Watcher {
    backend: Arc<dyn Backend>,
    registry: Arc<SourceRegistry>,
    keyword_registry: Arc<KeywordRegistry>,
    mirror: MirrorProjector,
    config: Config,
    accepted_extensions: Vec<String>,
}

impl Watcher {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, keyword_registry: Arc<KeywordRegistry>, config: Config) -> Self {
        let registry = Arc::new(SourceRegistry::new(backend.clone()));
        let mirror = MirrorProjector::new(backend.clone(), config.mirror_dir.clone());
        Self {
            backend,
            registry,
            keyword_registry,
            mirror,
            config,
            accepted_extensions: DEFAULT_ACCEPTED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Watch `dirs`, dispatching the pipeline for every file that goes
    /// quiet for `config.watcher_debounce`. Runs until `shutdown` resolves.
    #[instrument(skip(self, dirs, shutdown))]
    pub async fn run(&self, dirs: Vec<PathBuf>, mut shutdown: tokio::sync::oneshot::Receiver<()>) -> Result<(), WatchError> {
        let pending: Arc<Mutex<HashMap<PathBuf, Instant>>> = Arc::new(Mutex::new(HashMap::new()));
        let pending_for_events = pending.clone();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<PathBuf>();
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res
                && matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
            {
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
        })
        .map_err(WatchError::Notify)?;

        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::Recursive)
                .map_err(WatchError::Notify)?;
        }

        let debounce = self.config.watcher_debounce;
        let event_task = {
            let pending = pending_for_events;
            async move {
                while let Some(path) = rx.recv().await {
                    pending.lock().await.insert(path, Instant::now());
                }
            }
        };

        let flush_task = async {
            loop {
                tokio::time::sleep(FLUSH_INTERVAL).await;
                let ready: Vec<PathBuf> = {
                    let mut map = pending.lock().await;
                    let now = Instant::now();
                    let ready: Vec<PathBuf> = map
                        .iter()
                        .filter(|(_, seen)| now.duration_since(**seen) >= debounce)
                        .map(|(p, _)| p.clone())
                        .collect();
                    for path in &ready {
                        map.remove(path);
                    }
                    ready
                };
                for path in ready {
                    if should_watch(&path, &self.accepted_extensions) {
                        self.dispatch(&path).await;
                    }
                }
            }
        };

        tokio::select! {
            _ = event_task => {}
            _ = flush_task => {}
            _ = &mut shutdown => {}
        }
        Ok(())
    }

    /// Run Sanitizer → Atomizer → Persistence → Registry for one file.
    /// Any failure is logged and isolated — other files are unaffected
    /// (`spec.md` §4.E).
    #[instrument(skip(self))]
    async fn dispatch(&self, path: &Path) {
        let path_str = path.to_string_lossy().to_string();
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %path_str, error = %e, "failed to read file, skipping");
                return;
            }
        };

        let content_hash = SourceRegistry::hash_content(&bytes);
        match self.registry.is_unchanged(&path_str, &content_hash).await {
            Ok(true) => {
                tracing::debug!(path = %path_str, "unchanged, short-circuiting");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(path = %path_str, error = %e, "registry lookup failed, skipping");
                return;
            }
        }

        if let Ok(Some(_)) = self.registry.get(&path_str).await
            && let Err(e) = self
                .backend
                .quarantine_source(&path_str, self.config.quarantine_on_resync)
                .await
        {
            tracing::warn!(path = %path_str, error = %e, "quarantine failed, skipping");
            return;
        }

        let provenance = classify_provenance(&path_str);
        let mtime_ms = tokio::fs::metadata(path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let topology = atomizer::atomize(
            &bytes,
            &path_str,
            provenance,
            self.config.ingest_max_molecule_bytes,
            mtime_ms,
            &self.keyword_registry,
        );

        if topology.compound.is_none() {
            tracing::debug!(path = %path_str, "sanitized to empty content, nothing to persist");
            return;
        }

        if let Err(e) = self
            .backend
            .upsert_topology(&topology, self.config.ingest_batch_size)
            .await
        {
            tracing::error!(path = %path_str, error = %e, "persist failed, registry not updated");
            return;
        }

        if let Err(e) = self
            .registry
            .record_ingest(&path_str, &content_hash, topology.atoms.len() as u64, mtime_ms)
            .await
        {
            tracing::warn!(path = %path_str, error = %e, "failed to update source registry after successful persist");
        }

        if let Err(e) = self.mirror.project().await {
            tracing::warn!(path = %path_str, error = %e, "mirror projection failed after ingest");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_inbox_is_internal_provenance() {
        assert_eq!(classify_provenance("/home/user/inbox/note.md"), Provenance::Internal);
    }

    #[test]
    fn external_inbox_is_external_provenance() {
        assert_eq!(classify_provenance("/home/user/external-inbox/scrape.md"), Provenance::External);
    }

    #[test]
    fn web_scrape_marker_is_external() {
        assert_eq!(classify_provenance("/data/web_scrape/page.md"), Provenance::External);
    }

    #[test]
    fn unrecognized_path_defaults_external() {
        assert_eq!(classify_provenance("/tmp/random.md"), Provenance::External);
    }

    #[test]
    fn ignores_dotfiles_and_mirror_directory() {
        let extensions = vec!["md".to_string()];
        assert!(!should_watch(Path::new("/inbox/.hidden.md"), &extensions));
        assert!(!should_watch(Path::new("/mirrored_brain/x.md"), &extensions));
        assert!(!should_watch(Path::new("/inbox/note.txt"), &extensions));
        assert!(should_watch(Path::new("/inbox/note.md"), &extensions));
    }
}
