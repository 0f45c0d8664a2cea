//! The Mirror Projector: a one-way filesystem dump of the graph for human
//! inspection (`spec.md` §4.H). Runs after every successful ingest cycle;
//! nothing else reads from its output directory, and it never reads back
//! from it either.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::error::RetrievalError;
use crate::persistence::{Backend, MoleculeRecord};

/// Molecules bundled per mirror file (`spec.md` §4.H).
const MOLECULES_PER_FILE: usize = 100;
const DEFAULT_BUCKET: &str = "default";
const UNTAGGED: &str = "untagged";

pub struct MirrorProjector {
    backend: Arc<dyn Backend>,
    output_dir: PathBuf,
}

impl MirrorProjector {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, output_dir: impl Into<PathBuf>) -> Self {
        Self { backend, output_dir: output_dir.into() }
    }

    /// Wipe `output_dir` and re-emit `@{bucket}/#{tag}/{source}_{hash}.md`
    /// files, each bundling up to [`MOLECULES_PER_FILE`] molecules.
    #[instrument(skip(self))]
    pub async fn project(&self) -> Result<(), RetrievalError> {
        let molecules = self.backend.all_molecules().await?;

        if self.output_dir.exists() {
            let _ = std::fs::remove_dir_all(&self.output_dir);
        }
        std::fs::create_dir_all(&self.output_dir).map_err(|e| RetrievalError::Backend(e.to_string()))?;

        for (relpath, chunk) in group_into_files(&molecules) {
            let full_path = self.output_dir.join(relpath);
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| RetrievalError::Backend(e.to_string()))?;
            }
            std::fs::write(&full_path, render_file(chunk)).map_err(|e| RetrievalError::Backend(e.to_string()))?;
        }
        Ok(())
    }
}

/// Group molecules into `@{bucket}/#{tag}/{source}_{hash}.md` paths,
/// chunked at [`MOLECULES_PER_FILE`] each.
fn group_into_files(molecules: &[MoleculeRecord]) -> Vec<(PathBuf, Vec<&MoleculeRecord>)> {
    let mut by_key: BTreeMap<(String, String, String), Vec<&MoleculeRecord>> = BTreeMap::new();

    for molecule in molecules {
        let bucket = DEFAULT_BUCKET.to_string();
        let tag = molecule
            .tags
            .iter()
            .find(|t| !t.eq_ignore_ascii_case("#quarantined"))
            .cloned()
            .unwrap_or_else(|| UNTAGGED.to_string());
        let source_name = sanitize_source_name(&molecule.source_path);
        by_key.entry((bucket, tag, source_name)).or_default().push(molecule);
    }

    let mut files = Vec::new();
    for ((bucket, tag, source_name), mut items) in by_key {
        items.sort_by_key(|m| m.start_byte);
        let path_hash = hex::encode(&Sha256::digest(source_name.as_bytes())[..6]);
        let tag_dir = tag.trim_start_matches('#').to_string();

        for (i, chunk) in items.chunks(MOLECULES_PER_FILE).enumerate() {
            let suffix = if i == 0 { String::new() } else { format!("_{i}") };
            let file_name = format!("{source_name}_{path_hash}{suffix}.md");
            let path = Path::new(&format!("@{bucket}")).join(format!("#{tag_dir}")).join(file_name);
            files.push((path, chunk.to_vec()));
        }
    }
    files
}

fn sanitize_source_name(source_path: &str) -> String {
    source_path
        .rsplit('/')
        .next()
        .unwrap_or(source_path)
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

fn render_file(molecules: Vec<&MoleculeRecord>) -> String {
    let mut out = String::new();
    for molecule in molecules {
        out.push_str(&format!("## [{}] {}\n\n", molecule.id, snippet(&molecule.content)));
        out.push_str(&molecule.content);
        out.push_str("\n\n");
    }
    out
}

fn snippet(content: &str) -> String {
    const MAX: usize = 60;
    let trimmed: String = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if trimmed.chars().count() <= MAX {
        trimmed
    } else {
        trimmed.chars().take(MAX).collect::<String>() + "…"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, source_path: &str, tags: &[&str]) -> MoleculeRecord {
        MoleculeRecord {
            id: id.to_string(),
            content: "hello world".to_string(),
            source_path: source_path.to_string(),
            timestamp_ms: 0,
            signature: 0,
            provenance: "internal".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            compound_id: "mem_x".to_string(),
            start_byte: 0,
            end_byte: 11,
        }
    }

    #[test]
    fn groups_by_tag_and_source() {
        let molecules = vec![sample("m1", "inbox/note.md", &["#rust"])];
        let files = group_into_files(&molecules);
        assert_eq!(files.len(), 1);
        let (path, _) = &files[0];
        assert!(path.to_string_lossy().contains("#rust"));
        assert!(path.to_string_lossy().contains("note.md"));
    }

    #[test]
    fn untagged_molecules_land_in_untagged_bucket() {
        let molecules = vec![sample("m1", "inbox/note.md", &[])];
        let files = group_into_files(&molecules);
        assert!(files[0].0.to_string_lossy().contains("untagged"));
    }

    #[test]
    fn splits_at_molecules_per_file() {
        let molecules: Vec<MoleculeRecord> = (0..250).map(|i| sample(&format!("m{i}"), "inbox/big.md", &["#tag"])).collect();
        let files = group_into_files(&molecules);
        assert_eq!(files.len(), 3);
    }
}
