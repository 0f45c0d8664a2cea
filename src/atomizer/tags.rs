//! Path-derived system atoms, type detection, and per-molecule tagging
//! (`spec.md` §4.B steps 3, 4, 8).

use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use regex::Regex;

use crate::model::{Atom, AtomKind};

const PROJECT_INDICATOR_DIRS: &[&str] =
    &["src", "packages", "apps", "projects", "repos", "personal", "work", "client"];

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "jsx", "tsx", "go", "java", "c", "cpp", "h", "hpp", "rb", "php",
    "cs", "swift", "kt", "scala", "sh", "pl",
];
const DOC_EXTENSIONS: &[&str] = &["md", "txt", "rst", "adoc"];
const CONFIG_EXTENSIONS: &[&str] = &["yaml", "yml", "toml", "ini", "cfg", "conf"];
const DATA_EXTENSIONS: &[&str] = &["csv", "json"];

static HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#[A-Za-z][A-Za-z0-9_:-]*").unwrap());

/// Derive the system (path-derived) atoms for a source path, per
/// `spec.md` §4.B step 3.
#[must_use]
pub fn system_atoms(source_path: &str) -> Vec<Atom> {
    let normalized = source_path.replace('\\', "/");
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
    let mut atoms = Vec::new();

    for (i, seg) in segments.iter().enumerate() {
        if PROJECT_INDICATOR_DIRS.contains(seg)
            && let Some(project_name) = segments.get(i + 1)
        {
            atoms.push(Atom::new(
                format!("#project:{project_name}"),
                AtomKind::System,
                1.0,
            ));
        }
    }

    if segments.contains(&"src") {
        atoms.push(Atom::new("#src", AtomKind::System, 1.0));
    }
    if segments.iter().any(|s| *s == "docs" || *s == "doc") {
        atoms.push(Atom::new("#docs", AtomKind::System, 1.0));
    }
    if segments.iter().any(|s| *s == "test" || *s == "tests") {
        atoms.push(Atom::new("#test", AtomKind::System, 1.0));
    }

    if let Some(ext) = extension_of(&normalized) {
        if CODE_EXTENSIONS.contains(&ext.as_str()) {
            atoms.push(Atom::new("#code", AtomKind::System, 1.0));
        } else if DOC_EXTENSIONS.contains(&ext.as_str()) {
            atoms.push(Atom::new("#doc", AtomKind::System, 1.0));
        } else if CONFIG_EXTENSIONS.contains(&ext.as_str()) {
            atoms.push(Atom::new("#config", AtomKind::System, 1.0));
        }
    }

    if normalized.contains("/history/") || normalized.contains("/archive/") {
        atoms.push(Atom::new("#Archive", AtomKind::System, 0.5));
    }

    atoms
}

/// Type-detect a molecule/compound body per `spec.md` §4.B step 4.
#[must_use]
pub fn detect_kind(source_path: &str, content: &str) -> crate::model::MoleculeKind {
    use crate::model::MoleculeKind;

    if let Some(ext) = extension_of(source_path) {
        if DATA_EXTENSIONS.contains(&ext.as_str()) {
            return MoleculeKind::Data;
        }
        if CODE_EXTENSIONS.contains(&ext.as_str()) {
            return MoleculeKind::Code;
        }
    }

    let looks_like_markdown_table = content.lines().filter(|l| l.trim_start().starts_with('|')).count() >= 2;
    if looks_like_markdown_table {
        return MoleculeKind::Data;
    }

    let code_markers = ["func ", "const ", "import ", "```"];
    if code_markers.iter().any(|m| content.contains(m)) {
        return MoleculeKind::Code;
    }

    MoleculeKind::Prose
}

fn extension_of(path: &str) -> Option<String> {
    path.rsplit('.').next().map(str::to_ascii_lowercase).filter(|e| e != &path.to_ascii_lowercase())
}

/// Scan `content` for `#word` tokens and configured keyword-registry
/// entries, returning the deduplicated concept atoms tagged onto a single
/// molecule (`spec.md` §4.B step 8).
#[must_use]
pub fn concept_atoms(content: &str, keyword_registry: &AhoCorasick, keywords: &[String]) -> Vec<Atom> {
    let mut labels: Vec<String> = HASHTAG.find_iter(content).map(|m| m.as_str().to_string()).collect();

    for mat in keyword_registry.find_iter(content) {
        labels.push(format!("#{}", keywords[mat.pattern().as_usize()]));
    }

    labels.sort();
    labels.dedup();
    labels
        .into_iter()
        .map(|label| Atom::new(label, AtomKind::Concept, 1.0))
        .collect()
}

/// Build the Aho-Corasick automaton for a keyword registry, matched
/// case-insensitively per `spec.md` §4.B step 8.
#[must_use]
pub fn build_keyword_registry(keywords: &[String]) -> AhoCorasick {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(keywords)
        .expect("keyword registry patterns are always valid literals")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_project_and_src_atoms() {
        let atoms = system_atoms("repos/atom-engine/src/lib.rs");
        let labels: Vec<_> = atoms.iter().map(|a| a.label.as_str()).collect();
        assert!(labels.contains(&"#project:atom-engine"));
        assert!(labels.contains(&"#src"));
        assert!(labels.contains(&"#code"));
    }

    #[test]
    fn archive_atom_has_half_weight() {
        let atoms = system_atoms("inbox/history/old-note.md");
        let archive = atoms.iter().find(|a| a.label == "#Archive").unwrap();
        assert!((archive.weight - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn detects_data_by_extension() {
        assert_eq!(detect_kind("data/rows.csv", "a,b,c"), crate::model::MoleculeKind::Data);
    }

    #[test]
    fn detects_code_by_markers_when_extension_unknown() {
        assert_eq!(
            detect_kind("inbox/snippet.txt", "func main() {\n  const x = 1\n}"),
            crate::model::MoleculeKind::Code
        );
    }

    #[test]
    fn defaults_to_prose() {
        assert_eq!(detect_kind("inbox/note.md", "Just a sentence."), crate::model::MoleculeKind::Prose);
    }

    #[test]
    fn harvests_hashtags_and_keyword_registry() {
        let keywords = vec!["rust".to_string()];
        let registry = build_keyword_registry(&keywords);
        let atoms = concept_atoms("Loving #rustlang and Rust tooling", &registry, &keywords);
        let labels: Vec<_> = atoms.iter().map(|a| a.label.as_str()).collect();
        assert!(labels.contains(&"#rustlang"));
        assert!(labels.contains(&"#rust"));
    }
}
