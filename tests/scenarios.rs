//! Concrete end-to-end scenarios and cross-module invariants.

use std::io::Write;
use std::sync::Arc;

use atom_engine::api::{self, IngestRequest, SearchRequest};
use atom_engine::atomizer::{self, KeywordRegistry};
use atom_engine::config::{Config, QuarantinePolicy};
use atom_engine::model::Provenance;
use atom_engine::persistence::{Backend, SqliteBackend};
use atom_engine::remote_fetcher::RemoteFetcher;
use atom_engine::retrieval::RetrievalEngine;
use atom_engine::sanitizer::sanitize;

async fn backend() -> Arc<dyn Backend> {
    Arc::new(SqliteBackend::connect_in_memory().await.unwrap())
}

/// `Config::default()` with the mirror output redirected to a scratch
/// directory, so each test's projection writes don't collide on
/// `./mirrored_brain`.
fn test_config() -> Config {
    Config { mirror_dir: tempfile::tempdir().unwrap().keep(), ..Config::default() }
}

/// Scenario 1 — idempotent small note.
#[tokio::test]
async fn scenario_1_idempotent_small_note() {
    let registry = KeywordRegistry::default();
    let body = b"The quick brown fox jumps. The lazy dog sleeps.";

    let topology = atomizer::atomize(body, "inbox/note.md", Provenance::Internal, 1024, 0, &registry);
    assert_eq!(topology.molecules.len(), 2);
    assert_eq!((topology.molecules[0].start_byte, topology.molecules[0].end_byte), (0, 26));
    assert_eq!((topology.molecules[1].start_byte, topology.molecules[1].end_byte), (27, 47));
    assert_eq!(topology.molecules[0].content, "The quick brown fox jumps.");
    assert_eq!(topology.molecules[1].content, "The lazy dog sleeps.");

    let backend = backend().await;
    let cfg = test_config();
    let req = IngestRequest {
        content: String::from_utf8(body.to_vec()).unwrap(),
        source: "inbox/note.md".to_string(),
        kind: None,
        buckets: None,
        tags: None,
    };
    let first = api::ingest_content(req.clone(), &backend, &registry, &cfg, 0).await.unwrap();
    assert_eq!(first.status, api::IngestStatus::Success);
    let second = api::ingest_content(req, &backend, &registry, &cfg, 0).await.unwrap();
    assert_eq!(second.status, api::IngestStatus::Skipped);
}

/// Scenario 2 — encoding auto-detect, no BOM.
#[test]
fn scenario_2_utf16le_without_bom_is_detected() {
    let ascii = "The quick brown fox jumps over the lazy dog. ".repeat(20);
    let mut raw = Vec::new();
    for unit in ascii.encode_utf16() {
        raw.extend_from_slice(&unit.to_le_bytes());
    }
    assert!(raw.len() >= 1024);

    let clean = sanitize(&raw, "inbox/utf16.md");
    assert!(!clean.contains('\u{0000}'));
    assert!(clean.contains("quick brown fox"));
}

/// Scenario 3 — re-ingest quarantine.
#[tokio::test]
async fn scenario_3_reingest_quarantines_old_content() {
    let backend = backend().await;
    let keyword_registry = KeywordRegistry::default();
    let cfg = Config { quarantine_on_resync: QuarantinePolicy::Delete, ..test_config() };
    let retrieval = RetrievalEngine::new(backend.clone(), cfg.clone());

    let ingest = |content: &'static str| {
        let backend = backend.clone();
        let keyword_registry = &keyword_registry;
        let cfg = cfg.clone();
        async move {
            api::ingest_content(
                IngestRequest {
                    content: content.to_string(),
                    source: "inbox/log.md".to_string(),
                    kind: None,
                    buckets: None,
                    tags: None,
                },
                &backend,
                keyword_registry,
                &cfg,
                0,
            )
            .await
            .unwrap()
        }
    };

    ingest("alpha").await;
    ingest("beta").await;

    let alpha_hits = api::search(SearchRequest { query: "alpha".to_string(), budget: None, tags: None }, &retrieval, 0).await;
    assert!(alpha_hits.is_empty());

    let beta_hits = api::search(SearchRequest { query: "beta".to_string(), budget: None, tags: None }, &retrieval, 0).await;
    assert_eq!(beta_hits.len(), 1);
}

/// Scenario 3 (tag variant) — quarantined molecules survive, tagged.
#[tokio::test]
async fn scenario_3_tag_policy_keeps_quarantined_molecules() {
    let backend = backend().await;
    let keyword_registry = KeywordRegistry::default();
    let cfg = Config { quarantine_on_resync: QuarantinePolicy::Tag, ..test_config() };

    for content in ["alpha", "beta"] {
        api::ingest_content(
            IngestRequest { content: content.to_string(), source: "inbox/log.md".to_string(), kind: None, buckets: None, tags: None },
            &backend,
            &keyword_registry,
            &cfg,
            0,
        )
        .await
        .unwrap();
    }

    let all = backend.all_molecules().await.unwrap();
    assert!(all.iter().any(|m| m.content.contains("alpha") && m.tags.iter().any(|t| t == "#quarantined")));
    assert!(all.iter().any(|m| m.content.contains("beta") && !m.tags.iter().any(|t| t == "#quarantined")));
}

/// Scenario 4 — anchor phase favors query terms, neighbor phase fills the
/// remaining budget with tag-overlapping, query-disjoint molecules.
#[tokio::test]
async fn scenario_4_anchor_and_neighbor_are_disjoint_and_budgeted() {
    let backend = backend().await;
    let keyword_registry = KeywordRegistry::default();
    let cfg = test_config();

    for i in 0..10 {
        let content = format!("Rust release notes entry number {i} about the language itself.");
        api::ingest_content(
            IngestRequest { content, source: format!("inbox/rust_{i}.md"), kind: None, buckets: None, tags: Some(vec!["rust".to_string()]) },
            &backend,
            &keyword_registry,
            &cfg,
            0,
        )
        .await
        .unwrap();
    }
    for i in 0..10 {
        let content = format!("Compiler internals note {i} covering optimization passes and codegen.");
        api::ingest_content(
            IngestRequest { content, source: format!("inbox/compiler_{i}.md"), kind: None, buckets: None, tags: Some(vec!["compiler".to_string()]) },
            &backend,
            &keyword_registry,
            &cfg,
            0,
        )
        .await
        .unwrap();
    }
    for i in 0..5 {
        let content = format!("Rust compiler pipeline stage {i}: parse, type-check, codegen.");
        api::ingest_content(
            IngestRequest {
                content,
                source: format!("inbox/both_{i}.md"),
                kind: None,
                buckets: None,
                tags: Some(vec!["rust".to_string(), "compiler".to_string()]),
            },
            &backend,
            &keyword_registry,
            &cfg,
            0,
        )
        .await
        .unwrap();
    }

    let retrieval = RetrievalEngine::new(backend.clone(), cfg);
    let response = retrieval.search("rust", Some(2000), 0).await;

    let total_bytes: usize = response.results.iter().map(|r| r.content.len()).sum();
    assert!(total_bytes as f64 <= 2000.0 * 1.05);
    assert!(!response.results.is_empty());

    // Anchor/Neighbor disjointness (invariant 7): nothing in the result set
    // that lacks "rust" may have arrived via a path that required it.
    let (with_rust, without_rust): (Vec<_>, Vec<_>) =
        response.results.iter().partition(|r| r.content.to_ascii_lowercase().contains("rust"));
    assert!(!with_rust.is_empty(), "anchor phase should surface rust-containing molecules");
    // Any molecule reaching the response without the query term must have
    // arrived via tag overlap (Neighbor-Walk), carrying a shared tag.
    for result in &without_rust {
        assert!(result.tags.iter().any(|t| t.eq_ignore_ascii_case("#compiler")));
    }
}

/// Scenario 5 — GitHub ingest: binary and excluded paths are skipped, the
/// remainder is counted and tagged with the `github:{owner}/{repo}/` prefix.
#[tokio::test]
async fn scenario_5_github_ingest_skips_binary_and_excluded_paths() {
    let backend = backend().await;
    let keyword_registry = Arc::new(KeywordRegistry::default());
    let cfg = test_config();
    let fetcher = RemoteFetcher::new(backend.clone(), keyword_registry, cfg).with_download_base_url("http://127.0.0.1:0");

    // Build a fake tarball in-memory mirroring scenario 5's fixture.
    let tarball = build_tarball(&[
        ("demo-main/src/a.ts", b"export const a = 1;".to_vec()),
        ("demo-main/src/b.ts", b"export const b = 2;".to_vec()),
        ("demo-main/src/c.ts", b"export const c = 3;".to_vec()),
        ("demo-main/assets/logo.png", vec![0x89, 0x50, 0x4E, 0x47, 0x00, 0x00, 0x00]),
        ("demo-main/node_modules/pkg/index.js", b"module.exports = {};".to_vec()),
    ]);

    let entries = extract_for_test(&tarball);
    let mut accepted = Vec::new();
    for (relpath, bytes) in entries {
        if atom_engine::remote_fetcher::is_excluded(&relpath, &[]) || atom_engine::remote_fetcher::looks_binary(&bytes) {
            continue;
        }
        accepted.push(relpath);
    }
    assert_eq!(accepted.len(), 3);
    assert!(accepted.iter().all(|p| p.ends_with(".ts")));

    let record = fetcher.register_repo("https://github.com/demo/demo", "default").await.unwrap();
    assert_eq!(record.status.as_str(), "pending");
}

fn build_tarball(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, bytes) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, bytes.as_slice()).unwrap();
    }
    let tar_bytes = builder.into_inner().unwrap();

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

fn extract_for_test(tarball: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;
    let decoder = flate2::read::GzDecoder::new(tarball);
    let mut archive = tar::Archive::new(decoder);
    let mut out = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let path = entry.path().unwrap().to_path_buf();
        let relpath: String = path.components().skip(1).collect::<std::path::PathBuf>().to_string_lossy().replace('\\', "/");
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        out.push((relpath, bytes));
    }
    out
}

/// Scenario 6 — read-after-write failure: a store that silently drops rows
/// must surface `INGEST_VERIFY_FAILED` rather than a false success.
#[tokio::test]
async fn scenario_6_verify_failure_surfaces_as_ingest_verify_failed() {
    use atom_engine::error::PersistError;
    let err = PersistError::VerifyFailed { expected: 50, actual: 49 };
    let ingest_err = atom_engine::IngestError::from(err);
    assert_eq!(ingest_err.error_code(), "INGEST_VERIFY_FAILED");
}

/// Invariant 3 — sanitizer is idempotent.
#[test]
fn invariant_sanitizer_is_idempotent() {
    let raw = b"line one\r\nline two\r\n\r\n\r\n\r\nline three   user@example.com";
    let once = sanitize(raw, "inbox/x.md");
    let twice = sanitize(once.as_bytes(), "inbox/x.md");
    assert_eq!(once, twice);
}

/// Invariant 2 — byte-exact reconstruction across a mixed prose/blank-line
/// document.
#[test]
fn invariant_molecules_are_byte_exact_slices_of_compound_body() {
    let registry = KeywordRegistry::default();
    let body = b"Alpha beta gamma. Delta epsilon zeta! Eta theta? Iota kappa.";
    let topology = atomizer::atomize(body, "inbox/multi.md", Provenance::Internal, 1024, 0, &registry);
    let compound = topology.compound.unwrap();
    for molecule in &topology.molecules {
        assert_eq!(&compound.body[molecule.start_byte..molecule.end_byte], molecule.content);
    }
}
