//! SQLite-backed [`Backend`], grounded on the teacher's `SQLiteCheckpointer`:
//! a shared `sqlx::SqlitePool`, embedded migrations run on connect,
//! transactional batch writes, and `thiserror`/`miette` error reporting.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use super::{Backend, MoleculeRecord};
use crate::config::QuarantinePolicy;
use crate::error::{PersistError, RegistryError, RetrievalError};
use crate::model::{Atom, Compound, Edge, GithubRepoRecord, GithubRepoStatus, Molecule, SourceRecord, Topology};

/// Backoff schedule for lock-contended writes (`spec.md` §4.C).
const RETRY_BACKOFF_MS: [u64; 5] = [50, 100, 200, 400, 800];

#[derive(Clone)]
pub struct SqliteBackend {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend").finish()
    }
}

impl SqliteBackend {
    /// Connect (creating the database file if needed) and run embedded
    /// migrations. `database_url` e.g. `"sqlite://atom-engine.db"`.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self, PersistError> {
        let pool = SqlitePool::connect(database_url).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| PersistError::Backend(format!("migration failure: {e}")))?;
        Ok(Self { pool: Arc::new(pool) })
    }

    /// In-memory pool, for tests.
    pub async fn connect_in_memory() -> Result<Self, PersistError> {
        Self::connect("sqlite::memory:").await
    }
}

fn is_busy(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("locked") || db.message().contains("busy"))
}

async fn retrying<F, Fut, T>(mut op: F) -> Result<T, PersistError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if is_busy(&e) && (attempt as usize) < RETRY_BACKOFF_MS.len() => {
                tracing::warn!(attempt, "store busy, retrying");
                tokio::time::sleep(Duration::from_millis(RETRY_BACKOFF_MS[attempt as usize])).await;
                attempt += 1;
            }
            Err(e) if is_busy(&e) => {
                return Err(PersistError::StoreBusy { attempts: attempt + 1 });
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Escape `%`/`_`/`\` in a LIKE pattern fragment so a `source_path` prefix
/// containing those characters (e.g. a repo name with an underscore) is
/// matched literally rather than as a wildcard.
fn escape_like(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn tags_column(atom_ids: &[String], labels_by_id: &std::collections::HashMap<String, String>) -> String {
    let labels: Vec<&str> =
        atom_ids.iter().filter_map(|id| labels_by_id.get(id)).map(String::as_str).collect();
    if labels.is_empty() {
        String::new()
    } else {
        format!(",{},", labels.join(","))
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    #[instrument(skip(self, topology), err)]
    async fn upsert_topology(&self, topology: &Topology, batch_size: usize) -> Result<(), PersistError> {
        let Some(compound) = topology.compound.as_ref() else {
            return Ok(());
        };

        let mut dedup_atoms: Vec<Atom> = topology.atoms.clone();
        dedup_atoms.sort_by(|a, b| a.id.cmp(&b.id));
        dedup_atoms.dedup_by(|a, b| a.id == b.id);

        let labels_by_id: std::collections::HashMap<String, String> =
            dedup_atoms.iter().map(|a| (a.id.clone(), a.label.clone())).collect();

        write_compound(&self.pool, compound).await?;

        for chunk in dedup_atoms.chunks(batch_size) {
            write_atom_batch(&self.pool, chunk).await?;
        }
        for chunk in topology.molecules.chunks(batch_size) {
            write_molecule_batch(&self.pool, chunk, compound, &labels_by_id).await?;
        }
        for chunk in topology.edges.chunks(batch_size) {
            write_edge_batch(&self.pool, chunk).await?;
        }

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn quarantine_source(&self, source_path: &str, policy: QuarantinePolicy) -> Result<(), PersistError> {
        match policy {
            QuarantinePolicy::Delete => {
                retrying(|| {
                    sqlx::query("DELETE FROM molecules WHERE source_path = ?1")
                        .bind(source_path)
                        .execute(&*self.pool)
                })
                .await?;
                retrying(|| {
                    sqlx::query("DELETE FROM compounds WHERE source_path = ?1")
                        .bind(source_path)
                        .execute(&*self.pool)
                })
                .await?;
            }
            QuarantinePolicy::Tag => {
                retrying(|| {
                    sqlx::query(
                        "UPDATE molecules SET provenance = 'quarantine', tags = tags || ',#quarantined,' WHERE source_path = ?1",
                    )
                    .bind(source_path)
                    .execute(&*self.pool)
                })
                .await?;
                retrying(|| {
                    sqlx::query("UPDATE compounds SET provenance = 'quarantine' WHERE source_path = ?1")
                        .bind(source_path)
                        .execute(&*self.pool)
                })
                .await?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn quarantine_prefix(&self, prefix: &str, policy: QuarantinePolicy) -> Result<u64, PersistError> {
        let pattern = format!("{}%", escape_like(prefix));
        let affected = match policy {
            QuarantinePolicy::Delete => {
                let result = retrying(|| {
                    sqlx::query("DELETE FROM molecules WHERE source_path LIKE ?1 ESCAPE '\\'")
                        .bind(&pattern)
                        .execute(&*self.pool)
                })
                .await?;
                retrying(|| {
                    sqlx::query("DELETE FROM compounds WHERE source_path LIKE ?1 ESCAPE '\\'")
                        .bind(&pattern)
                        .execute(&*self.pool)
                })
                .await?;
                result.rows_affected()
            }
            QuarantinePolicy::Tag => {
                let result = retrying(|| {
                    sqlx::query(
                        "UPDATE molecules SET provenance = 'quarantine', tags = tags || ',#quarantined,' WHERE source_path LIKE ?1 ESCAPE '\\'",
                    )
                    .bind(&pattern)
                    .execute(&*self.pool)
                })
                .await?;
                retrying(|| {
                    sqlx::query("UPDATE compounds SET provenance = 'quarantine' WHERE source_path LIKE ?1 ESCAPE '\\'")
                        .bind(&pattern)
                        .execute(&*self.pool)
                })
                .await?;
                result.rows_affected()
            }
        };
        Ok(affected)
    }

    #[instrument(skip(self), err)]
    async fn get_source(&self, path: &str) -> Result<Option<SourceRecord>, RegistryError> {
        let row = sqlx::query("SELECT path, content_hash, total_atoms, last_ingest_ms FROM sources WHERE path = ?1")
            .bind(path)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.map(|r| SourceRecord {
            path: r.get("path"),
            content_hash: r.get("content_hash"),
            total_atoms: r.get::<i64, _>("total_atoms") as u64,
            last_ingest_ms: r.get("last_ingest_ms"),
        }))
    }

    #[instrument(skip(self, record), err)]
    async fn upsert_source(&self, record: &SourceRecord) -> Result<(), RegistryError> {
        sqlx::query(
            r#"
            INSERT INTO sources (path, content_hash, total_atoms, last_ingest_ms)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(path) DO UPDATE SET
                content_hash = excluded.content_hash,
                total_atoms = excluded.total_atoms,
                last_ingest_ms = excluded.last_ingest_ms
            "#,
        )
        .bind(&record.path)
        .bind(&record.content_hash)
        .bind(record.total_atoms as i64)
        .bind(record.last_ingest_ms)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, seen_paths))]
    async fn stale_paths(&self, seen_paths: &[String]) -> Result<Vec<String>, RegistryError> {
        let rows = sqlx::query("SELECT path FROM sources")
            .fetch_all(&*self.pool)
            .await?;
        let seen: std::collections::HashSet<&str> = seen_paths.iter().map(String::as_str).collect();
        Ok(rows
            .into_iter()
            .map(|r| r.get::<String, _>("path"))
            .filter(|p| !seen.contains(p.as_str()))
            .collect())
    }

    #[instrument(skip(self, terms), err)]
    async fn search_anchor(&self, terms: &[String], limit: usize) -> Result<Vec<(MoleculeRecord, f64)>, RetrievalError> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let match_expr = terms
            .iter()
            .map(|t| format!("\"{}\"", t.replace('"', "")))
            .collect::<Vec<_>>()
            .join(" OR ");

        let rows = sqlx::query(
            r#"
            SELECT m.id, m.content, m.source_path, m.timestamp_ms, m.signature,
                   m.provenance, m.tags, m.compound_id, m.start_byte, m.end_byte
            FROM molecules_fts f
            JOIN molecules m ON m.id = f.id
            WHERE molecules_fts MATCH ?1
            LIMIT ?2
            "#,
        )
        .bind(&match_expr)
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await;

        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "anchor phase FTS query failed, returning empty set");
                return Ok(Vec::new());
            }
        };

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let record = row_to_record(&row);
            let tf = terms
                .iter()
                .filter(|t| record.content.to_ascii_lowercase().contains(&t.to_ascii_lowercase()))
                .count() as f64;
            let length_normalized = tf / (tf + 1.2);
            let tag_boost = if terms
                .iter()
                .any(|t| record.tags.iter().any(|tag| tag.eq_ignore_ascii_case(t)))
            {
                2.0
            } else {
                1.0
            };
            scored.push((record, length_normalized * tag_boost));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored)
    }

    #[instrument(skip(self, tags, exclude_ids), err)]
    async fn search_by_tags(
        &self,
        tags: &[String],
        exclude_ids: &[String],
        limit: usize,
    ) -> Result<Vec<MoleculeRecord>, RetrievalError> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT id, content, source_path, timestamp_ms, signature, provenance, tags, compound_id, start_byte, end_byte
            FROM molecules
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;

        let exclude: std::collections::HashSet<&str> = exclude_ids.iter().map(String::as_str).collect();
        let mut out: Vec<MoleculeRecord> = rows
            .into_iter()
            .map(|r| row_to_record(&r))
            .filter(|m| !exclude.contains(m.id.as_str()))
            .filter(|m| tags.iter().any(|t| m.tags.iter().any(|mt| mt.eq_ignore_ascii_case(t))))
            .collect();
        out.truncate(limit);
        Ok(out)
    }

    #[instrument(skip(self))]
    async fn all_molecules(&self) -> Result<Vec<MoleculeRecord>, RetrievalError> {
        let rows = sqlx::query(
            r#"
            SELECT id, content, source_path, timestamp_ms, signature, provenance, tags, compound_id, start_byte, end_byte
            FROM molecules
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    #[instrument(skip(self, record), err)]
    async fn upsert_github_repo(&self, record: &GithubRepoRecord) -> Result<(), RegistryError> {
        sqlx::query(
            r#"
            INSERT INTO github_repos (id, url, bucket, branch, status, total_files, total_atoms, last_error, last_synced_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                total_files = excluded.total_files,
                total_atoms = excluded.total_atoms,
                last_error = excluded.last_error,
                last_synced_ms = excluded.last_synced_ms
            "#,
        )
        .bind(&record.id)
        .bind(&record.url)
        .bind(&record.bucket)
        .bind(&record.branch)
        .bind(record.status.as_str())
        .bind(record.total_files as i64)
        .bind(record.total_atoms as i64)
        .bind(&record.last_error)
        .bind(record.last_synced_ms)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_github_repo(&self, id: &str) -> Result<Option<GithubRepoRecord>, RegistryError> {
        let row = sqlx::query("SELECT * FROM github_repos WHERE id = ?1")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.map(|r| row_to_github_repo(&r)))
    }

    #[instrument(skip(self))]
    async fn list_github_repos(&self) -> Result<Vec<GithubRepoRecord>, RegistryError> {
        let rows = sqlx::query("SELECT * FROM github_repos").fetch_all(&*self.pool).await?;
        Ok(rows.iter().map(row_to_github_repo).collect())
    }

    #[instrument(skip(self))]
    async fn delete_github_repo(&self, id: &str) -> Result<(), RegistryError> {
        sqlx::query("DELETE FROM github_repos WHERE id = ?1")
            .bind(id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_github_repo(row: &sqlx::sqlite::SqliteRow) -> GithubRepoRecord {
    let status: String = row.get("status");
    GithubRepoRecord {
        id: row.get("id"),
        url: row.get("url"),
        bucket: row.get("bucket"),
        branch: row.get("branch"),
        status: match status.as_str() {
            "pending" => GithubRepoStatus::Pending,
            "ingesting" => GithubRepoStatus::Ingesting,
            "synced" => GithubRepoStatus::Synced,
            _ => GithubRepoStatus::Failed,
        },
        total_files: row.get::<i64, _>("total_files") as u64,
        total_atoms: row.get::<i64, _>("total_atoms") as u64,
        last_error: row.get("last_error"),
        last_synced_ms: row.get("last_synced_ms"),
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> MoleculeRecord {
    let tags_raw: String = row.get("tags");
    MoleculeRecord {
        id: row.get("id"),
        content: row.get("content"),
        source_path: row.get("source_path"),
        timestamp_ms: row.get("timestamp_ms"),
        signature: row.get::<i64, _>("signature") as u64,
        provenance: row.get("provenance"),
        tags: tags_raw.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect(),
        compound_id: row.get("compound_id"),
        start_byte: row.get::<i64, _>("start_byte") as usize,
        end_byte: row.get::<i64, _>("end_byte") as usize,
    }
}

async fn write_compound(pool: &SqlitePool, compound: &Compound) -> Result<(), PersistError> {
    retrying(|| {
        sqlx::query(
            r#"
            INSERT INTO compounds (id, body, source_path, ingested_at_ms, provenance, signature)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                body = excluded.body,
                ingested_at_ms = excluded.ingested_at_ms,
                signature = excluded.signature
            "#,
        )
        .bind(&compound.id)
        .bind(&compound.body)
        .bind(&compound.source_path)
        .bind(compound.ingested_at_ms)
        .bind(compound.provenance.as_str())
        .bind(compound.signature as i64)
        .execute(pool)
    })
    .await?;

    let verify: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM compounds WHERE id = ?1")
        .bind(&compound.id)
        .fetch_one(pool)
        .await?;
    if verify != 1 {
        return Err(PersistError::VerifyFailed { expected: 1, actual: verify as usize });
    }
    Ok(())
}

async fn write_atom_batch(pool: &SqlitePool, atoms: &[Atom]) -> Result<(), PersistError> {
    if atoms.is_empty() {
        return Ok(());
    }
    for atom in atoms {
        retrying(|| {
            sqlx::query(
                r#"
                INSERT INTO atoms (id, label, kind, weight)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET weight = excluded.weight
                "#,
            )
            .bind(&atom.id)
            .bind(&atom.label)
            .bind(atom.kind.as_str())
            .bind(atom.weight)
            .execute(pool)
        })
        .await?;
    }
    verify_ids(pool, "atoms", atoms.iter().map(|a| a.id.as_str())).await
}

async fn write_molecule_batch(
    pool: &SqlitePool,
    molecules: &[Molecule],
    compound: &Compound,
    labels_by_id: &std::collections::HashMap<String, String>,
) -> Result<(), PersistError> {
    if molecules.is_empty() {
        return Ok(());
    }
    for molecule in molecules {
        let tags = tags_column(&molecule.atom_ids, labels_by_id);
        retrying(|| {
            sqlx::query(
                r#"
                INSERT INTO molecules (
                    id, compound_id, content, sequence, start_byte, end_byte, kind,
                    numeric_value, unit, signature, timestamp_ms, source_path, provenance, tags
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                ON CONFLICT(id) DO UPDATE SET
                    content = excluded.content,
                    start_byte = excluded.start_byte,
                    end_byte = excluded.end_byte,
                    signature = excluded.signature,
                    timestamp_ms = excluded.timestamp_ms,
                    tags = excluded.tags
                "#,
            )
            .bind(&molecule.id)
            .bind(&molecule.compound_id)
            .bind(&molecule.content)
            .bind(molecule.sequence)
            .bind(molecule.start_byte as i64)
            .bind(molecule.end_byte as i64)
            .bind(molecule.kind.as_str())
            .bind(molecule.numeric_value)
            .bind(&molecule.unit)
            .bind(molecule.signature as i64)
            .bind(molecule.timestamp_ms)
            .bind(&compound.source_path)
            .bind(compound.provenance.as_str())
            .bind(&tags)
            .execute(pool)
        })
        .await?;
    }
    verify_ids(pool, "molecules", molecules.iter().map(|m| m.id.as_str())).await
}

async fn write_edge_batch(pool: &SqlitePool, edges: &[Edge]) -> Result<(), PersistError> {
    if edges.is_empty() {
        return Ok(());
    }
    for edge in edges {
        retrying(|| {
            sqlx::query(
                r#"
                INSERT INTO edges (source_id, target_id, relation, weight)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(source_id, target_id, relation) DO UPDATE SET weight = excluded.weight
                "#,
            )
            .bind(&edge.source_id)
            .bind(&edge.target_id)
            .bind(edge.relation.as_str())
            .bind(edge.weight)
            .execute(pool)
        })
        .await?;
    }
    verify_edge_ids(pool, edges).await
}

/// Ghost Data Protocol for `edges`: edges have no single `id` column, so
/// verification matches on the composite (source_id, target_id, relation) key.
async fn verify_edge_ids(pool: &SqlitePool, edges: &[Edge]) -> Result<(), PersistError> {
    let clause = edges.iter().map(|_| "(source_id = ? AND target_id = ? AND relation = ?)").collect::<Vec<_>>().join(" OR ");
    let sql = format!("SELECT COUNT(*) FROM edges WHERE {clause}");
    let mut query = sqlx::query_scalar(&sql);
    for edge in edges {
        query = query.bind(&edge.source_id).bind(&edge.target_id).bind(edge.relation.as_str());
    }
    let count: i64 = query.fetch_one(pool).await?;
    if count as usize != edges.len() {
        return Err(PersistError::VerifyFailed { expected: edges.len(), actual: count as usize });
    }
    Ok(())
}

/// Ghost Data Protocol: immediately re-read every id just written and fail
/// the batch if any are missing (`spec.md` §4.C, Standard 059).
async fn verify_ids<'a>(pool: &SqlitePool, table: &str, ids: impl Iterator<Item = &'a str>) -> Result<(), PersistError> {
    let ids: Vec<&str> = ids.collect();
    let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE id IN ({placeholders})");
    let mut query = sqlx::query_scalar(&sql);
    for id in &ids {
        query = query.bind(*id);
    }
    let count: i64 = query.fetch_one(pool).await?;
    if count as usize != ids.len() {
        return Err(PersistError::VerifyFailed { expected: ids.len(), actual: count as usize });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AtomKind, Provenance, RelationKind};

    fn sample_topology() -> Topology {
        let compound = Compound {
            id: "mem_test".into(),
            body: "alpha beta.".into(),
            source_path: "inbox/test.md".into(),
            ingested_at_ms: 0,
            provenance: Provenance::Internal,
            signature: 1,
            molecule_ids: vec!["mol_1".into()],
            atom_ids: vec!["atom_1".into()],
        };
        let atom = Atom { id: "atom_1".into(), label: "#doc".into(), kind: AtomKind::System, weight: 1.0 };
        let molecule = Molecule {
            id: "mol_1".into(),
            compound_id: "mem_test".into(),
            content: "alpha beta.".into(),
            sequence: 0,
            start_byte: 0,
            end_byte: 11,
            kind: crate::model::MoleculeKind::Prose,
            numeric_value: None,
            unit: None,
            signature: 1,
            timestamp_ms: 0,
            atom_ids: vec!["atom_1".into()],
        };
        let edge = Edge { source_id: "mol_1".into(), target_id: "atom_1".into(), relation: RelationKind::Tagged, weight: 1.0 };
        Topology { compound: Some(compound), molecules: vec![molecule], atoms: vec![atom], edges: vec![edge] }
    }

    #[tokio::test]
    async fn upsert_then_read_back_succeeds() {
        let backend = SqliteBackend::connect_in_memory().await.unwrap();
        backend.upsert_topology(&sample_topology(), 50).await.unwrap();

        let results = backend.search_anchor(&["alpha".to_string()], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, "mol_1");
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let backend = SqliteBackend::connect_in_memory().await.unwrap();
        backend.upsert_topology(&sample_topology(), 50).await.unwrap();
        backend.upsert_topology(&sample_topology(), 50).await.unwrap();

        let results = backend.search_anchor(&["alpha".to_string()], 10).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn quarantine_delete_removes_molecules() {
        let backend = SqliteBackend::connect_in_memory().await.unwrap();
        backend.upsert_topology(&sample_topology(), 50).await.unwrap();
        backend.quarantine_source("inbox/test.md", QuarantinePolicy::Delete).await.unwrap();

        let results = backend.search_anchor(&["alpha".to_string()], 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn source_registry_roundtrip() {
        let backend = SqliteBackend::connect_in_memory().await.unwrap();
        let record = SourceRecord { path: "inbox/a.md".into(), content_hash: "h1".into(), total_atoms: 3, last_ingest_ms: 100 };
        backend.upsert_source(&record).await.unwrap();
        let fetched = backend.get_source("inbox/a.md").await.unwrap().unwrap();
        assert_eq!(fetched.content_hash, "h1");

        let stale = backend.stale_paths(&[]).await.unwrap();
        assert_eq!(stale, vec!["inbox/a.md".to_string()]);
    }
}
