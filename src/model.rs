//! The Compound / Molecule / Atom / Edge graph.
//!
//! These are the four primary entities described in the data model: a
//! [`Compound`] is a whole ingested document, a [`Molecule`] is a
//! sentence/row/block-scale unit of retrieval, an [`Atom`] is a shared
//! concept/tag vertex, and an [`Edge`] is a typed relation between them.
//! [`SourceRecord`] backs the Source Registry's `(path -> content-hash)`
//! change-detection table.

use serde::{Deserialize, Serialize};

/// Origin label assigned exactly once at ingest time.
///
/// Mutated only by the explicit quarantine operation (invariant 7 in
/// `spec.md` §3): re-ingesting a changed path moves old molecules to
/// [`Provenance::Quarantine`], but nothing else ever rewrites this field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Internal,
    External,
    Quarantine,
    System,
}

impl Provenance {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Internal => "internal",
            Provenance::External => "external",
            Provenance::Quarantine => "quarantine",
            Provenance::System => "system",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internal" => Ok(Provenance::Internal),
            "external" => Ok(Provenance::External),
            "quarantine" => Ok(Provenance::Quarantine),
            "system" => Ok(Provenance::System),
            other => Err(format!("unknown provenance: {other}")),
        }
    }
}

/// The kind of content a [`Molecule`] holds, decided by the Atomizer's
/// type-detection pass (`spec.md` §4.B step 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoleculeKind {
    Prose,
    Code,
    Data,
}

impl MoleculeKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MoleculeKind::Prose => "prose",
            MoleculeKind::Code => "code",
            MoleculeKind::Data => "data",
        }
    }
}

impl std::fmt::Display for MoleculeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MoleculeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prose" => Ok(MoleculeKind::Prose),
            "code" => Ok(MoleculeKind::Code),
            "data" => Ok(MoleculeKind::Data),
            other => Err(format!("unknown molecule kind: {other}")),
        }
    }
}

/// The kind of graph vertex an [`Atom`] represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomKind {
    System,
    Concept,
}

impl AtomKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AtomKind::System => "system",
            AtomKind::Concept => "concept",
        }
    }
}

/// Typed directed relation between two graph entities.
///
/// Composite key is `(source, target, relation)`, matching the
/// `edges` table's primary key in `spec.md` §6.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Compound -> Atom
    HasTag,
    /// Molecule -> Atom
    Tagged,
}

impl RelationKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::HasTag => "has_tag",
            RelationKind::Tagged => "tagged",
        }
    }
}

impl std::str::FromStr for RelationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "has_tag" => Ok(RelationKind::HasTag),
            "tagged" => Ok(RelationKind::Tagged),
            other => Err(format!("unknown relation kind: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub relation: RelationKind,
    pub weight: f64,
}

/// A whole ingested document.
///
/// `id` is deterministic from `MD5(sanitized_body + source_path)` (see
/// [`crate::atomizer::compound_id`]), so re-ingesting identical content
/// from the same path always yields the same id (invariant 4, idempotent
/// ingestion).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Compound {
    pub id: String,
    pub body: String,
    pub source_path: String,
    pub ingested_at_ms: i64,
    pub provenance: Provenance,
    /// 64-bit SimHash over 2-gram shingles of `body`.
    pub signature: u64,
    pub molecule_ids: Vec<String>,
    pub atom_ids: Vec<String>,
}

/// A sentence, code block, or data row within a [`Compound`] — the unit
/// of retrieval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub id: String,
    pub compound_id: String,
    pub content: String,
    pub sequence: u32,
    pub start_byte: usize,
    pub end_byte: usize,
    pub kind: MoleculeKind,
    pub numeric_value: Option<f64>,
    pub unit: Option<String>,
    pub signature: u64,
    pub timestamp_ms: i64,
    pub atom_ids: Vec<String>,
}

impl Molecule {
    /// Byte length of the span this molecule claims in the compound body.
    #[must_use]
    pub fn len(&self) -> usize {
        self.end_byte.saturating_sub(self.start_byte)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start_byte >= self.end_byte
    }
}

/// A concept, tag, or system marker. Globally shared and deduplicated by
/// [`Atom::label`] (invariant 3: labels are the natural key).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub id: String,
    pub label: String,
    pub kind: AtomKind,
    pub weight: f64,
}

impl Atom {
    /// Derive the stable id for a label: `atom_` + first 16 hex chars of
    /// `SHA-256(label)`. Two atoms with the same label always collapse to
    /// the same id, which is what lets [`Atom`]s dedupe across molecules.
    #[must_use]
    pub fn id_for_label(label: &str) -> String {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(label.as_bytes());
        format!("atom_{}", hex::encode(&digest[..8]))
    }

    #[must_use]
    pub fn new(label: impl Into<String>, kind: AtomKind, weight: f64) -> Self {
        let label = label.into();
        Self {
            id: Self::id_for_label(&label),
            label,
            kind,
            weight,
        }
    }
}

/// `(relative_path, content-hash)` tracked by the Source Registry for
/// change detection (`spec.md` §4.D).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub path: String,
    pub content_hash: String,
    pub total_atoms: u64,
    pub last_ingest_ms: i64,
}

/// Per-repo tracking row backing `GET /v1/github/repos` (supplemental,
/// see `SPEC_FULL.md` §4.F).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GithubRepoRecord {
    pub id: String,
    pub url: String,
    pub bucket: String,
    pub branch: String,
    pub status: GithubRepoStatus,
    pub total_files: u64,
    pub total_atoms: u64,
    pub last_error: Option<String>,
    pub last_synced_ms: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GithubRepoStatus {
    Pending,
    Ingesting,
    Synced,
    Failed,
}

impl GithubRepoStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GithubRepoStatus::Pending => "pending",
            GithubRepoStatus::Ingesting => "ingesting",
            GithubRepoStatus::Synced => "synced",
            GithubRepoStatus::Failed => "failed",
        }
    }
}

/// Complete topology produced by the Atomizer for one document, ready to
/// hand to the Persistence Layer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Topology {
    pub compound: Option<Compound>,
    pub molecules: Vec<Molecule>,
    pub atoms: Vec<Atom>,
    pub edges: Vec<Edge>,
}
