//! The Atomizer: deterministic decomposition of sanitized text into a
//! Compound/Molecule/Atom/Edge topology (`spec.md` §4.B).

mod fission;
mod simhash;
mod tags;

use aho_corasick::AhoCorasick;
use tracing::instrument;

use crate::model::{Atom, Compound, Edge, Molecule, Provenance, RelationKind, Topology};
use crate::sanitizer;

pub use simhash::{hamming_distance, simhash64};

/// Keyword registry consulted during per-molecule concept tagging
/// (`spec.md` §4.B step 8; §5 notes it is read-only after startup).
pub struct KeywordRegistry {
    keywords: Vec<String>,
    automaton: AhoCorasick,
}

impl KeywordRegistry {
    #[must_use]
    pub fn new(keywords: Vec<String>) -> Self {
        let automaton = tags::build_keyword_registry(&keywords);
        Self { keywords, automaton }
    }
}

impl Default for KeywordRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Decompose `raw` into a complete [`Topology`]: sanitize, then split into
/// Compound/Molecule/Atom/Edge per the type-specific fission rules.
///
/// Deterministic: identical `(raw, source_path)` always yields identical
/// ids and byte offsets. Total — never returns an error.
#[instrument(skip(raw, registry), fields(path = %source_path))]
pub fn atomize(
    raw: &[u8],
    source_path: &str,
    provenance: Provenance,
    max_molecule_bytes: usize,
    fallback_mtime_ms: i64,
    registry: &KeywordRegistry,
) -> Topology {
    let body = sanitizer::sanitize(raw, source_path);
    if body.is_empty() {
        return Topology::default();
    }

    let compound_id = compound_id(&body, source_path);
    let system_atoms = tags::system_atoms(source_path);

    let mut atoms_by_id: std::collections::HashMap<String, Atom> = std::collections::HashMap::new();
    for atom in &system_atoms {
        atoms_by_id.insert(atom.id.clone(), atom.clone());
    }

    let kind = tags::detect_kind(source_path, &body);
    let spans = fission::fission(&body, kind, max_molecule_bytes);

    let mut molecules = Vec::with_capacity(spans.len());
    let mut edges = Vec::new();
    let mut last_timestamp_ms = fallback_mtime_ms;
    let mut all_molecule_atom_ids: std::collections::HashSet<String> = std::collections::HashSet::new();

    for (sequence, span) in spans.into_iter().enumerate() {
        let content = &body[span.start..span.end];

        let timestamp_ms = fission::extract_timestamp_ms(content).unwrap_or(last_timestamp_ms);
        last_timestamp_ms = timestamp_ms;

        let (numeric_value, unit) = if kind == crate::model::MoleculeKind::Data {
            fission::extract_numeric(content).map_or((None, None), |(v, u)| (Some(v), u))
        } else {
            (None, None)
        };

        let concept_atoms = tags::concept_atoms(content, &registry.automaton, &registry.keywords);
        for atom in &concept_atoms {
            atoms_by_id.insert(atom.id.clone(), atom.clone());
        }

        let mut molecule_atom_ids: Vec<String> = system_atoms.iter().map(|a| a.id.clone()).collect();
        molecule_atom_ids.extend(concept_atoms.iter().map(|a| a.id.clone()));
        molecule_atom_ids.sort();
        molecule_atom_ids.dedup();
        all_molecule_atom_ids.extend(molecule_atom_ids.iter().cloned());

        let signature = simhash64(content);
        let molecule_id = molecule_id(&compound_id, sequence as u32, content);

        for atom_id in &molecule_atom_ids {
            edges.push(Edge {
                source_id: molecule_id.clone(),
                target_id: atom_id.clone(),
                relation: RelationKind::Tagged,
                weight: 1.0,
            });
        }

        molecules.push(Molecule {
            id: molecule_id,
            compound_id: compound_id.clone(),
            content: content.to_string(),
            sequence: sequence as u32,
            start_byte: span.start,
            end_byte: span.end,
            kind,
            numeric_value,
            unit,
            signature,
            timestamp_ms,
            atom_ids: molecule_atom_ids,
        });
    }

    for atom in &system_atoms {
        edges.push(Edge {
            source_id: compound_id.clone(),
            target_id: atom.id.clone(),
            relation: RelationKind::HasTag,
            weight: 1.0,
        });
    }

    let compound = Compound {
        id: compound_id,
        body: body.clone(),
        source_path: source_path.to_string(),
        ingested_at_ms: fallback_mtime_ms,
        provenance,
        signature: simhash64(&body),
        molecule_ids: molecules.iter().map(|m| m.id.clone()).collect(),
        atom_ids: all_molecule_atom_ids.into_iter().collect(),
    };

    Topology {
        compound: Some(compound),
        molecules,
        atoms: atoms_by_id.into_values().collect(),
        edges,
    }
}

/// `mem_` + MD5(sanitized_body + source_path) (`spec.md` §4.B step 2).
#[must_use]
pub fn compound_id(body: &str, source_path: &str) -> String {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(body.as_bytes());
    hasher.update(source_path.as_bytes());
    format!("mem_{:x}", hasher.finalize())
}

/// Hash of `compound_id + sequence + content`, giving each molecule a
/// stable identifier independent of its neighbors.
fn molecule_id(compound_id: &str, sequence: u32, content: &str) -> String {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(compound_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(content.as_bytes());
    format!("mol_{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MoleculeKind;

    fn registry() -> KeywordRegistry {
        KeywordRegistry::default()
    }

    #[test]
    fn scenario_idempotent_small_note() {
        let body = b"The quick brown fox jumps. The lazy dog sleeps.";
        let t1 = atomize(body, "inbox/note.md", Provenance::Internal, 1024, 0, &registry());
        let t2 = atomize(body, "inbox/note.md", Provenance::Internal, 1024, 0, &registry());
        assert_eq!(t1.compound.as_ref().unwrap().id, t2.compound.as_ref().unwrap().id);
        assert_eq!(
            t1.molecules.iter().map(|m| &m.id).collect::<Vec<_>>(),
            t2.molecules.iter().map(|m| &m.id).collect::<Vec<_>>()
        );
        assert_eq!(t1.molecules.len(), 2);
    }

    #[test]
    fn molecule_spans_are_byte_exact() {
        let body_bytes = b"alpha beta gamma. Delta epsilon.";
        let topology = atomize(body_bytes, "inbox/x.md", Provenance::Internal, 1024, 0, &registry());
        let compound = topology.compound.unwrap();
        for molecule in &topology.molecules {
            assert_eq!(&compound.body[molecule.start_byte..molecule.end_byte], molecule.content);
        }
    }

    #[test]
    fn system_atoms_attach_to_compound_via_has_tag_edge() {
        let topology = atomize(b"hello world.", "src/proj/note.md", Provenance::Internal, 1024, 0, &registry());
        let compound_id = topology.compound.as_ref().unwrap().id.clone();
        assert!(topology
            .edges
            .iter()
            .any(|e| e.source_id == compound_id && e.relation == RelationKind::HasTag));
    }

    #[test]
    fn data_rows_get_numeric_extraction() {
        let topology = atomize(b"name,amount\nwidgets,42.5kg\n", "data/rows.csv", Provenance::Internal, 1024, 0, &registry());
        assert!(topology.molecules.iter().any(|m| m.kind == MoleculeKind::Data && m.numeric_value.is_some()));
    }

    #[test]
    fn empty_input_yields_empty_topology() {
        let topology = atomize(b"", "inbox/empty.md", Provenance::Internal, 1024, 0, &registry());
        assert!(topology.compound.is_none());
        assert!(topology.molecules.is_empty());
    }
}
