//! Immutable embedding index of precomputed case vectors
//!
//! Loaded once at startup and never mutated; concurrent reads need no
//! coordination. Vectors live in a raw little-endian f32 file aligned with a
//! metadata JSON array.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::cmp::Ordering;
use std::path::Path;

/// One case document with its precomputed embedding
#[derive(Debug, Clone)]
pub struct CaseRecord {
    pub index: usize,
    pub title: String,
    pub keywords: Vec<String>,
    pub summary_text: String,
    pub vector: Vec<f32>,
}

/// Metadata entry as stored on disk (vectors come from the companion file)
#[derive(Debug, Deserialize)]
struct CaseMeta {
    title: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    summary: String,
}

/// A ranked search result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCase {
    pub index: usize,
    pub score: f32,
}

/// The in-memory case corpus
pub struct CaseCorpus {
    records: Vec<CaseRecord>,
    dim: usize,
}

impl CaseCorpus {
    /// Load metadata JSON + raw f32 vector file, validating alignment
    pub fn load(metadata_path: &Path, vectors_path: &Path, dim: usize) -> Result<Self> {
        if dim == 0 {
            bail!("embedding dimension must be positive");
        }

        let meta_raw = std::fs::read_to_string(metadata_path)
            .with_context(|| format!("failed to read {}", metadata_path.display()))?;
        let metas: Vec<CaseMeta> =
            serde_json::from_str(&meta_raw).context("failed to parse case metadata")?;

        let bytes = std::fs::read(vectors_path)
            .with_context(|| format!("failed to read {}", vectors_path.display()))?;

        let expected = metas.len() * dim * 4;
        if bytes.len() != expected {
            bail!(
                "vector file is {} bytes, expected {} ({} cases x {} dims)",
                bytes.len(),
                expected,
                metas.len(),
                dim
            );
        }

        let mut floats = Vec::with_capacity(metas.len() * dim);
        for chunk in bytes.chunks_exact(4) {
            floats.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }

        let records = metas
            .into_iter()
            .enumerate()
            .map(|(index, meta)| CaseRecord {
                index,
                title: meta.title,
                keywords: meta.keywords,
                summary_text: meta.summary,
                vector: floats[index * dim..(index + 1) * dim].to_vec(),
            })
            .collect();

        Ok(Self { records, dim })
    }

    /// Build a corpus directly from records (used by tests and tooling)
    pub fn from_records(records: Vec<CaseRecord>) -> Self {
        let dim = records.first().map(|r| r.vector.len()).unwrap_or(0);
        Self { records, dim }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, index: usize) -> Option<&CaseRecord> {
        self.records.get(index)
    }

    /// Rank the whole corpus against a query vector and keep the top_k.
    ///
    /// Ordering is descending by score with ties broken by ascending case
    /// index, so equal scores always come back in a deterministic order.
    pub fn rank(&self, query: &[f32], top_k: usize) -> Vec<ScoredCase> {
        let mut scored: Vec<ScoredCase> = self
            .records
            .iter()
            .map(|r| ScoredCase {
                index: r.index,
                score: similarity::cosine(query, &r.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });

        scored.truncate(top_k);
        scored
    }
}

/// Vector math helpers
pub mod similarity {
    /// Cosine similarity between two vectors; 0.0 for mismatched or zero vectors
    pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot / (norm_a * norm_b)
    }

    /// L2-normalize a vector in place
    pub fn normalize(vector: &mut [f32]) {
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in vector.iter_mut() {
                *value /= norm;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize, vector: Vec<f32>) -> CaseRecord {
        CaseRecord {
            index,
            title: format!("case {}", index),
            keywords: vec![],
            summary_text: String::new(),
            vector,
        }
    }

    fn corpus() -> CaseCorpus {
        CaseCorpus::from_records(vec![
            record(0, vec![1.0, 0.0]),
            record(1, vec![0.0, 1.0]),
            record(2, vec![0.7071, 0.7071]),
        ])
    }

    #[test]
    fn rank_orders_by_descending_score() {
        let results = corpus().rank(&[1.0, 0.0], 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].index, 0);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn rank_breaks_ties_by_ascending_index() {
        // Both case 0 and case 1 score identically against the diagonal query
        let results = corpus().rank(&[1.0, 1.0], 3);
        assert_eq!(results[0].index, 2);
        assert_eq!(results[1].index, 0);
        assert_eq!(results[2].index, 1);
    }

    #[test]
    fn rank_handles_degenerate_top_k() {
        let c = corpus();
        assert!(c.rank(&[1.0, 0.0], 0).is_empty());
        assert_eq!(c.rank(&[1.0, 0.0], 100).len(), 3);
    }

    #[test]
    fn cosine_bounds() {
        let s = similarity::cosine(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((s + 1.0).abs() < 1e-6);
        assert_eq!(similarity::cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(similarity::cosine(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn load_aligns_metadata_with_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let meta_path = dir.path().join("cases.json");
        let vec_path = dir.path().join("vectors.f32");

        std::fs::write(
            &meta_path,
            r#"[{"title":"案例一","keywords":["合同"],"summary":"要旨一"},
                {"title":"案例二"}]"#,
        )
        .unwrap();

        let mut bytes = Vec::new();
        for value in [1.0f32, 0.0, 0.0, 1.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        std::fs::write(&vec_path, &bytes).unwrap();

        let corpus = CaseCorpus::load(&meta_path, &vec_path, 2).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.dim(), 2);
        assert_eq!(corpus.get(0).unwrap().title, "案例一");
        assert_eq!(corpus.get(0).unwrap().vector, vec![1.0, 0.0]);
        assert_eq!(corpus.get(1).unwrap().vector, vec![0.0, 1.0]);
        assert!(corpus.get(1).unwrap().keywords.is_empty());
    }

    #[test]
    fn load_rejects_misaligned_vector_file() {
        let dir = tempfile::tempdir().unwrap();
        let meta_path = dir.path().join("cases.json");
        let vec_path = dir.path().join("vectors.f32");

        std::fs::write(&meta_path, r#"[{"title":"案例一"}]"#).unwrap();
        std::fs::write(&vec_path, 1.0f32.to_le_bytes()).unwrap();

        assert!(CaseCorpus::load(&meta_path, &vec_path, 2).is_err());
        assert!(CaseCorpus::load(&meta_path, &vec_path, 0).is_err());
    }

    #[test]
    fn normalize_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        similarity::normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}
