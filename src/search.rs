//! Case search service: query normalization + encoding + corpus ranking
//!
//! Read-only and side-effect-free; safe to call concurrently since the corpus
//! is immutable after load.

use crate::corpus::CaseCorpus;
use crate::encoder::QueryEncoder;
use crate::error::ServiceError;
use serde::Serialize;
use std::sync::Arc;

/// One ranked search result with the case metadata attached
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub doc_id: usize,
    pub title: String,
    pub keywords: Vec<String>,
    pub summary: String,
    pub score: f32,
}

pub struct CaseSearchService {
    corpus: Arc<CaseCorpus>,
    encoder: Arc<dyn QueryEncoder>,
}

impl CaseSearchService {
    pub fn new(corpus: Arc<CaseCorpus>, encoder: Arc<dyn QueryEncoder>) -> Self {
        Self { corpus, encoder }
    }

    pub fn corpus_size(&self) -> usize {
        self.corpus.len()
    }

    /// Rank the corpus against a free-text query.
    ///
    /// Returns `min(top_k, corpus size)` results sorted by descending score,
    /// ties broken by ascending case index. An empty or whitespace-only query
    /// is rejected before any encoding happens.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, ServiceError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Err(ServiceError::Validation("query must not be empty".into()));
        }

        let vector = self.encoder.encode(&normalized).await?;
        let ranked = self.corpus.rank(&vector, top_k);

        let hits = ranked
            .into_iter()
            .filter_map(|scored| {
                let record = self.corpus.get(scored.index)?;
                Some(SearchHit {
                    doc_id: record.index,
                    title: record.title.clone(),
                    keywords: record.keywords.clone(),
                    summary: record.summary_text.clone(),
                    score: scored.score,
                })
            })
            .collect();

        Ok(hits)
    }
}

/// Collapse newlines and runs of whitespace into single spaces, then trim.
/// Matches the preprocessing used when the corpus embeddings were generated.
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_query("合同\n纠纷  如何处理"), "合同 纠纷 如何处理");
        assert_eq!(normalize_query("  spaced   out \n"), "spaced out");
        assert_eq!(normalize_query(" \n\t "), "");
    }
}
