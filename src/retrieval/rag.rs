//! RAG retrieval seam
//!
//! RAG grounding is a first-class optional artifact kind with the same
//! "absence is valid" semantics as web search. The default implementation is
//! disabled and always yields the no-result state; a real retriever slots in
//! behind the trait without touching the orchestrator.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait RagRetriever: Send + Sync {
    /// Retrieve grounding content for a question; `Ok(None)` means no result
    async fn retrieve(&self, question: &str) -> Result<Option<String>>;
}

/// Placeholder retriever used until a knowledge base is wired up
pub struct DisabledRag;

#[async_trait]
impl RagRetriever for DisabledRag {
    async fn retrieve(&self, _question: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
