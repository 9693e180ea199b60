//! Retrieval orchestrator
//!
//! Runs the optional grounding steps for one question and persists whatever
//! they produce. Every step is independently fallible: a failure or a
//! "not related" classification degrades to the absence of that artifact and
//! never aborts the turn.

pub mod extraction;
pub mod rag;
pub mod web;

use crate::store::{ArtifactKind, QuestionRecord, Store};
use std::sync::Arc;
use tracing::{debug, warn};

pub use extraction::{KeywordDecision, KeywordExtractor, LlmKeywordExtractor};
pub use rag::{DisabledRag, RagRetriever};
pub use web::{WebSearchBackend, WebSearchClient, WebSearchItem};

/// What retrieval produced for one question; `None` fields mean no grounding
/// of that kind is available
#[derive(Debug, Default)]
pub struct RetrievalOutcome {
    pub web: Option<Vec<WebSearchItem>>,
    pub rag: Option<String>,
}

pub struct RetrievalOrchestrator {
    store: Store,
    extractor: Arc<dyn KeywordExtractor>,
    web: Arc<dyn WebSearchBackend>,
    rag: Arc<dyn RagRetriever>,
}

impl RetrievalOrchestrator {
    pub fn new(
        store: Store,
        extractor: Arc<dyn KeywordExtractor>,
        web: Arc<dyn WebSearchBackend>,
        rag: Arc<dyn RagRetriever>,
    ) -> Self {
        Self {
            store,
            extractor,
            web,
            rag,
        }
    }

    pub async fn retrieve(&self, question: &QuestionRecord) -> RetrievalOutcome {
        let mut outcome = RetrievalOutcome::default();

        outcome.web = self.web_step(question).await;
        outcome.rag = self.rag_step(question).await;

        outcome
    }

    /// Keyword extraction then web search; any failure short-circuits to None
    async fn web_step(&self, question: &QuestionRecord) -> Option<Vec<WebSearchItem>> {
        let text = &question.content.user_question;

        let decision = match self.extractor.classify(text).await {
            Ok(d) => d,
            Err(e) => {
                warn!("keyword extraction failed, skipping web retrieval: {}", e);
                return None;
            }
        };

        if !decision.related || decision.keywords.is_empty() {
            debug!("question {} not related to web content", question.id);
            return None;
        }

        let joined = decision.keywords.join(" ");
        debug!("web search for question {}: {}", question.id, joined);

        let raw = match self.web.run(&joined).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("web search failed for question {}: {}", question.id, e);
                return None;
            }
        };

        let items = web::normalize(&raw);
        if items.is_empty() {
            debug!("web search returned no results for question {}", question.id);
            return None;
        }

        let payload = match serde_json::to_string(&items) {
            Ok(p) => p,
            Err(e) => {
                warn!("failed to serialize web artifact: {}", e);
                return None;
            }
        };

        if let Err(e) = self
            .store
            .add_artifact(question.id, ArtifactKind::Web, &payload)
            .await
        {
            warn!("failed to persist web artifact for question {}: {}", question.id, e);
        }

        Some(items)
    }

    async fn rag_step(&self, question: &QuestionRecord) -> Option<String> {
        match self.rag.retrieve(&question.content.user_question).await {
            Ok(Some(content)) => {
                if let Err(e) = self
                    .store
                    .add_artifact(question.id, ArtifactKind::Rag, &content)
                    .await
                {
                    warn!("failed to persist rag artifact for question {}: {}", question.id, e);
                }
                Some(content)
            }
            Ok(None) => {
                debug!("no rag result for question {}", question.id);
                None
            }
            Err(e) => {
                warn!("rag retrieval failed for question {}: {}", question.id, e);
                None
            }
        }
    }
}
