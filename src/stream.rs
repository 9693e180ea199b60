//! Stream controller
//!
//! Runs one generation turn: forwards fragments to the caller as they arrive
//! while accumulating the full answer, then performs exactly one persistence
//! step on any termination path (completion, upstream failure, or caller
//! disconnect) and schedules background summarization. The consume loop runs
//! on its own task so a dropped caller never prevents persistence, and the
//! caller stream closes only after the answer and continuity token are
//! written, so a serialized caller always reads its own turn's token.

use crate::engine::ConversationEngine;
use crate::error::ServiceError;
use crate::generation::StreamEvent;
use crate::prompt::ChatMessage;
use crate::store::{QuestionRecord, Store};
use crate::summary::Summarizer;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Channel capacity for caller-bound fragments
const FRAGMENT_BUFFER: usize = 64;

pub struct StreamController {
    store: Store,
    engine: Arc<ConversationEngine>,
    summarizer: Arc<Summarizer>,
}

impl StreamController {
    pub fn new(store: Store, engine: Arc<ConversationEngine>, summarizer: Arc<Summarizer>) -> Self {
        Self {
            store,
            engine,
            summarizer,
        }
    }

    /// Start the turn and hand back the caller-facing fragment stream.
    ///
    /// The receiver yields fragments in arrival order and closes once the
    /// answer and continuity token are durably written. Bookkeeping continues
    /// even if the receiver is dropped early.
    pub async fn run(
        &self,
        question: QuestionRecord,
        messages: Vec<ChatMessage>,
    ) -> Result<mpsc::Receiver<String>, ServiceError> {
        let mut upstream = self
            .engine
            .open_stream(&question.session_id, &messages)
            .await?;

        let (tx, rx) = mpsc::channel::<String>(FRAGMENT_BUFFER);
        let store = self.store.clone();
        let summarizer = Arc::clone(&self.summarizer);

        tokio::spawn(async move {
            let mut answer = String::new();
            let mut continuity_token: Option<String> = None;
            let mut caller_gone = false;

            while let Some(event) = upstream.recv().await {
                match event {
                    StreamEvent::Fragment(text) => {
                        answer.push_str(&text);
                        if !caller_gone && tx.send(text).await.is_err() {
                            caller_gone = true;
                            debug!(
                                "caller disconnected from question {}, continuing accumulation",
                                question.id
                            );
                        }
                    }
                    StreamEvent::Done { continuity_token: token } => {
                        continuity_token = token;
                        break;
                    }
                    StreamEvent::Error(message) => {
                        warn!("generation failed for question {}: {}", question.id, message);
                        break;
                    }
                }
            }

            // Persist before closing the caller stream: a caller that waits
            // for the stream to close may immediately open the next turn, and
            // that turn must see this turn's continuity token
            persist_answer(&store, question.id, &answer).await;

            if let Some(token) = continuity_token {
                if let Err(e) = store.upsert_continuity(&question.session_id, &token).await {
                    warn!(
                        "failed to persist continuity for session {}: {}",
                        question.session_id, e
                    );
                }
            }

            drop(tx);

            summarizer.schedule(question.id, answer);
        });

        Ok(rx)
    }
}

/// Write the accumulated answer with one inline retry; a best-effort warning
/// is all that remains if both attempts fail
async fn persist_answer(store: &Store, question_id: i64, answer: &str) {
    for attempt in 0..2 {
        match store.set_answer(question_id, answer).await {
            Ok(()) => return,
            Err(e) => warn!(
                "failed to persist answer for question {} (attempt {}): {}",
                question_id,
                attempt + 1,
                e
            ),
        }
    }
    warn!("answer for question {} was not durably saved", question_id);
}
