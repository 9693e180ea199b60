//! Background answer summarization
//!
//! Fire-and-forget: scheduled after the answer is persisted, detached from
//! the request lifecycle, retried a bounded number of times and then dropped.
//! Failures are logged and never reach the caller.

use crate::llm::ChatCompletion;
use crate::prompt::ChatMessage;
use crate::store::Store;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const SUMMARY_RETRY_ATTEMPTS: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_millis(500);

const SUMMARY_INSTRUCTION: &str =
    "summarize the following text into a concise summary, without repeating the text";

pub struct Summarizer {
    store: Store,
    llm: Arc<dyn ChatCompletion>,
}

impl Summarizer {
    pub fn new(store: Store, llm: Arc<dyn ChatCompletion>) -> Self {
        Self { store, llm }
    }

    /// Schedule summarization of a persisted answer on a detached task
    pub fn schedule(self: &Arc<Self>, question_id: i64, answer: String) {
        if answer.trim().is_empty() {
            debug!("question {}: empty answer, skipping summarization", question_id);
            return;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            for attempt in 0..=SUMMARY_RETRY_ATTEMPTS {
                if attempt > 0 {
                    tokio::time::sleep(RETRY_DELAY).await;
                }

                match this.summarize_once(question_id, &answer).await {
                    Ok(()) => {
                        info!("summary saved for question {}", question_id);
                        return;
                    }
                    Err(e) => {
                        warn!(
                            "summarization attempt {} failed for question {}: {}",
                            attempt + 1,
                            question_id,
                            e
                        );
                    }
                }
            }
            warn!("dropping summarization for question {} after retries", question_id);
        });
    }

    async fn summarize_once(&self, question_id: i64, answer: &str) -> Result<()> {
        let messages = vec![
            ChatMessage::system(SUMMARY_INSTRUCTION),
            ChatMessage::user(answer),
        ];

        let summary = self.llm.complete(&messages).await?;
        self.store.set_summary(question_id, &summary).await?;
        Ok(())
    }
}
