//! Follow-up question recommendations
//!
//! Asks a completion model for a short list of follow-up legal questions based
//! on a persisted answer. Malformed model output degrades to an empty list;
//! the caller never sees a parse failure.

use crate::llm::ChatCompletion;
use crate::prompt::ChatMessage;
use std::sync::Arc;
use tracing::warn;

const RECOMMEND_PROMPT: &str = "根据文本推荐3个与法律相关的问题，每个问题不超过15个字，\
问题前添加表情或相关符号，只返回JSON数组。\
示例：[\"🤔合同法保障的是什么？\",\"📃劳务合同纠纷如何处理？\",\"🔗侵权责任如何认定？\"]";

pub struct Recommender {
    llm: Arc<dyn ChatCompletion>,
}

impl Recommender {
    pub fn new(llm: Arc<dyn ChatCompletion>) -> Self {
        Self { llm }
    }

    /// Suggest follow-up questions for an answer; empty on any model failure
    pub async fn suggest(&self, answer: &str) -> Vec<String> {
        let messages = vec![
            ChatMessage::system(RECOMMEND_PROMPT),
            ChatMessage::user(format!("text: {}", answer)),
        ];

        let raw = match self.llm.complete(&messages).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("recommendation call failed: {}", e);
                return Vec::new();
            }
        };

        parse_suggestions(&raw)
    }
}

/// Parse the model output as a JSON string array, tolerating markdown code
/// fences; anything else yields no suggestions
pub fn parse_suggestions(raw: &str) -> Vec<String> {
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match serde_json::from_str::<Vec<String>>(trimmed) {
        Ok(items) => items,
        Err(e) => {
            warn!("unparseable recommendation output: {} - {}", e, trimmed);
            Vec::new()
        }
    }
}
