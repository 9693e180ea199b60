//! Keyword classification + extraction
//!
//! Asks a completion model whether the question needs web grounding and, if
//! so, which search keywords to use. Any malformed output is an extraction
//! failure that the orchestrator treats as "no web retrieval".

use crate::llm::ChatCompletion;
use crate::prompt::ChatMessage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

const KEYWORD_EXTRACTION_PROMPT: &str = "请判断用户问题与涉及到法律的网络内容是否相关。\
如果是，请提取与问题相关的联网搜索关键词。\
如果问题与法律或者网络内容无关，请返回空关键词列表。\
严格按照输出格式：{\"related\": true/false, \"keywords\": [\"关键词1\", \"关键词2\"]}。";

/// Classification result for one question
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordDecision {
    pub related: bool,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    async fn classify(&self, text: &str) -> Result<KeywordDecision>;
}

pub struct LlmKeywordExtractor {
    llm: Arc<dyn ChatCompletion>,
}

impl LlmKeywordExtractor {
    pub fn new(llm: Arc<dyn ChatCompletion>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl KeywordExtractor for LlmKeywordExtractor {
    async fn classify(&self, text: &str) -> Result<KeywordDecision> {
        let messages = vec![
            ChatMessage::system("You are a helpful assistant."),
            ChatMessage::user(format!("{}用户问题：{}", KEYWORD_EXTRACTION_PROMPT, text)),
        ];

        let raw = self.llm.complete(&messages).await?;
        parse_decision(&raw)
    }
}

/// Parse the model output, tolerating markdown code fences around the JSON
pub fn parse_decision(raw: &str) -> Result<KeywordDecision> {
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(trimmed).context("keyword extraction output is not valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let decision =
            parse_decision(r#"{"related": true, "keywords": ["合同", "违约"]}"#).unwrap();
        assert!(decision.related);
        assert_eq!(decision.keywords, vec!["合同", "违约"]);
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"related\": false, \"keywords\": []}\n```";
        let decision = parse_decision(raw).unwrap();
        assert!(!decision.related);
        assert!(decision.keywords.is_empty());
    }

    #[test]
    fn missing_keywords_defaults_empty() {
        let decision = parse_decision(r#"{"related": true}"#).unwrap();
        assert!(decision.keywords.is_empty());
    }

    #[test]
    fn rejects_prose() {
        assert!(parse_decision("抱歉，我无法判断。").is_err());
    }
}
