//! Prompt assembler
//!
//! Builds the generation request from question content plus whatever retrieval
//! artifacts exist: exactly one system message followed by one user message.
//! The grounding block appears if and only if a web artifact is present.

use crate::store::{Artifacts, QuestionContent};
use serde::{Deserialize, Serialize};

/// Role-tagged message in the shape the generation API expects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

const SYSTEM_PERSONA: &str = "你是一名专业的法律智能助手。当提供了引用内容时，\
你需要先结合引用内容进行思考（给出参考的具体引用），再回答用户的问题；\
没有引用内容时，直接依据法律知识给出专业解答。";

pub fn assemble(content: &QuestionContent, artifacts: &Artifacts) -> Vec<ChatMessage> {
    let mut user = String::new();

    match &artifacts.web {
        Some(grounding) => {
            user.push_str("引用内容（请将涉及案例的部分依据以下检索结果作答）：\n");
            user.push_str(grounding);
            user.push_str("\n\n问题：");
            user.push_str(&content.user_question);
        }
        None => {
            user.push_str("请直接针对以下法律问题给出专业解答。\n问题：");
            user.push_str(&content.user_question);
        }
    }

    if let Some(ocr) = content.ocr_text.as_deref().filter(|t| !t.trim().is_empty()) {
        user.push_str("\n\n图片OCR识别结果：");
        user.push_str(ocr);
    }

    vec![ChatMessage::system(SYSTEM_PERSONA), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(ocr: Option<&str>) -> QuestionContent {
        QuestionContent {
            user_question: "劳动合同被单方解除怎么维权？".into(),
            ocr_text: ocr.map(String::from),
        }
    }

    #[test]
    fn one_system_then_one_user() {
        let messages = assemble(&content(None), &Artifacts::default());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn grounding_block_only_with_web_artifact() {
        let without = assemble(&content(None), &Artifacts::default());
        assert!(!without[1].content.contains("引用内容"));
        assert!(without[1].content.contains("劳动合同"));

        let artifacts = Artifacts {
            web: Some("[{\"title\":\"某劳动争议案\"}]".into()),
            rag: None,
        };
        let with = assemble(&content(None), &artifacts);
        assert!(with[1].content.contains("引用内容"));
        assert!(with[1].content.contains("某劳动争议案"));
        assert!(with[1].content.contains("劳动合同"));
    }

    #[test]
    fn ocr_appended_in_both_branches() {
        let plain = assemble(&content(Some("合同扫描件文本")), &Artifacts::default());
        assert!(plain[1].content.contains("图片OCR识别结果：合同扫描件文本"));

        let artifacts = Artifacts {
            web: Some("grounding".into()),
            rag: None,
        };
        let grounded = assemble(&content(Some("合同扫描件文本")), &artifacts);
        assert!(grounded[1].content.contains("图片OCR识别结果：合同扫描件文本"));
    }

    #[test]
    fn blank_ocr_is_omitted() {
        let messages = assemble(&content(Some("  ")), &Artifacts::default());
        assert!(!messages[1].content.contains("OCR"));
    }
}
