//! Web search capability and result normalization
//!
//! Calls the web-search tool API with the joined keywords and normalizes each
//! raw record into a stable shape. The published date is pattern-matched out
//! of the title when the record itself carries none.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Bounded timeout for the search call
const SEARCH_TIMEOUT: Duration = Duration::from_secs(300);

/// A normalized web search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

#[async_trait]
pub trait WebSearchBackend: Send + Sync {
    /// Run a search, returning the raw result records
    async fn run(&self, query: &str) -> Result<Vec<Value>>;
}

/// Client for the web-search-pro tool API
pub struct WebSearchClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl WebSearchClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl WebSearchBackend for WebSearchClient {
    async fn run(&self, query: &str) -> Result<Vec<Value>> {
        let body = serde_json::json!({
            "request_id": Uuid::new_v4().to_string(),
            "tool": "web-search-pro",
            "stream": false,
            "messages": [{ "role": "user", "content": query }],
        });

        let response = self
            .http
            .post(&self.base_url)
            .header("Authorization", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("web search error {}: {}", status, detail));
        }

        let json: Value = response.json().await?;

        // Results hide inside the tool_calls of the first choice
        let tool_calls = json["choices"][0]["message"]["tool_calls"]
            .as_array()
            .ok_or_else(|| anyhow!("web search response has no tool_calls"))?;

        let mut results = Vec::new();
        for call in tool_calls {
            if let Some(entries) = call.get("search_result").and_then(|r| r.as_array()) {
                results.extend(entries.iter().cloned());
            }
        }

        Ok(results)
    }
}

/// Normalize raw search records into [`WebSearchItem`]s
pub fn normalize(raw: &[Value]) -> Vec<WebSearchItem> {
    raw.iter()
        .map(|record| {
            let field = |name: &str| {
                record
                    .get(name)
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            };

            let title = field("title");
            let published_date = record
                .get("publish_date")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .or_else(|| extract_date(&title));

            WebSearchItem {
                content: field("content"),
                link: field("link"),
                icon: field("icon"),
                source: field("media"),
                title,
                published_date,
            }
        })
        .collect()
}

/// Pull a date out of free text; handles `2024-05-01`, `2024/5/1` and
/// `2024年5月1日`, normalized to `YYYY-MM-DD`
pub fn extract_date(text: &str) -> Option<String> {
    let re = Regex::new(r"(\d{4})[-/年](\d{1,2})[-/月](\d{1,2})日?").unwrap();
    let caps = re.captures(text)?;

    let year: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    Some(format!("{:04}-{:02}-{:02}", year, month, day))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_dates_in_common_formats() {
        assert_eq!(
            extract_date("最高法发布典型案例 2024-05-01"),
            Some("2024-05-01".into())
        );
        assert_eq!(
            extract_date("2023年7月9日 合同纠纷判决"),
            Some("2023-07-09".into())
        );
        assert_eq!(extract_date("判决书 2022/11/3"), Some("2022-11-03".into()));
        assert_eq!(extract_date("没有日期的标题"), None);
        assert_eq!(extract_date("编号 2024-99-99"), None);
    }

    #[test]
    fn normalize_maps_fields_and_dates() {
        let raw = vec![json!({
            "title": "某合同纠纷案 2024年3月15日",
            "content": "裁判要旨……",
            "link": "https://example.com/case",
            "icon": "https://example.com/icon.png",
            "media": "法院网",
        })];

        let items = normalize(&raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "法院网");
        assert_eq!(items[0].published_date.as_deref(), Some("2024-03-15"));
    }

    #[test]
    fn normalize_prefers_explicit_publish_date() {
        let raw = vec![json!({
            "title": "新闻 2024年1月1日",
            "publish_date": "2023-12-31",
        })];

        let items = normalize(&raw);
        assert_eq!(items[0].published_date.as_deref(), Some("2023-12-31"));
    }

    #[test]
    fn normalize_tolerates_missing_fields() {
        let items = normalize(&[json!({})]);
        assert_eq!(items.len(), 1);
        assert!(items[0].title.is_empty());
        assert!(items[0].published_date.is_none());
    }
}
