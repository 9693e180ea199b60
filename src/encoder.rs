//! Query encoder: text -> normalized embedding vector
//!
//! The HTTP client targets an OpenAI-compatible embeddings endpoint and
//! retries transient failures a bounded number of times.

use crate::corpus::similarity;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const EMBED_RETRY_ATTEMPTS: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Seam for turning query text into a vector comparable to the corpus
#[async_trait]
pub trait QueryEncoder: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embeddings API client
pub struct HttpQueryEncoder {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl HttpQueryEncoder {
    pub fn new(base_url: String, api_key: String, model: String, dimensions: usize) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url,
            api_key,
            model,
            dimensions,
        }
    }

    async fn fetch(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "dimensions": self.dimensions,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("embeddings API error {}: {}", status, detail));
        }

        let json: serde_json::Value = response.json().await?;
        let vector: Vec<f32> = json["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| anyhow!("invalid embeddings response"))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        if vector.len() != self.dimensions {
            return Err(anyhow!(
                "embedding has {} dims, expected {}",
                vector.len(),
                self.dimensions
            ));
        }

        Ok(vector)
    }
}

#[async_trait]
impl QueryEncoder for HttpQueryEncoder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut last_error = None;
        for attempt in 0..=EMBED_RETRY_ATTEMPTS {
            if attempt > 0 {
                tracing::debug!("retrying embed (attempt {})", attempt + 1);
                tokio::time::sleep(RETRY_DELAY).await;
            }

            match self.fetch(text).await {
                Ok(mut vector) => {
                    similarity::normalize(&mut vector);
                    return Ok(vector);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("embedding failed after retries")))
    }
}
