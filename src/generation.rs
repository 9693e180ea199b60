//! Streaming generation client
//!
//! Wraps the external agent-app completion API. A call takes the assembled
//! messages plus an optional continuity token and yields incremental text
//! fragments over a channel, ending with either a `Done` event carrying the
//! new continuity token or an `Error`.

use crate::prompt::ChatMessage;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Incremental event from the generation stream
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Text fragment - forward to the caller immediately
    Fragment(String),

    /// Stream completed; carries the continuity token for the next turn
    Done { continuity_token: Option<String> },

    /// Upstream reported a non-success status mid-stream
    Error(String),
}

/// Seam over the external generation capability
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn call(
        &self,
        messages: &[ChatMessage],
        continuity_token: Option<&str>,
    ) -> Result<mpsc::Receiver<StreamEvent>>;
}

/// Client for the hosted agent-app completion API
pub struct AgentClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    app_id: String,
}

impl AgentClient {
    pub fn new(base_url: String, api_key: String, app_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            app_id,
        }
    }

    fn build_body(&self, messages: &[ChatMessage], continuity_token: Option<&str>) -> Value {
        let mut input = serde_json::json!({ "messages": messages });
        if let Some(token) = continuity_token {
            input["session_id"] = Value::String(token.to_string());
        }

        serde_json::json!({
            "input": input,
            "parameters": { "incremental_output": true },
        })
    }
}

#[async_trait]
impl GenerationBackend for AgentClient {
    async fn call(
        &self,
        messages: &[ChatMessage],
        continuity_token: Option<&str>,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let url = format!(
            "{}/apps/{}/completion",
            self.base_url.trim_end_matches('/'),
            self.app_id
        );
        let body = self.build_body(messages, continuity_token);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-DashScope-SSE", "enable")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("generation API error {}: {}", status, detail));
        }

        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(async move {
            let mut lines = SseStream::new(response.bytes_stream());
            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                        return;
                    }
                };

                for event in parse_sse_line(&line) {
                    let terminal =
                        matches!(event, StreamEvent::Done { .. } | StreamEvent::Error(_));
                    if tx.send(event).await.is_err() {
                        debug!("generation stream receiver dropped");
                        return;
                    }
                    if terminal {
                        return;
                    }
                }
            }
            // Upstream closed without a terminal event; treat as a failure so
            // the controller does not update continuity
            warn!("generation stream ended without completion event");
            let _ = tx
                .send(StreamEvent::Error("stream ended unexpectedly".into()))
                .await;
        });

        Ok(rx)
    }
}

/// Parse one SSE line into zero or more events.
///
/// A terminal payload may carry both a last text fragment and the stop
/// signal, so this returns a list rather than a single event.
pub fn parse_sse_line(line: &str) -> Vec<StreamEvent> {
    let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
        return Vec::new();
    };
    if data.is_empty() || data == "[DONE]" {
        return Vec::new();
    }

    let json: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            warn!("unparseable SSE payload: {} - {}", e, data);
            return Vec::new();
        }
    };

    if let Some(code) = json.get("code").and_then(|c| c.as_str()).filter(|c| !c.is_empty()) {
        let message = json
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return vec![StreamEvent::Error(format!("{}: {}", code, message))];
    }

    let Some(output) = json.get("output") else {
        return Vec::new();
    };

    let mut events = Vec::new();
    if let Some(text) = output.get("text").and_then(|t| t.as_str()).filter(|t| !t.is_empty()) {
        events.push(StreamEvent::Fragment(text.to_string()));
    }

    let finished = output
        .get("finish_reason")
        .and_then(|f| f.as_str())
        .map(|f| f == "stop")
        .unwrap_or(false);
    if finished {
        let continuity_token = output
            .get("session_id")
            .and_then(|s| s.as_str())
            .map(String::from);
        events.push(StreamEvent::Done { continuity_token });
    }

    events
}

/// Buffered SSE stream that splits the byte stream on line boundaries
struct SseStream {
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: String,
}

impl SseStream {
    fn new(inner: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(inner),
            buffer: String::new(),
        }
    }
}

impl Stream for SseStream {
    type Item = Result<String>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;
        let this = self.get_mut();

        loop {
            if let Some(newline_pos) = this.buffer.find('\n') {
                let line = this.buffer[..newline_pos].trim_end_matches('\r').to_string();
                this.buffer.drain(..=newline_pos);
                return Poll::Ready(Some(Ok(line)));
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.push_str(&String::from_utf8_lossy(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(anyhow!("stream error: {}", e))));
                }
                Poll::Ready(None) => {
                    if this.buffer.is_empty() {
                        return Poll::Ready(None);
                    }
                    let line = std::mem::take(&mut this.buffer);
                    return Poll::Ready(Some(Ok(line.trim_end_matches('\r').to_string())));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
