//! LLM server client for the oracle port.
//!
//! Speaks the Ollama-style generate API: one non-streaming completion per
//! call, raw text back. Defensive interpretation of that text is the
//! caller's job.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use goodorder_core::OracleError;
use goodorder_pipeline::Oracle;

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl LlmClient {
    /// `base_url` should be like `http://localhost:11434` (no trailing
    /// slash); `model` is the server-side model name.
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }
}

#[async_trait]
impl Oracle for LlmClient {
    async fn ask(&self, prompt: &str) -> Result<String, OracleError> {
        let url = format!("{}/api/generate", self.base_url);
        let payload = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        info!(url = %url, model = %self.model, prompt_len = prompt.len(), "querying LLM");
        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| OracleError::Other(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        info!(reply_len = reply.response.len(), "LLM reply received");
        Ok(reply.response)
    }
}
