//! Vector index service client for the retrieval port.
//!
//! Two named indexes (`ocr`, `db`) for similarity search and ingestion,
//! plus the flat per-form-type rule listing used by the batch path.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use goodorder_core::{FormType, RetrievalError};
use goodorder_pipeline::{Fragment, IndexName, Retrieval};

pub struct VectorApiClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SearchResult {
    text: String,
    score: f32,
    #[serde(default)]
    metadata: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct RulesResponse {
    rules: Vec<String>,
}

impl VectorApiClient {
    /// `base_url` should be like `http://localhost:8003` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn index_error(index: IndexName, reason: impl Into<String>) -> RetrievalError {
        RetrievalError::Index {
            index: index.as_str().to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Retrieval for VectorApiClient {
    async fn retrieve(
        &self,
        query: &str,
        index: IndexName,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<Fragment>, RetrievalError> {
        let url = format!("{}/indexes/{index}/search", self.base_url);
        let payload = serde_json::json!({
            "query": query,
            "k": k,
            "score_threshold": score_threshold,
        });

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Self::index_error(index, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::index_error(
                index,
                format!("search returned {}: {body}", status.as_u16()),
            ));
        }

        let reply: SearchResponse = resp
            .json()
            .await
            .map_err(|e| Self::index_error(index, e.to_string()))?;
        info!(%index, count = reply.results.len(), "retrieved fragments");
        Ok(reply
            .results
            .into_iter()
            .map(|r| Fragment {
                text: r.text,
                score: r.score,
                metadata: r.metadata,
            })
            .collect())
    }

    async fn ingest(
        &self,
        text: &str,
        index: IndexName,
        metadata: serde_json::Map<String, Value>,
    ) -> Result<(), RetrievalError> {
        let url = format!("{}/indexes/{index}/documents", self.base_url);
        let payload = serde_json::json!({ "text": text, "metadata": metadata });

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Self::index_error(index, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::index_error(
                index,
                format!("ingest returned {}: {body}", status.as_u16()),
            ));
        }

        info!(%index, len = text.len(), "ingested document");
        Ok(())
    }

    async fn validation_rules(&self, form_type: FormType) -> Result<Vec<String>, RetrievalError> {
        let url = format!("{}/rules/{}", self.base_url, form_type.as_str());

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RetrievalError::Other(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RetrievalError::Other(format!(
                "rule listing returned {}: {body}",
                status.as_u16()
            )));
        }

        let reply: RulesResponse = resp
            .json()
            .await
            .map_err(|e| RetrievalError::Other(e.to_string()))?;
        info!(form_type = %form_type, count = reply.rules.len(), "listed validation rules");
        Ok(reply.rules)
    }
}
