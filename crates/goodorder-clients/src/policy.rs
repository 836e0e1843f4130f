//! Policy system client: authoritative record lookup and the post-
//! validation database update.
//!
//! Lookup failures are typed and surfaced to the pipelines. The update is
//! different: its port is infallible by contract, so transport and server
//! failures are folded into a failed [`UpdateOutcome`] here.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use goodorder_core::{
    ComparisonResult, FetchError, FieldMap, FormType, Record, UpdateOutcome, ValidationVerdict,
};
use goodorder_pipeline::{RecordFetcher, RecordUpdater};

pub struct PolicyApiClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct UpdateResponse {
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    transaction_id: Option<String>,
}

impl PolicyApiClient {
    /// `base_url` should be like `http://localhost:8002` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Renewals are keyed by contract number on a query endpoint; loans
    /// have a path endpoint of their own.
    fn record_url(&self, form_type: FormType, id: &str) -> Option<String> {
        match form_type {
            FormType::Renewals => Some(format!(
                "{}/policy/mass/accountinfo?contractnumber={id}",
                self.base_url
            )),
            FormType::Withdrawals => Some(format!("{}/loans/{id}", self.base_url)),
            FormType::Generic => None,
        }
    }
}

#[async_trait]
impl RecordFetcher for PolicyApiClient {
    async fn fetch(&self, form_type: FormType, id: &str) -> Result<Record, FetchError> {
        let url = self
            .record_url(form_type, id)
            .ok_or_else(|| FetchError::MissingIdentifier(form_type.as_str().to_string()))?;

        info!(url = %url, "fetching authoritative record");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Other(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| FetchError::Other(e.to_string()))?;
        match body {
            Value::Object(record) => Ok(record),
            other => Err(FetchError::Other(format!(
                "expected a JSON object record, got {other}"
            ))),
        }
    }
}

#[async_trait]
impl RecordUpdater for PolicyApiClient {
    async fn update(
        &self,
        form_type: FormType,
        fields: &FieldMap,
        verdict: &ValidationVerdict,
        comparison: Option<&ComparisonResult>,
    ) -> UpdateOutcome {
        let url = format!("{}/{}/update", self.base_url, form_type.as_str());
        let payload = serde_json::json!({
            "form_type": form_type.as_str(),
            "form_data": fields,
            "validated": verdict.valid,
            "validation_timestamp": Utc::now().to_rfc3339(),
            "comparison": comparison,
        });

        info!(url = %url, form_type = %form_type, "posting validated form data");
        let resp = match self.client.post(&url).json(&payload).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "update request failed");
                return UpdateOutcome::failure(format!("update request failed: {e}"));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "update rejected");
            return UpdateOutcome::failure(format!(
                "update endpoint returned {}: {body}",
                status.as_u16()
            ));
        }

        match resp.json::<UpdateResponse>().await {
            Ok(reply) => UpdateOutcome {
                success: reply.success,
                message: if reply.message.is_empty() {
                    "Database successfully updated".to_string()
                } else {
                    reply.message
                },
                transaction_id: reply.transaction_id,
            },
            Err(e) => UpdateOutcome::failure(format!("unreadable update response: {e}")),
        }
    }
}
