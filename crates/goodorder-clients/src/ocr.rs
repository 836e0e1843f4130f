//! OCR extraction client.
//!
//! Posts a document reference to the extraction endpoint and normalises
//! the returned field names, since the OCR service emits kebab-case keys
//! that differ from the names the policy system uses. Test-mode sources
//! skip the network entirely and return a canned fixture per form type.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use goodorder_core::{ExtractError, FieldMap, FormType};
use goodorder_pipeline::{DocumentSource, Extractor};

/// OCR field names that need renaming to their policy-system equivalents.
/// Keys not listed here pass through unchanged.
const FIELD_ALIASES: &[(&str, &str)] = &[
    ("contract-number", "contractNumber"),
    ("owner-signature-date", "ownerSignatureDate"),
    ("subsequent-guarantee-period", "guaranteePeriod"),
    ("owner-name", "ownerName"),
    ("owner-email-address", "emailAddress"),
    ("owner-phone-number", "phoneNumber"),
];

pub struct OcrClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ExtractionResponse {
    #[serde(rename = "extractionResults", default)]
    extraction_results: Vec<ExtractionItem>,
}

#[derive(Deserialize)]
struct ExtractionItem {
    #[serde(rename = "queryAlias")]
    query_alias: String,
    #[serde(rename = "queryResults", default)]
    query_results: Vec<QueryResult>,
}

#[derive(Deserialize)]
struct QueryResult {
    #[serde(rename = "queryAnswer", default)]
    query_answer: String,
}

impl OcrClient {
    /// `base_url` should be like `http://localhost:8001` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn extract_remote(&self, document: &str) -> Result<FieldMap, ExtractError> {
        let url = format!("{}/extract", self.base_url);
        info!(url = %url, document, "requesting OCR extraction");

        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "document": document }))
            .send()
            .await
            .map_err(|e| ExtractError::Other(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExtractError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        let raw: ExtractionResponse = resp
            .json()
            .await
            .map_err(|e| ExtractError::Other(e.to_string()))?;
        let fields = normalise_fields(raw);
        info!(count = fields.len(), "extraction complete");
        Ok(fields)
    }
}

/// Flatten the extraction result list into a field map, keeping only the
/// aliased queries and taking each query's first answer.
fn normalise_fields(raw: ExtractionResponse) -> FieldMap {
    let mut fields = FieldMap::new();
    for item in raw.extraction_results {
        let Some((_, renamed)) = FIELD_ALIASES
            .iter()
            .find(|(from, _)| *from == item.query_alias)
        else {
            continue;
        };
        let Some(first) = item.query_results.into_iter().next() else {
            continue;
        };
        fields.insert(renamed.to_string(), first.query_answer);
    }
    fields
}

/// Canned extraction output for test-mode runs, matching the documents
/// the downstream policy fixtures know about.
fn fixture(form_type: FormType) -> Result<FieldMap, ExtractError> {
    let mut fields = FieldMap::new();
    match form_type {
        FormType::Renewals => {
            fields.insert("contractNumber".to_string(), "571003597".to_string());
            fields.insert("ownerName".to_string(), "sarams, sarn".to_string());
            fields.insert("ownerSignatureDate".to_string(), "2026-08-12".to_string());
            fields.insert("guaranteePeriod".to_string(), "5".to_string());
            fields.insert("emailAddress".to_string(), "sarn.sarams@example.com".to_string());
            fields.insert("phoneNumber".to_string(), "555-0134".to_string());
            Ok(fields)
        }
        FormType::Withdrawals => {
            fields.insert("loanId".to_string(), "900114872".to_string());
            fields.insert("ownerName".to_string(), "Jane Smith".to_string());
            fields.insert("withdrawalAmount".to_string(), "2500.00".to_string());
            // The canned withdrawal form deliberately leaves the contact
            // phone blank so a rule check has something to flag.
            fields.insert("contactPhone".to_string(), String::new());
            Ok(fields)
        }
        FormType::Generic => Err(ExtractError::NoFixture(form_type.as_str().to_string())),
    }
}

#[async_trait]
impl Extractor for OcrClient {
    async fn extract(&self, source: &DocumentSource) -> Result<FieldMap, ExtractError> {
        match source {
            DocumentSource::Upload(document) => self.extract_remote(document).await,
            DocumentSource::Test(form_type) => fixture(*form_type),
        }
    }
}
