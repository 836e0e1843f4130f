//! Capability ports consumed by the pipelines.
//!
//! Each port is a narrow async trait over an external collaborator — OCR
//! extraction, vector retrieval, the LLM oracle, and the policy system.
//! Implementations live in `goodorder-clients`; the pipelines receive them
//! as injected `Arc<dyn …>` handles and never construct them. No port call
//! is retried or timed out here: each is assumed to return a success or a
//! typed failure, with any deadline imposed by the implementation.

use async_trait::async_trait;
use serde_json::Value;

use goodorder_core::{
    ComparisonResult, ExtractError, FetchError, FieldMap, FormType, OracleError, Record,
    RetrievalError, UpdateOutcome, ValidationVerdict,
};

/// What to run extraction against: an uploaded document reference, or the
/// canned fixture for a form type when running in test mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Upload(String),
    Test(FormType),
}

/// OCR extraction capability.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, source: &DocumentSource) -> Result<FieldMap, ExtractError>;
}

/// The two retrieval namespaces: one holds the OCR-extracted text, the
/// other the authoritative record text. DB context is noisier, so callers
/// query it with a higher score threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexName {
    Ocr,
    Db,
}

impl IndexName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ocr => "ocr",
            Self::Db => "db",
        }
    }
}

impl std::fmt::Display for IndexName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retrieved text fragment with its similarity score.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub text: String,
    pub score: f32,
    pub metadata: serde_json::Map<String, Value>,
}

/// Vector retrieval capability: two named indexes plus the flat rule-text
/// lookup used by the batch validation path.
#[async_trait]
pub trait Retrieval: Send + Sync {
    /// Top-k fragments for a query, filtered to `score >= score_threshold`.
    async fn retrieve(
        &self,
        query: &str,
        index: IndexName,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<Fragment>, RetrievalError>;

    /// Ingest text into a named index.
    async fn ingest(
        &self,
        text: &str,
        index: IndexName,
        metadata: serde_json::Map<String, Value>,
    ) -> Result<(), RetrievalError>;

    /// Flat validation-rule texts applicable to a form type.
    async fn validation_rules(&self, form_type: FormType) -> Result<Vec<String>, RetrievalError>;
}

/// The language-model oracle: raw text in, raw text out. Callers parse
/// the reply defensively via [`goodorder_core::OracleReply`].
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn ask(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Authoritative record lookup in the external policy system.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    async fn fetch(&self, form_type: FormType, id: &str) -> Result<Record, FetchError>;
}

/// Downstream database update. Infallible by contract: transport and
/// server failures are folded into the returned outcome.
#[async_trait]
pub trait RecordUpdater: Send + Sync {
    async fn update(
        &self,
        form_type: FormType,
        fields: &FieldMap,
        verdict: &ValidationVerdict,
        comparison: Option<&ComparisonResult>,
    ) -> UpdateOutcome;
}
