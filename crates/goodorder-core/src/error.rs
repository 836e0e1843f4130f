//! Error taxonomy for the pipelines and their capability ports.
//!
//! Each port failure is typed; the pipelines convert port failures into a
//! [`StageError`] that names the stage where processing stopped. No error
//! ever escapes a pipeline — the terminal stage renders it as user text.

use thiserror::Error;

/// OCR / document extraction failures. Terminal in both pipelines.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("extraction endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("no test fixture for form type {0}")]
    NoFixture(String),

    #[error("{0}")]
    Other(String),
}

/// Vector-index failures. Terminal when ingesting chat context, degraded
/// (empty context) inside the per-rule retrieval loop.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("index {index} unavailable: {reason}")]
    Index { index: String, reason: String },

    #[error("{0}")]
    Other(String),
}

/// LLM call or malformed-output failures. Never terminal in validation or
/// comparison stages; terminal in the chat Classify stage.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("oracle endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("oracle output could not be parsed: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

/// External record lookup failures. Terminal in the batch pipeline,
/// permissive in the chat pipeline.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("record endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("no identifier field for form type {0}")]
    MissingIdentifier(String),

    #[error("{0}")]
    Other(String),
}

/// A port failure bound to the pipeline stage where it occurred. Once set
/// on a run, every downstream stage passes it through unchanged to the
/// response stage.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    #[error("OCR processing error: {0}")]
    Extraction(#[from] ExtractError),

    #[error("rule retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("context ingestion error: {0}")]
    Ingestion(RetrievalError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("record fetch error: {0}")]
    Fetch(#[from] FetchError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_renders_stage_context() {
        let err = StageError::from(ExtractError::Other("bad scan".into()));
        assert_eq!(err.to_string(), "OCR processing error: bad scan");

        let err = StageError::Ingestion(RetrievalError::Index {
            index: "db".into(),
            reason: "connection refused".into(),
        });
        assert!(err.to_string().starts_with("context ingestion error:"));
    }
}
