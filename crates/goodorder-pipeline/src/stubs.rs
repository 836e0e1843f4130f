//! In-memory port doubles for pipeline tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use goodorder_core::{
    ComparisonResult, ExtractError, FetchError, FieldMap, FormType, OracleError, Record,
    RetrievalError, UpdateOutcome, ValidationVerdict,
};

use crate::ports::{
    DocumentSource, Extractor, Fragment, IndexName, Oracle, RecordFetcher, RecordUpdater,
    Retrieval,
};

pub struct StubExtractor {
    result: Result<FieldMap, ExtractError>,
    calls: AtomicUsize,
}

impl StubExtractor {
    pub fn ok(fields: FieldMap) -> Self {
        Self {
            result: Ok(fields),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn err(error: ExtractError) -> Self {
        Self {
            result: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract(&self, _source: &DocumentSource) -> Result<FieldMap, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Retrieval double. Serves a fixed rule list, a fixed fragment set for
/// every query, and can be told to fail ingestion into one index.
pub struct StubRetrieval {
    rules: Result<Vec<String>, RetrievalError>,
    fragments: Vec<Fragment>,
    fail_ingest: Option<IndexName>,
    ingested: Mutex<Vec<(IndexName, String)>>,
    retrieve_calls: Mutex<Vec<(String, IndexName, usize, f32)>>,
}

impl StubRetrieval {
    pub fn with_rules(rules: Vec<String>) -> Self {
        Self {
            rules: Ok(rules),
            fragments: Vec::new(),
            fail_ingest: None,
            ingested: Mutex::new(Vec::new()),
            retrieve_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_rules(reason: &str) -> Self {
        let mut stub = Self::with_rules(Vec::new());
        stub.rules = Err(RetrievalError::Other(reason.to_string()));
        stub
    }

    pub fn failing_ingest(index: IndexName) -> Self {
        let mut stub = Self::with_rules(Vec::new());
        stub.fail_ingest = Some(index);
        stub
    }

    pub fn ingested(&self) -> Vec<(IndexName, String)> {
        self.ingested.lock().unwrap().clone()
    }

    pub fn retrieve_calls(&self) -> Vec<(String, IndexName, usize, f32)> {
        self.retrieve_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retrieval for StubRetrieval {
    async fn retrieve(
        &self,
        query: &str,
        index: IndexName,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<Fragment>, RetrievalError> {
        self.retrieve_calls
            .lock()
            .unwrap()
            .push((query.to_string(), index, k, score_threshold));
        Ok(self.fragments.clone())
    }

    async fn ingest(
        &self,
        text: &str,
        index: IndexName,
        _metadata: serde_json::Map<String, Value>,
    ) -> Result<(), RetrievalError> {
        if self.fail_ingest == Some(index) {
            return Err(RetrievalError::Index {
                index: index.as_str().to_string(),
                reason: "ingest refused".to_string(),
            });
        }
        self.ingested.lock().unwrap().push((index, text.to_string()));
        Ok(())
    }

    async fn validation_rules(&self, _form_type: FormType) -> Result<Vec<String>, RetrievalError> {
        self.rules.clone()
    }
}

/// Oracle double that replays a script of replies, then falls back to a
/// fixed answer (or a fixed failure) once the script is exhausted. Every
/// prompt is recorded for assertions.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String, OracleError>>>,
    fallback: Result<String, OracleError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn with_replies(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
            fallback: Err(OracleError::Other("script exhausted".to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Err(OracleError::Other(reason.to_string())),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_replies_then_fail(replies: Vec<&str>, reason: &str) -> Self {
        let mut stub = Self::with_replies(replies);
        stub.fallback = Err(OracleError::Other(reason.to_string()));
        stub
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn ask(&self, prompt: &str) -> Result<String, OracleError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => self.fallback.clone(),
        }
    }
}

pub struct StubFetcher {
    result: Result<Record, FetchError>,
    calls: Mutex<Vec<(FormType, String)>>,
}

impl StubFetcher {
    pub fn ok(record: Record) -> Self {
        Self {
            result: Ok(record),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn err(error: FetchError) -> Self {
        Self {
            result: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(FormType, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordFetcher for StubFetcher {
    async fn fetch(&self, form_type: FormType, id: &str) -> Result<Record, FetchError> {
        self.calls.lock().unwrap().push((form_type, id.to_string()));
        self.result.clone()
    }
}

pub struct StubUpdater {
    outcome: UpdateOutcome,
    calls: AtomicUsize,
}

impl StubUpdater {
    pub fn success(transaction_id: &str) -> Self {
        Self {
            outcome: UpdateOutcome {
                success: true,
                message: "Database successfully updated".to_string(),
                transaction_id: Some(transaction_id.to_string()),
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failure(message: &str) -> Self {
        Self {
            outcome: UpdateOutcome::failure(message),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordUpdater for StubUpdater {
    async fn update(
        &self,
        _form_type: FormType,
        _fields: &FieldMap,
        _verdict: &ValidationVerdict,
        _comparison: Option<&ComparisonResult>,
    ) -> UpdateOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}
