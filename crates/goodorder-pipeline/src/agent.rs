//! The conversational rule agent.
//!
//! A state machine driven by a single user turn: classify the intent,
//! and either answer directly or run the per-rule validation loop —
//! extract, fetch the authoritative record, embed both into the vector
//! indexes, then check rules one at a time until the first failure. The
//! loop stops at the first NIGO decision; remaining rules are never
//! evaluated. Every turn, whatever its path, ends by recording the
//! exchange in session memory.

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use goodorder_core::{
    Decision, FieldMap, FormType, OracleReply, Outcome, Record, Rule, RuleCatalog, RuleDecision,
    StageError,
};

use crate::memory::SessionStore;
use crate::ports::{DocumentSource, Extractor, IndexName, Oracle, RecordFetcher, Retrieval};
use crate::prompts;

/// Retrieval shape for the per-rule loop. OCR context is trusted at a low
/// score, DB context only at a high one.
const RULE_CONTEXT_K: usize = 5;
const OCR_SCORE_THRESHOLD: f32 = 0.1;
const DB_SCORE_THRESHOLD: f32 = 0.5;

/// One user turn handed to the agent.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub user_text: String,
    /// When off, every turn takes the direct conversational path.
    pub decision_engine_enabled: bool,
    /// Absent or empty means a fresh conversation with a generated id.
    pub conversation_id: Option<String>,
    /// Fields already extracted by an earlier turn, reused instead of
    /// running OCR again.
    pub extracted_fields: Option<FieldMap>,
}

/// What one turn produced.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response_text: String,
    pub conversation_id: String,
    pub outcome: Outcome,
    pub decisions: Vec<RuleDecision>,
    pub extracted_fields: Option<FieldMap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentStage {
    Classify,
    Extract,
    FetchRecord,
    Embed,
    ValidateRule,
    FinalDecision,
    RespondDirect,
    Done,
}

struct AgentState {
    user_text: String,
    conversation_id: String,
    form_type: FormType,
    fields: Option<FieldMap>,
    record: Option<Record>,
    rule_queue: VecDeque<Rule>,
    decisions: Vec<RuleDecision>,
    failed_rule: Option<Rule>,
    last_raw_reply: Option<String>,
    outcome: Outcome,
    error: Option<StageError>,
    response: String,
}

impl AgentState {
    fn new(request: &AgentRequest) -> Self {
        let conversation_id = request
            .conversation_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            user_text: request.user_text.clone(),
            conversation_id,
            form_type: FormType::Generic,
            fields: request.extracted_fields.clone(),
            record: None,
            rule_queue: VecDeque::new(),
            decisions: Vec::new(),
            failed_rule: None,
            last_raw_reply: None,
            outcome: Outcome::Pending,
            error: None,
            response: String::new(),
        }
    }
}

/// Orchestrator for the conversational path.
pub struct RuleAgentPipeline {
    extractor: Arc<dyn Extractor>,
    retrieval: Arc<dyn Retrieval>,
    oracle: Arc<dyn Oracle>,
    fetcher: Arc<dyn RecordFetcher>,
    catalog: RuleCatalog,
    memory: Arc<SessionStore>,
}

impl RuleAgentPipeline {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        retrieval: Arc<dyn Retrieval>,
        oracle: Arc<dyn Oracle>,
        fetcher: Arc<dyn RecordFetcher>,
        memory: Arc<SessionStore>,
    ) -> Self {
        Self {
            extractor,
            retrieval,
            oracle,
            fetcher,
            catalog: RuleCatalog::builtin(),
            memory,
        }
    }

    /// Drive one turn to completion. Never fails: every port failure ends
    /// in a user-facing message, and the exchange is always recorded.
    pub async fn run(&self, request: AgentRequest) -> ChatOutcome {
        let mut state = AgentState::new(&request);
        info!(
            conversation_id = %state.conversation_id,
            engine = request.decision_engine_enabled,
            "starting chat turn"
        );

        let mut stage = if request.decision_engine_enabled {
            AgentStage::Classify
        } else {
            AgentStage::RespondDirect
        };
        while stage != AgentStage::Done {
            stage = self.step(stage, &mut state).await;
        }

        self.memory
            .record_exchange(&state.conversation_id, &state.user_text, &state.response);

        ChatOutcome {
            response_text: state.response,
            conversation_id: state.conversation_id,
            outcome: state.outcome,
            decisions: state.decisions,
            extracted_fields: state.fields,
        }
    }

    async fn step(&self, stage: AgentStage, state: &mut AgentState) -> AgentStage {
        match stage {
            AgentStage::Classify => self.classify(state).await,
            AgentStage::Extract => self.extract(state).await,
            AgentStage::FetchRecord => self.fetch_record(state).await,
            AgentStage::Embed => self.embed(state).await,
            AgentStage::ValidateRule => self.validate_rule(state).await,
            AgentStage::FinalDecision => self.final_decision(state).await,
            AgentStage::RespondDirect => self.respond_direct(state).await,
            AgentStage::Done => AgentStage::Done,
        }
    }

    /// Ask the oracle whether this turn is a validation request. A failure
    /// here is terminal for the turn: without a classification the agent
    /// cannot pick a path.
    async fn classify(&self, state: &mut AgentState) -> AgentStage {
        let prompt = prompts::classify(&state.user_text);
        match self.oracle.ask(&prompt).await {
            Ok(reply) if reply.to_lowercase().contains("yes") => {
                state.form_type = FormType::from_keywords(&state.user_text);
                info!(form_type = %state.form_type, "classified as a validation request");
                AgentStage::Extract
            }
            Ok(_) => AgentStage::RespondDirect,
            Err(e) => {
                warn!(error = %e, "classification failed");
                state.error = Some(e.into());
                AgentStage::RespondDirect
            }
        }
    }

    async fn extract(&self, state: &mut AgentState) -> AgentStage {
        if state.fields.is_some() {
            info!("reusing fields extracted on an earlier turn");
            return AgentStage::FetchRecord;
        }
        let source = document_source(&state.user_text, state.form_type);
        match self.extractor.extract(&source).await {
            Ok(fields) => {
                info!(count = fields.len(), "extracted fields");
                state.fields = Some(fields);
                AgentStage::FetchRecord
            }
            Err(e) => {
                warn!(error = %e, "extraction failed");
                state.error = Some(e.into());
                AgentStage::RespondDirect
            }
        }
    }

    /// Look up the authoritative record. Failures here are tolerated: the
    /// rule loop still runs, with an empty DB side.
    async fn fetch_record(&self, state: &mut AgentState) -> AgentStage {
        let id = state
            .fields
            .as_ref()
            .and_then(|fields| state.form_type.identifier_in(fields))
            .map(str::to_string);
        match id {
            Some(id) => match self.fetcher.fetch(state.form_type, &id).await {
                Ok(record) => {
                    info!(%id, "fetched authoritative record");
                    state.record = Some(record);
                }
                Err(e) => {
                    warn!(%id, error = %e, "record fetch failed, continuing without it");
                }
            },
            None => {
                warn!(form_type = %state.form_type, "no identifier found, continuing without a record");
            }
        }
        AgentStage::Embed
    }

    /// Ingest the extracted fields and the fetched record into their
    /// indexes and load the rule queue. An ingest failure is terminal:
    /// rules cannot be checked against a missing context.
    async fn embed(&self, state: &mut AgentState) -> AgentStage {
        let fields_text = state
            .fields
            .as_ref()
            .map(render_json_map)
            .unwrap_or_else(|| "{}".to_string());
        if let Err(e) = self
            .retrieval
            .ingest(&fields_text, IndexName::Ocr, source_metadata("ocr"))
            .await
        {
            warn!(error = %e, "OCR context ingest failed");
            state.error = Some(StageError::Ingestion(e));
            return AgentStage::FinalDecision;
        }

        let record_text = state
            .record
            .as_ref()
            .map(|r| serde_json::to_string_pretty(r).unwrap_or_else(|_| "{}".to_string()))
            .unwrap_or_else(|| "{}".to_string());
        if let Err(e) = self
            .retrieval
            .ingest(&record_text, IndexName::Db, source_metadata("db"))
            .await
        {
            warn!(error = %e, "DB context ingest failed");
            state.error = Some(StageError::Ingestion(e));
            return AgentStage::FinalDecision;
        }

        state.rule_queue = self
            .catalog
            .rules_for(state.form_type)
            .iter()
            .cloned()
            .collect();
        info!(rules = state.rule_queue.len(), "rule queue loaded");
        AgentStage::ValidateRule
    }

    /// Check the rule at the front of the queue. First NIGO wins; an
    /// empty queue means every rule passed.
    async fn validate_rule(&self, state: &mut AgentState) -> AgentStage {
        let Some(rule) = state.rule_queue.pop_front() else {
            state.outcome = Outcome::Igo;
            return AgentStage::FinalDecision;
        };

        let ocr_context = match self
            .retrieval
            .retrieve(
                &rule.retrieval_question,
                IndexName::Ocr,
                RULE_CONTEXT_K,
                OCR_SCORE_THRESHOLD,
            )
            .await
        {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!(rule = %rule.id, error = %e, "OCR retrieval failed, checking with empty context");
                Vec::new()
            }
        };
        let db_context = match self
            .retrieval
            .retrieve(
                &rule.retrieval_question,
                IndexName::Db,
                RULE_CONTEXT_K,
                DB_SCORE_THRESHOLD,
            )
            .await
        {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!(rule = %rule.id, error = %e, "DB retrieval failed, checking with empty context");
                Vec::new()
            }
        };

        let prompt = prompts::rule_check(&rule.id, &rule.description, &ocr_context, &db_context);
        let decision = match self.oracle.ask(&prompt).await {
            Ok(raw) => {
                let reply = OracleReply::parse(&raw);
                state.last_raw_reply = Some(raw);
                reply.rule_decision()
            }
            // The check could not be made at all; treat the rule as
            // failed rather than silently passing it.
            Err(e) => {
                warn!(rule = %rule.id, error = %e, "rule oracle call failed");
                state.last_raw_reply = None;
                Decision::Nigo {
                    reason: format!("validation check failed: {e}"),
                }
            }
        };

        let nigo = decision.is_nigo();
        info!(rule = %rule.id, nigo, "rule checked");
        state.decisions.push(RuleDecision {
            rule_id: rule.id.clone(),
            decision,
        });

        if nigo {
            state.outcome = Outcome::Nigo;
            state.failed_rule = Some(rule);
            AgentStage::FinalDecision
        } else if state.rule_queue.is_empty() {
            state.outcome = Outcome::Igo;
            AgentStage::FinalDecision
        } else {
            AgentStage::ValidateRule
        }
    }

    /// Turn the loop's outcome into conversational text. The summary call
    /// is best-effort: if the oracle fails here, a plain-text rendering of
    /// the same result is used instead.
    async fn final_decision(&self, state: &mut AgentState) -> AgentStage {
        if let Some(error) = &state.error {
            state.response = format!("I apologize, but I encountered an error: {error}");
            return AgentStage::Done;
        }

        let history = self.memory.history(&state.conversation_id);
        state.response = match state.outcome {
            Outcome::Nigo => {
                let rule_id = state
                    .failed_rule
                    .as_ref()
                    .map(|r| r.id.as_str())
                    .unwrap_or("unknown");
                let raw = state.last_raw_reply.as_deref().unwrap_or("NIGO");
                let prompt = prompts::nigo_summary(&history, rule_id, raw);
                match self.oracle.ask(&prompt).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "summary call failed, using plain rendering");
                        let reason = state
                            .decisions
                            .last()
                            .map(|d| match &d.decision {
                                Decision::Nigo { reason } => reason.clone(),
                                Decision::Ok => String::new(),
                            })
                            .unwrap_or_default();
                        format!("❌ Rule {rule_id} failed: {reason}")
                    }
                }
            }
            _ => {
                let empty = FieldMap::new();
                let fields = state.fields.as_ref().unwrap_or(&empty);
                let prompt = prompts::igo_confirmation(&history, fields);
                match self.oracle.ask(&prompt).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "summary call failed, using plain rendering");
                        format!(
                            "✅ The {} form is in good order and has been accepted for processing.",
                            state.form_type
                        )
                    }
                }
            }
        };
        AgentStage::Done
    }

    /// Conversational path: no rule loop, just a grounded reply.
    async fn respond_direct(&self, state: &mut AgentState) -> AgentStage {
        if let Some(error) = &state.error {
            state.response = format!("I apologize, but I encountered an error: {error}");
            return AgentStage::Done;
        }

        let history = self.memory.history(&state.conversation_id);
        let prompt = prompts::direct_reply(&history, &state.user_text, state.fields.as_ref());
        state.response = match self.oracle.ask(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "direct reply failed");
                match &state.fields {
                    Some(fields) => format!(
                        "I've analyzed the form and extracted the following data:\n{}",
                        render_json_map(fields)
                    ),
                    None => format!("I apologize, but I couldn't process your request: {e}"),
                }
            }
        };
        AgentStage::Done
    }
}

/// Pick the extraction source for a turn: an explicit `file:` reference in
/// the user text wins, otherwise the canned fixture for the form type.
fn document_source(user_text: &str, form_type: FormType) -> DocumentSource {
    if let Some(pos) = user_text.find("file:") {
        let rest = &user_text[pos + 5..];
        let path: String = rest
            .trim_start()
            .chars()
            .take_while(|c| !c.is_whitespace() && *c != ',')
            .collect();
        if !path.is_empty() {
            return DocumentSource::Upload(path);
        }
    }
    DocumentSource::Test(form_type)
}

fn render_json_map(fields: &FieldMap) -> String {
    serde_json::to_string_pretty(fields).unwrap_or_else(|_| "{}".to_string())
}

fn source_metadata(source: &str) -> serde_json::Map<String, Value> {
    let mut metadata = serde_json::Map::new();
    metadata.insert("source".to_string(), Value::String(source.to_string()));
    metadata
}
