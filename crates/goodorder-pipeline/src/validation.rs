//! The batch form-validation pipeline.
//!
//! A linear state machine: extract → retrieve rules → validate → fetch
//! record → compare → update → respond. Each stage is a named transition
//! over the run state and returns the next stage; conditional edges are
//! explicit branches. A stage that cannot produce a meaningful result sets
//! the terminal error and jumps to Respond — the pipeline always ends with
//! user-facing text, never a propagated fault.

use std::sync::Arc;

use tracing::{info, warn};

use goodorder_core::{
    ComparisonResult, FetchError, FieldMap, FormType, OracleReply, Outcome, Record, RuleCheck,
    StageError, UpdateOutcome, ValidationVerdict,
};

use crate::ports::{DocumentSource, Extractor, Oracle, RecordFetcher, RecordUpdater, Retrieval};
use crate::prompts;

/// Input to a batch validation run.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub form_type: FormType,
    pub source: DocumentSource,
}

/// Everything a run produced, surfaced to the caller.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub outcome: Outcome,
    pub response_text: String,
    pub extracted_fields: FieldMap,
    pub checks: Vec<RuleCheck>,
    pub record: Option<Record>,
    pub comparison: Option<ComparisonResult>,
    pub update: Option<UpdateOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Extract,
    RetrieveRules,
    Validate,
    FetchRecord,
    Compare,
    Update,
    Respond,
    Done,
}

/// Mutable state threaded through one run. Fields accumulate as stages
/// succeed; once `error` is set no stage touches them again.
struct RunState {
    form_type: FormType,
    source: DocumentSource,
    fields: FieldMap,
    rule_texts: Vec<String>,
    verdict: Option<ValidationVerdict>,
    outcome: Outcome,
    record: Option<Record>,
    comparison: Option<ComparisonResult>,
    update: Option<UpdateOutcome>,
    error: Option<StageError>,
    response: String,
}

impl RunState {
    fn new(request: ValidationRequest) -> Self {
        Self {
            form_type: request.form_type,
            source: request.source,
            fields: FieldMap::new(),
            rule_texts: Vec::new(),
            verdict: None,
            outcome: Outcome::Pending,
            record: None,
            comparison: None,
            update: None,
            error: None,
            response: String::new(),
        }
    }
}

/// Orchestrator for the batch form path. All collaborators are injected;
/// the pipeline owns no I/O of its own.
pub struct ValidationPipeline {
    extractor: Arc<dyn Extractor>,
    retrieval: Arc<dyn Retrieval>,
    oracle: Arc<dyn Oracle>,
    fetcher: Arc<dyn RecordFetcher>,
    updater: Arc<dyn RecordUpdater>,
}

impl ValidationPipeline {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        retrieval: Arc<dyn Retrieval>,
        oracle: Arc<dyn Oracle>,
        fetcher: Arc<dyn RecordFetcher>,
        updater: Arc<dyn RecordUpdater>,
    ) -> Self {
        Self {
            extractor,
            retrieval,
            oracle,
            fetcher,
            updater,
        }
    }

    /// Run the pipeline to completion. Never fails: every external-call
    /// failure is converted into either a terminal error rendered by the
    /// response stage or a degraded structured result.
    pub async fn run(&self, request: ValidationRequest) -> ValidationReport {
        info!(form_type = %request.form_type, "starting validation run");
        let mut state = RunState::new(request);
        let mut stage = Stage::Extract;
        while stage != Stage::Done {
            stage = self.step(stage, &mut state).await;
        }
        ValidationReport {
            outcome: state.outcome,
            response_text: state.response,
            extracted_fields: state.fields,
            checks: state.verdict.map(|v| v.checks).unwrap_or_default(),
            record: state.record,
            comparison: state.comparison,
            update: state.update,
        }
    }

    async fn step(&self, stage: Stage, state: &mut RunState) -> Stage {
        match stage {
            Stage::Extract => self.extract(state).await,
            Stage::RetrieveRules => self.retrieve_rules(state).await,
            Stage::Validate => self.validate(state).await,
            Stage::FetchRecord => self.fetch_record(state).await,
            Stage::Compare => self.compare(state).await,
            Stage::Update => self.update(state).await,
            Stage::Respond => respond(state),
            Stage::Done => Stage::Done,
        }
    }

    async fn extract(&self, state: &mut RunState) -> Stage {
        match self.extractor.extract(&state.source).await {
            Ok(fields) => {
                info!(count = fields.len(), "extracted fields");
                state.fields = fields;
                Stage::RetrieveRules
            }
            Err(e) => {
                warn!(error = %e, "extraction failed");
                state.error = Some(e.into());
                Stage::Respond
            }
        }
    }

    async fn retrieve_rules(&self, state: &mut RunState) -> Stage {
        match self.retrieval.validation_rules(state.form_type).await {
            Ok(rules) => {
                info!(count = rules.len(), "retrieved rule texts");
                state.rule_texts = rules;
                Stage::Validate
            }
            Err(e) => {
                warn!(error = %e, "rule retrieval failed");
                state.error = Some(e.into());
                Stage::Respond
            }
        }
    }

    async fn validate(&self, state: &mut RunState) -> Stage {
        let prompt = prompts::batch_validation(&state.fields, &state.rule_texts);
        let verdict = match self.oracle.ask(&prompt).await {
            Ok(raw) => OracleReply::parse(&raw)
                .decode::<ValidationVerdict>()
                .unwrap_or_else(|| {
                    warn!("validation reply did not decode, degrading");
                    ValidationVerdict::system_error("Validation reply could not be parsed")
                }),
            // The pipeline always produces a verdict; an oracle failure
            // becomes a failing system-error check instead of an abort.
            Err(e) => {
                warn!(error = %e, "validation oracle call failed, degrading");
                ValidationVerdict::system_error(format!("Validation error: {e}"))
            }
        };

        state.outcome = if verdict.valid { Outcome::Igo } else { Outcome::Nigo };
        let valid = verdict.valid;
        state.verdict = Some(verdict);
        if valid { Stage::FetchRecord } else { Stage::Respond }
    }

    async fn fetch_record(&self, state: &mut RunState) -> Stage {
        let Some(id) = state.form_type.identifier_in(&state.fields) else {
            let field = state
                .form_type
                .identifier_field()
                .unwrap_or("identifier");
            warn!(field, "identifier missing from extracted data");
            state.error = Some(
                FetchError::Other(format!("Could not find {field} in extracted data")).into(),
            );
            return Stage::Respond;
        };
        let id = id.to_string();

        match self.fetcher.fetch(state.form_type, &id).await {
            Ok(record) => {
                info!(%id, "fetched authoritative record");
                state.record = Some(record);
                Stage::Compare
            }
            Err(e) => {
                warn!(%id, error = %e, "record fetch failed");
                state.error = Some(e.into());
                Stage::Respond
            }
        }
    }

    async fn compare(&self, state: &mut RunState) -> Stage {
        let record_json = state
            .record
            .as_ref()
            .map(|r| {
                serde_json::to_string_pretty(r).unwrap_or_else(|_| "{}".to_string())
            })
            .unwrap_or_else(|| "{}".to_string());
        let prompt = prompts::comparison(&state.fields, &record_json);

        let comparison = match self.oracle.ask(&prompt).await {
            Ok(raw) => OracleReply::parse(&raw)
                .decode::<ComparisonResult>()
                .map(ComparisonResult::normalised)
                .unwrap_or_else(|| {
                    warn!("comparison reply did not decode, degrading");
                    ComparisonResult::system_error("Comparison reply could not be parsed")
                }),
            Err(e) => {
                warn!(error = %e, "comparison oracle call failed, degrading");
                ComparisonResult::system_error(format!("Comparison error: {e}"))
            }
        };

        info!(matches = comparison.matches, "comparison complete");
        state.comparison = Some(comparison);
        Stage::Update
    }

    async fn update(&self, state: &mut RunState) -> Stage {
        let matches = state.comparison.as_ref().is_some_and(|c| c.matches);
        if !matches {
            state.update = Some(UpdateOutcome::failure(
                "Database update skipped due to data discrepancies",
            ));
            return Stage::Respond;
        }

        // Reachable only after Validate, so the verdict is always present.
        let Some(verdict) = state.verdict.as_ref() else {
            state.update = Some(UpdateOutcome::failure("No validation verdict available"));
            return Stage::Respond;
        };
        let outcome = self
            .updater
            .update(
                state.form_type,
                &state.fields,
                verdict,
                state.comparison.as_ref(),
            )
            .await;
        info!(success = outcome.success, "update complete");
        state.update = Some(outcome);
        Stage::Respond
    }
}

/// Terminal stage: render everything accumulated so far as user text.
///
/// A fetch-stage error arrives here with the verdict already present; the
/// verdict is still reported and the error appended, so a successful
/// validation is never hidden by a failed lookup.
fn respond(state: &mut RunState) -> Stage {
    let Some(verdict) = &state.verdict else {
        let error = state
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        state.response = format!("⚠️ Error in processing: {error}");
        return Stage::Done;
    };

    let mut response = verdict.formatted_response(state.form_type);

    if let Some(error) = &state.error {
        response.push_str(&format!("\n\n⚠️ Record lookup failed: {error}"));
    }

    if let Some(comparison) = &state.comparison {
        if comparison.matches {
            response.push_str("\n\n✅ The form data matches the database records.");
        } else {
            response.push_str(
                "\n\n⚠️ The following discrepancies were found between the form and database \
                 records:",
            );
            for field in comparison.fields.iter().filter(|f| !f.matched) {
                response.push_str(&format!(
                    "\n- {}: Form has '{}', Database has '{}'",
                    field.field, field.extracted_value, field.authoritative_value
                ));
            }
        }
    }

    if let Some(update) = &state.update {
        if update.success {
            response.push_str("\n\n✅ Database successfully updated with validated form data.");
            if let Some(txn) = &update.transaction_id {
                response.push_str(&format!("\nTransaction ID: {txn}"));
            }
        } else {
            response.push_str(&format!("\n\n❌ Database update failed: {}", update.message));
        }
    }

    state.response = response;
    Stage::Done
}
