//! Verdict and decision types shared by both pipelines.
//!
//! The serde shapes here mirror what the oracle is prompted to emit, so a
//! well-formed oracle reply deserialises directly into these types.

use serde::{Deserialize, Serialize};

use crate::form::FormType;

/// Per-rule outcome in the chat pipeline's rule loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision")]
pub enum Decision {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NIGO")]
    Nigo {
        #[serde(default)]
        reason: String,
    },
}

impl Decision {
    pub fn is_nigo(&self) -> bool {
        matches!(self, Self::Nigo { .. })
    }
}

/// A decision bound to the rule it was made for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDecision {
    pub rule_id: String,
    #[serde(flatten)]
    pub decision: Decision,
}

/// Terminal outcome of a pipeline run. Write-once: set by whichever stage
/// first detects failure, or by the terminal stage on rule exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Pending,
    Igo,
    Nigo,
}

/// One rule check inside a batch validation verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCheck {
    pub rule: String,
    pub pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Batch verdict over all rules at once, as returned by the oracle in the
/// batch validation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    #[serde(rename = "validation_results", default)]
    pub checks: Vec<RuleCheck>,
}

impl ValidationVerdict {
    /// A degraded verdict produced when the oracle call itself fails. The
    /// pipeline always delivers a verdict rather than aborting.
    pub fn system_error(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            checks: vec![RuleCheck {
                rule: "System Error".to_string(),
                pass: false,
                reason: Some(reason.into()),
            }],
        }
    }

    /// Human-readable summary of the verdict.
    pub fn formatted_response(&self, form_type: FormType) -> String {
        if self.valid {
            return format!(
                "✅ The {form_type} form has passed all validation rules."
            );
        }
        let failures: Vec<String> = self
            .checks
            .iter()
            .filter(|c| !c.pass)
            .map(|c| {
                format!(
                    "❌ {}: {}",
                    c.rule,
                    c.reason.as_deref().unwrap_or_default()
                )
            })
            .collect();
        format!(
            "The following issues were found in the {form_type} form:\n{}",
            failures.join("\n")
        )
    }
}

/// Comparison of one field common to the extracted data and the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub field: String,
    #[serde(rename = "ocr_value")]
    pub extracted_value: String,
    #[serde(rename = "db_value")]
    pub authoritative_value: String,
    #[serde(rename = "match")]
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Result of comparing extracted fields against the authoritative record.
///
/// `matches` is always the conjunction of the per-field results; use
/// [`ComparisonResult::from_fields`] to keep that invariant when building
/// one locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub matches: bool,
    #[serde(rename = "comparison_results", default)]
    pub fields: Vec<FieldComparison>,
}

impl ComparisonResult {
    /// Build a result, computing `matches` as the AND of all field results.
    /// An empty field list is vacuously matching.
    pub fn from_fields(fields: Vec<FieldComparison>) -> Self {
        let matches = fields.iter().all(|f| f.matched);
        Self { matches, fields }
    }

    /// A degraded result produced when the comparison oracle call fails.
    pub fn system_error(reason: impl Into<String>) -> Self {
        Self::from_fields(vec![FieldComparison {
            field: "System Error".to_string(),
            extracted_value: String::new(),
            authoritative_value: String::new(),
            matched: false,
            note: Some(reason.into()),
        }])
    }

    /// Re-derive `matches` after deserialising an oracle reply, in case the
    /// oracle's own conjunction disagrees with its per-field entries.
    pub fn normalised(mut self) -> Self {
        self.matches = self.fields.iter().all(|f| f.matched);
        self
    }
}

/// Result of the downstream database update. Never an error: failures are
/// part of the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl UpdateOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            transaction_id: None,
        }
    }
}
