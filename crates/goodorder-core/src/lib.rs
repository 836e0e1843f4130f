//! Core types for the Goodorder form-intake and rule-validation pipelines.

pub mod catalog;
pub mod error;
pub mod form;
pub mod reply;
pub mod verdict;

pub use catalog::{Rule, RuleCatalog};
pub use error::{ExtractError, FetchError, OracleError, RetrievalError, StageError};
pub use form::{FieldMap, FormType, Record};
pub use reply::{OracleReply, ReplyKind};
pub use verdict::{
    ComparisonResult, Decision, FieldComparison, Outcome, RuleCheck, RuleDecision, UpdateOutcome,
    ValidationVerdict,
};
