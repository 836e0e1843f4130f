//! Orchestration layer: the batch validation pipeline, the conversational
//! rule agent, the capability ports they consume, and per-conversation
//! session memory.

pub mod agent;
pub mod memory;
pub mod ports;
pub mod prompts;
pub mod validation;

#[cfg(test)]
pub(crate) mod stubs;

pub use agent::{AgentRequest, ChatOutcome, RuleAgentPipeline};
pub use memory::{ChatMessage, ChatRole, SessionStore};
pub use ports::{
    DocumentSource, Extractor, Fragment, IndexName, Oracle, RecordFetcher, RecordUpdater,
    Retrieval,
};
pub use validation::{ValidationPipeline, ValidationReport, ValidationRequest};
