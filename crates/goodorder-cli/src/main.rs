//! CLI entry point: run a batch validation, hold a chat turn, or list the
//! built-in rule catalog. Endpoint locations come from flags or their
//! environment variables.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use goodorder_clients::{LlmClient, OcrClient, PolicyApiClient, VectorApiClient};
use goodorder_core::{FormType, RuleCatalog};
use goodorder_pipeline::{
    AgentRequest, DocumentSource, RuleAgentPipeline, SessionStore, ValidationPipeline,
    ValidationRequest,
};

#[derive(Parser)]
#[command(name = "goodorder", version, about = "Insurance form intake and validation")]
struct Cli {
    #[command(flatten)]
    endpoints: Endpoints,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Endpoints {
    /// OCR extraction service.
    #[arg(long, env = "OCR_API_ENDPOINT", default_value = "http://localhost:8001")]
    ocr_url: String,

    /// Policy record API.
    #[arg(long, env = "POLICY_API_URL", default_value = "http://localhost:8002")]
    policy_url: String,

    /// LLM server (Ollama-style generate API).
    #[arg(long, env = "LLM_SERVER_URL", default_value = "http://localhost:11434")]
    llm_url: String,

    /// Model name on the LLM server.
    #[arg(long, env = "LLM_MODEL_NAME", default_value = "llama3")]
    llm_model: String,

    /// Vector index service.
    #[arg(long, env = "VECTOR_API_URL", default_value = "http://localhost:8003")]
    vector_url: String,
}

#[derive(Subcommand)]
enum Command {
    /// Run the batch validation pipeline over one form.
    Validate {
        /// Form type: renewals or withdrawals.
        #[arg(long)]
        form_type: FormType,

        /// Document reference to extract from.
        #[arg(long, conflicts_with = "test")]
        file: Option<String>,

        /// Use the canned fixture for the form type instead of a file.
        #[arg(long)]
        test: bool,
    },

    /// Run one conversational turn through the rule agent.
    Chat {
        /// The user message.
        #[arg(long)]
        message: String,

        /// Route validation requests through the per-rule decision engine.
        #[arg(long, default_value_t = true)]
        decision_engine: bool,

        /// Continue an existing conversation.
        #[arg(long)]
        conversation_id: Option<String>,
    },

    /// Print the built-in rule catalog.
    Rules {
        /// Limit to one form type.
        #[arg(long)]
        form_type: Option<FormType>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Validate {
            form_type,
            file,
            test,
        } => validate(&cli.endpoints, form_type, file, test).await,
        Command::Chat {
            message,
            decision_engine,
            conversation_id,
        } => chat(&cli.endpoints, message, decision_engine, conversation_id).await,
        Command::Rules { form_type } => {
            print_rules(form_type);
            Ok(())
        }
    }
}

async fn validate(
    endpoints: &Endpoints,
    form_type: FormType,
    file: Option<String>,
    test: bool,
) -> Result<()> {
    let source = match (file, test) {
        (Some(document), _) => DocumentSource::Upload(document),
        (None, true) => DocumentSource::Test(form_type),
        (None, false) => anyhow::bail!("provide a document with --file or use --test"),
    };

    let policy = Arc::new(PolicyApiClient::new(endpoints.policy_url.clone()));
    let pipeline = ValidationPipeline::new(
        Arc::new(OcrClient::new(endpoints.ocr_url.clone())),
        Arc::new(VectorApiClient::new(endpoints.vector_url.clone())),
        Arc::new(LlmClient::new(
            endpoints.llm_url.clone(),
            endpoints.llm_model.clone(),
        )),
        Arc::clone(&policy) as _,
        policy as _,
    );

    let report = pipeline.run(ValidationRequest { form_type, source }).await;
    println!("{}", report.response_text);
    tracing::info!(outcome = ?report.outcome, checks = report.checks.len(), "validation finished");
    Ok(())
}

async fn chat(
    endpoints: &Endpoints,
    message: String,
    decision_engine: bool,
    conversation_id: Option<String>,
) -> Result<()> {
    let pipeline = RuleAgentPipeline::new(
        Arc::new(OcrClient::new(endpoints.ocr_url.clone())),
        Arc::new(VectorApiClient::new(endpoints.vector_url.clone())),
        Arc::new(LlmClient::new(
            endpoints.llm_url.clone(),
            endpoints.llm_model.clone(),
        )),
        Arc::new(PolicyApiClient::new(endpoints.policy_url.clone())),
        Arc::new(SessionStore::new()),
    );

    let outcome = pipeline
        .run(AgentRequest {
            user_text: message,
            decision_engine_enabled: decision_engine,
            conversation_id,
            extracted_fields: None,
        })
        .await;

    println!("{}", outcome.response_text);
    println!("\n[conversation: {}]", outcome.conversation_id);
    if !outcome.decisions.is_empty() {
        tracing::info!(
            outcome = ?outcome.outcome,
            decisions = outcome.decisions.len(),
            "rule loop finished"
        );
    }
    Ok(())
}

fn print_rules(only: Option<FormType>) {
    let catalog = RuleCatalog::builtin();
    let listed = match only {
        Some(form_type) => vec![form_type],
        None => vec![FormType::Renewals, FormType::Withdrawals],
    };
    for form_type in listed {
        println!("{form_type}:");
        for rule in catalog.rules_for(form_type) {
            println!("  {} - {}", rule.id, rule.description);
        }
    }
}
