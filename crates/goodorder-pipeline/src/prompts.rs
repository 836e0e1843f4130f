//! Prompt construction for the oracle.
//!
//! Prompts ask for strict JSON where a structured verdict is needed; the
//! reply is still parsed defensively since the oracle does not always
//! comply.

use goodorder_core::FieldMap;

use crate::memory::ChatMessage;
use crate::ports::Fragment;

/// Render a conversation history for inclusion in a prompt.
pub fn render_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_fragments(fragments: &[Fragment]) -> String {
    if fragments.is_empty() {
        return "(no relevant context found)".to_string();
    }
    fragments
        .iter()
        .map(|f| format!("- {}", f.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_fields(fields: &FieldMap) -> String {
    serde_json::to_string_pretty(fields).unwrap_or_else(|_| "{}".to_string())
}

/// Batch verdict over all fields and all rule texts in one call.
pub fn batch_validation(fields: &FieldMap, rules: &[String]) -> String {
    format!(
        "You are an AI agent validating form data against business rules.\n\
         \n\
         Form Data (extracted from OCR):\n{fields}\n\
         \n\
         Validation Rules:\n{rules}\n\
         \n\
         For each rule:\n\
         1. Determine if the rule passes or fails\n\
         2. Provide a clear reason if it fails\n\
         \n\
         Output a JSON with this structure:\n\
         {{\n\
           \"valid\": boolean,\n\
           \"validation_results\": [\n\
             {{\"rule\": \"string\", \"pass\": boolean, \"reason\": \"string\"}}\n\
           ]\n\
         }}\n\
         Do not be overly strict when judging the rules.",
        fields = render_fields(fields),
        rules = rules.join("\n"),
    )
}

/// Field-by-field comparison of extracted data against the record.
pub fn comparison(fields: &FieldMap, record_json: &str) -> String {
    format!(
        "You are an AI agent comparing data extracted from a form using OCR with data \
         retrieved from a database.\n\
         \n\
         OCR-Extracted Data:\n{fields}\n\
         \n\
         Database Data:\n{record_json}\n\
         \n\
         Compare only the fields present in both data sets; ignore fields that are not \
         common. Ignore commas inside values such as names.\n\
         \n\
         Output a JSON with this structure:\n\
         {{\n\
           \"matches\": boolean,\n\
           \"comparison_results\": [\n\
             {{\"field\": \"string\", \"ocr_value\": \"string\", \"db_value\": \"string\", \
             \"match\": boolean, \"note\": \"string\"}}\n\
           ]\n\
         }}",
        fields = render_fields(fields),
    )
}

/// Yes/no gate: does this message ask for form validation?
pub fn classify(user_input: &str) -> String {
    format!(
        "You are an assistant that helps decide whether a user query requires form \
         validation.\n\
         \n\
         User query: {user_input}\n\
         \n\
         Does this query appear to be asking about validating or processing a form, \
         document, or extracting data from a file? Answer with 'yes' or 'no'."
    )
}

/// Single-rule check over retrieved context from both indexes.
pub fn rule_check(
    rule_id: &str,
    rule_description: &str,
    ocr_fragments: &[Fragment],
    db_fragments: &[Fragment],
) -> String {
    format!(
        "You are an AI agent checking one business rule for an insurance form.\n\
         \n\
         Rule {rule_id}:\n{rule_description}\n\
         \n\
         Relevant form data (OCR):\n{ocr}\n\
         \n\
         Relevant policy record data (DB):\n{db}\n\
         \n\
         Decide whether the form passes this rule. Reply with strict JSON only:\n\
         {{\"decision\":\"OK\"}}\n\
         or\n\
         {{\"decision\":\"NIGO\",\"nigo_id\":\"{rule_id}\",\"reason\":\"string\"}}",
        ocr = render_fragments(ocr_fragments),
        db = render_fragments(db_fragments),
    )
}

/// Conversational reply, optionally grounded in extracted form data.
pub fn direct_reply(
    history: &[ChatMessage],
    user_input: &str,
    extracted: Option<&FieldMap>,
) -> String {
    match extracted {
        Some(fields) => format!(
            "You are an assistant that helps users understand extracted form data.\n\
             \n\
             This is the conversation so far:\n{history}\n\
             \n\
             User query: {user_input}\n\
             \n\
             Extracted data: {fields}\n\
             \n\
             Provide a helpful response that explains the extracted data in natural \
             language. Focus on the most important fields and keep the summary concise.",
            history = render_history(history),
            fields = render_fields(fields),
        ),
        None => format!(
            "You are a helpful AI assistant.\n\
             \n\
             This is the conversation so far:\n{history}\n\
             \n\
             User: {user_input}\n\
             \n\
             Assistant:",
            history = render_history(history),
        ),
    }
}

/// Restate a failing rule check in a short conversational tone.
pub fn nigo_summary(history: &[ChatMessage], rule_id: &str, raw_reply: &str) -> String {
    format!(
        "This is the conversation so far:\n{history}\n\
         \n\
         A form validation check failed. The raw validation reply was:\n{raw_reply}\n\
         \n\
         Restate this result for the user in one or two short conversational sentences, \
         citing the id {rule_id}.",
        history = render_history(history),
    )
}

/// Congratulatory confirmation when every rule passed.
pub fn igo_confirmation(history: &[ChatMessage], fields: &FieldMap) -> String {
    let client_name = fields
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("ownerName"))
        .map(|(_, v)| v.as_str())
        .unwrap_or("the client");
    format!(
        "This is the conversation so far:\n{history}\n\
         \n\
         Every validation rule passed; the form is in good order (IGO). Write a short \
         congratulatory message to {client_name} confirming that their renewal request \
         has been accepted for processing.",
        history = render_history(history),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ChatMessage, ChatRole};

    #[test]
    fn history_renders_roles_in_order() {
        let history = vec![
            ChatMessage {
                role: ChatRole::Human,
                text: "hello".to_string(),
            },
            ChatMessage {
                role: ChatRole::Assistant,
                text: "hi".to_string(),
            },
        ];
        assert_eq!(render_history(&history), "Human: hello\nAssistant: hi");
    }

    #[test]
    fn rule_check_includes_both_context_sets() {
        let ocr = vec![Fragment {
            text: "GuaranteePeriod: 3 year".to_string(),
            score: 0.9,
            metadata: Default::default(),
        }];
        let prompt = rule_check("REN.NM.004", "Guarantee Period must be present", &ocr, &[]);
        assert!(prompt.contains("GuaranteePeriod: 3 year"));
        assert!(prompt.contains("(no relevant context found)"));
        assert!(prompt.contains(r#"{"decision":"OK"}"#));
    }

    #[test]
    fn igo_confirmation_falls_back_to_generic_name() {
        let prompt = igo_confirmation(&[], &FieldMap::new());
        assert!(prompt.contains("the client"));

        let mut fields = FieldMap::new();
        fields.insert("OwnerName".to_string(), "sarams, sarn".to_string());
        let prompt = igo_confirmation(&[], &fields);
        assert!(prompt.contains("sarams, sarn"));
    }
}
