//! Defensive parsing of raw oracle output.
//!
//! The oracle is prompted for strict JSON but routinely wraps it in
//! markdown fences, prefixes it with prose, or returns free text. Every
//! reply is classified into one of three kinds rather than trusted:
//!
//! - `Parsed` — a JSON document was recovered and decoded.
//! - `Fallback` — no JSON, but the text carries a NIGO marker, so a
//!   failing decision is synthesised.
//! - `Unparseable` — nothing recoverable; callers apply their stage's
//!   safe default.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::verdict::Decision;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Parsed,
    Fallback,
    Unparseable,
}

/// A classified oracle reply. Holds the raw text for response synthesis
/// and the recovered JSON document, when there is one.
#[derive(Debug, Clone)]
pub struct OracleReply {
    raw: String,
    json: Option<Value>,
    kind: ReplyKind,
}

impl OracleReply {
    /// Classify a raw oracle reply.
    pub fn parse(raw: &str) -> Self {
        let candidate = strip_fences(raw);
        match serde_json::from_str::<Value>(candidate) {
            Ok(json) => Self {
                raw: raw.to_string(),
                json: Some(json),
                kind: ReplyKind::Parsed,
            },
            Err(_) if raw.contains("NIGO") => Self {
                raw: raw.to_string(),
                json: None,
                kind: ReplyKind::Fallback,
            },
            Err(_) => Self {
                raw: raw.to_string(),
                json: None,
                kind: ReplyKind::Unparseable,
            },
        }
    }

    pub fn kind(&self) -> ReplyKind {
        self.kind
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Decode the recovered JSON into a concrete type. `None` when the
    /// reply was not parsed or the shape does not fit.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        let json = self.json.as_ref()?;
        serde_json::from_value(json.clone()).ok()
    }

    /// Interpret the reply as a per-rule decision.
    ///
    /// Malformed output is tolerated: a NIGO marker anywhere in the text
    /// synthesises a failing decision, and anything else defaults to OK.
    pub fn rule_decision(&self) -> Decision {
        if let Some(decision) = self.decode::<Decision>() {
            return decision;
        }
        if self.raw.contains("NIGO") {
            return Decision::Nigo {
                reason: "flagged as not in good order by the validation reply".to_string(),
            };
        }
        Decision::Ok
    }
}

/// Strip a single markdown code fence, with or without a `json` label.
/// Text outside the fence is discarded; unfenced input passes through.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    match after.find("```") {
        Some(end) => after[..end].trim(),
        None => after.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_json_parses() {
        let reply = OracleReply::parse(r#"{"decision":"OK"}"#);
        assert_eq!(reply.kind(), ReplyKind::Parsed);
        assert_eq!(reply.rule_decision(), Decision::Ok);
    }

    #[test]
    fn fenced_json_parses() {
        let reply = OracleReply::parse(
            "Here is my answer:\n```json\n{\"decision\":\"NIGO\",\"reason\":\"missing name\"}\n```\nHope that helps.",
        );
        assert_eq!(reply.kind(), ReplyKind::Parsed);
        assert_eq!(
            reply.rule_decision(),
            Decision::Nigo {
                reason: "missing name".to_string()
            }
        );
    }

    #[test]
    fn unlabelled_fence_parses() {
        let reply = OracleReply::parse("```\n{\"decision\":\"OK\"}\n```");
        assert_eq!(reply.kind(), ReplyKind::Parsed);
    }

    #[test]
    fn unterminated_fence_parses() {
        let reply = OracleReply::parse("```json\n{\"decision\":\"OK\"}");
        assert_eq!(reply.kind(), ReplyKind::Parsed);
    }

    #[test]
    fn nigo_token_falls_back_to_failing_decision() {
        let reply = OracleReply::parse("The form is NIGO because the signature is missing.");
        assert_eq!(reply.kind(), ReplyKind::Fallback);
        assert!(reply.rule_decision().is_nigo());
    }

    #[test]
    fn free_text_defaults_to_ok() {
        let reply = OracleReply::parse("Everything looks fine to me.");
        assert_eq!(reply.kind(), ReplyKind::Unparseable);
        assert_eq!(reply.rule_decision(), Decision::Ok);
    }

    #[test]
    fn parsed_but_wrong_shape_with_nigo_marker_still_fails() {
        // Valid JSON that is not a decision object, but carries the marker.
        let reply = OracleReply::parse(r#"{"verdict":"NIGO"}"#);
        assert_eq!(reply.kind(), ReplyKind::Parsed);
        assert!(reply.rule_decision().is_nigo());
    }

    #[test]
    fn decode_into_concrete_type() {
        let reply = OracleReply::parse(r#"{"valid": true, "validation_results": []}"#);
        let verdict: crate::verdict::ValidationVerdict = reply.decode().unwrap();
        assert!(verdict.valid);
    }

    #[test]
    fn raw_text_is_preserved() {
        let reply = OracleReply::parse("```json\n{\"decision\":\"OK\"}\n```");
        assert!(reply.raw().contains("```"));
    }
}
