//! Conversation transcript normalization.
//!
//! Transcripts arrive in heterogeneous shapes: some providers label the
//! text field `content`, others `message` or `text`, and Cohere spells
//! its roles `USER`/`CHATBOT`/`SYSTEM`. Normalization happens exactly
//! once, at the store boundary, producing the canonical
//! [`ConversationTurn`] shape; nothing downstream re-inspects raw
//! shapes.
//!
//! Leniency is deliberate: a turn with missing content becomes an empty
//! string instead of an error, because transcripts must never be
//! silently dropped. Roles outside the known vocabulary pass through as
//! opaque strings (chat providers bucket them as system instructions).

use serde_json::Value;

use crate::models::{ConversationTurn, ROLE_ASSISTANT, ROLE_SYSTEM, ROLE_USER};

/// Field names that may carry the turn text, tried in order.
const CONTENT_KEYS: [&str; 3] = ["content", "message", "text"];

/// Normalize one raw transcript entry into the canonical shape.
pub fn normalize_turn(value: &Value) -> ConversationTurn {
    let raw_role = value.get("role").and_then(Value::as_str).unwrap_or(ROLE_USER);
    let content = CONTENT_KEYS
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .unwrap_or("")
        .to_string();

    ConversationTurn {
        role: canonical_role(raw_role),
        content,
    }
}

/// Normalize a whole raw transcript, preserving insertion order.
pub fn normalize_history(values: &[Value]) -> Vec<ConversationTurn> {
    values.iter().map(normalize_turn).collect()
}

/// Map provider role spellings onto the canonical vocabulary.
/// Unrecognized values pass through unchanged.
fn canonical_role(role: &str) -> String {
    match role.to_ascii_lowercase().as_str() {
        "user" => ROLE_USER.to_string(),
        "assistant" | "chatbot" => ROLE_ASSISTANT.to_string(),
        "system" => ROLE_SYSTEM.to_string(),
        _ => role.to_string(),
    }
}
