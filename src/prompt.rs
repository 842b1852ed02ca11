//! Prompt templates and placeholder substitution.
//!
//! A template is a named `{system, user}` pair; the user string may
//! reference the literal placeholders `{question}`, `{context}`, and
//! `{language}`. Validation happens against the template text itself,
//! before substitution, so braces inside user questions or retrieved
//! context can never be mistaken for placeholders.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

pub const QUESTION: &str = "question";
pub const CONTEXT: &str = "context";
pub const LANGUAGE: &str = "language";

/// A named prompt template pair. Read-only at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub system: String,
    pub user: String,
}

/// Render a template's user string with the three supported
/// placeholders. Any `{word}` placeholder outside the supported set is
/// a configuration error (a typo in the stored template), surfaced as
/// [`RagError::UnresolvedPlaceholder`] rather than left in the output.
pub fn render_user_prompt(
    template: &str,
    question: &str,
    context: &str,
    language: &str,
) -> Result<String> {
    for name in placeholders(template) {
        if name != QUESTION && name != CONTEXT && name != LANGUAGE {
            return Err(RagError::UnresolvedPlaceholder(name));
        }
    }

    Ok(template
        .replace("{question}", question)
        .replace("{context}", context)
        .replace("{language}", language))
}

/// Extract `{word}` placeholder names from a template string.
fn placeholders(template: &str) -> Vec<String> {
    let mut found = Vec::new();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = template[i + 1..].find('}') {
                let name = &template[i + 1..i + 1 + end];
                if !name.is_empty()
                    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    found.push(name.to_string());
                    i += end + 2;
                    continue;
                }
            }
        }
        i += 1;
    }
    found
}

/// Built-in templates installed by `docsearch init` when absent.
pub fn default_templates() -> Vec<PromptTemplate> {
    vec![
        PromptTemplate {
            name: "default".to_string(),
            system: "You are an assistant. Use ONLY the provided context to answer the question."
                .to_string(),
            user: "Context:\n{context}\n\nQuestion:\n{question}\n\nAnswer in {language}:"
                .to_string(),
        },
        PromptTemplate {
            name: "arabic".to_string(),
            system: "أنت مساعد ذكي. استخدم فقط المحتوى التالي للإجابة على السؤال.".to_string(),
            user: "المحتوى:\n{context}\n\nالسؤال:\n{question}\n\nأجب باللغة العربية:".to_string(),
        },
    ]
}
