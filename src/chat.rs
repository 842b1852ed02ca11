//! Chat provider abstraction, wire-format translation, and the
//! provider registry.
//!
//! Every provider translates canonical `{role, content}` turns into its
//! own role vocabulary. The translation is total: `user` and
//! `assistant` map to explicit tokens, and everything else — including
//! opaque roles that passed through normalization — lands in the
//! provider's system-instruction bucket.
//!
//! Grounding documents are a provider capability, not caller logic:
//! Cohere accepts them natively via its `documents` field, OpenAI gets
//! them folded into the final user turn as an appended `Context:`
//! block.
//!
//! The [`ProviderRegistry`] is a closed registry resolved at startup.
//! An unknown name is [`RagError::UnknownProvider`]; a known provider
//! whose credential env var was absent at startup is
//! [`RagError::MissingCredential`]. There is never a silent fallback.

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ChatConfig;
use crate::error::{RagError, Result};
use crate::models::{ConversationTurn, GroundingDoc, ROLE_ASSISTANT, ROLE_USER};

/// A language-model chat backend.
#[async_trait]
pub trait ChatProvider: Send + Sync + std::fmt::Debug {
    /// Registry key for this provider (e.g. `"cohere"`).
    fn name(&self) -> &str;

    /// Produce a reply to the given turns. `system` is the system-level
    /// preamble from the prompt template; `documents` are retrieved
    /// grounding passages.
    async fn chat(
        &self,
        turns: &[ConversationTurn],
        system: &str,
        documents: Option<&[GroundingDoc]>,
    ) -> Result<String>;
}

// ============ Cohere ============

/// Cohere wire role for a canonical role. The fallback bucket is
/// `SYSTEM`: any role outside user/assistant becomes a system-level
/// instruction.
fn cohere_role(role: &str) -> &'static str {
    match role {
        r if r == ROLE_USER => "USER",
        r if r == ROLE_ASSISTANT => "CHATBOT",
        _ => "SYSTEM",
    }
}

/// Build the Cohere `/v1/chat` request body. The final turn's content
/// becomes `message`, earlier turns become `chat_history`, the system
/// string becomes the `preamble`, and grounding documents are passed
/// natively.
fn build_cohere_request(
    turns: &[ConversationTurn],
    system: &str,
    documents: Option<&[GroundingDoc]>,
) -> anyhow::Result<Value> {
    let (last, history) = turns
        .split_last()
        .ok_or_else(|| anyhow!("chat called with no turns"))?;

    let chat_history: Vec<Value> = history
        .iter()
        .map(|turn| json!({ "role": cohere_role(&turn.role), "message": turn.content }))
        .collect();

    let mut body = json!({
        "message": last.content,
        "chat_history": chat_history,
        "preamble": system,
    });

    if let Some(docs) = documents {
        body["documents"] = json!(docs);
    }

    Ok(body)
}

/// Chat provider using the Cohere API (`POST /v1/chat`). Supports
/// native document grounding.
#[derive(Debug)]
pub struct CohereChat {
    api_key: String,
    client: reqwest::Client,
}

impl CohereChat {
    pub fn new(api_key: String, config: &ChatConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::ProviderCallFailed {
                provider: "cohere".to_string(),
                source: e.into(),
            })?;
        Ok(Self { api_key, client })
    }

    async fn call(&self, body: &Value) -> anyhow::Result<String> {
        let response = self
            .client
            .post("https://api.cohere.ai/v1/chat")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Cohere API error {}: {}", status, body_text));
        }

        let json: Value = response.json().await?;
        json.get("text")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("Invalid Cohere response: missing text"))
    }
}

#[async_trait]
impl ChatProvider for CohereChat {
    fn name(&self) -> &str {
        "cohere"
    }

    async fn chat(
        &self,
        turns: &[ConversationTurn],
        system: &str,
        documents: Option<&[GroundingDoc]>,
    ) -> Result<String> {
        let body = build_cohere_request(turns, system, documents).map_err(|e| {
            RagError::ProviderCallFailed {
                provider: self.name().to_string(),
                source: e,
            }
        })?;

        self.call(&body)
            .await
            .map_err(|e| RagError::ProviderCallFailed {
                provider: self.name().to_string(),
                source: e,
            })
    }
}

// ============ OpenAI ============

/// OpenAI wire role for a canonical role, with the same `system`
/// fallback bucket as Cohere.
fn openai_role(role: &str) -> &'static str {
    match role {
        r if r == ROLE_USER => "user",
        r if r == ROLE_ASSISTANT => "assistant",
        _ => "system",
    }
}

/// Build the OpenAI message list. The system preamble is prepended;
/// grounding documents, which OpenAI has no native slot for, are
/// folded into the last user-role message as an appended `Context:`
/// block.
fn build_openai_messages(
    turns: &[ConversationTurn],
    system: &str,
    documents: Option<&[GroundingDoc]>,
) -> Vec<Value> {
    let mut messages: Vec<Value> = Vec::with_capacity(turns.len() + 1);
    if !system.is_empty() {
        messages.push(json!({ "role": "system", "content": system }));
    }
    for turn in turns {
        messages.push(json!({ "role": openai_role(&turn.role), "content": turn.content }));
    }

    if let Some(docs) = documents {
        if !docs.is_empty() {
            let folded = docs
                .iter()
                .map(|d| d.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            if let Some(last_user) = messages
                .iter_mut()
                .rev()
                .find(|m| m["role"] == "user")
            {
                let existing = last_user["content"].as_str().unwrap_or("").to_string();
                last_user["content"] = json!(format!("{}\n\nContext:\n{}", existing, folded));
            }
        }
    }

    messages
}

/// Chat provider using the OpenAI chat completions API.
#[derive(Debug)]
pub struct OpenAIChat {
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(api_key: String, config: &ChatConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::ProviderCallFailed {
                provider: "openai".to_string(),
                source: e.into(),
            })?;
        Ok(Self {
            api_key,
            model: config.openai_model.clone(),
            max_tokens: config.max_tokens,
            client,
        })
    }

    async fn call(&self, messages: &[Value]) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI API error {}: {}", status, body_text));
        }

        let json: Value = response.json().await?;
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing message content"))
    }
}

#[async_trait]
impl ChatProvider for OpenAIChat {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(
        &self,
        turns: &[ConversationTurn],
        system: &str,
        documents: Option<&[GroundingDoc]>,
    ) -> Result<String> {
        let messages = build_openai_messages(turns, system, documents);
        self.call(&messages)
            .await
            .map_err(|e| RagError::ProviderCallFailed {
                provider: self.name().to_string(),
                source: e,
            })
    }
}

// ============ Registry ============

/// Closed chat-provider registry resolved at startup.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ChatProvider>>,
    /// Known providers whose credential env var was absent, mapped to
    /// that env var name for the error message.
    missing: HashMap<String, String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from process environment: each built-in
    /// provider is registered when its credential is present and
    /// remembered as credential-less otherwise.
    pub fn from_env(config: &ChatConfig) -> Result<Self> {
        let mut registry = Self::new();

        match std::env::var("COHERE_API_KEY") {
            Ok(key) => registry.register(Arc::new(CohereChat::new(key, config)?)),
            Err(_) => registry.mark_missing("cohere", "COHERE_API_KEY"),
        }
        match std::env::var("OPENAI_API_KEY") {
            Ok(key) => registry.register(Arc::new(OpenAIChat::new(key, config)?)),
            Err(_) => registry.mark_missing("openai", "OPENAI_API_KEY"),
        }

        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn ChatProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    fn mark_missing(&mut self, name: &str, env_var: &str) {
        self.missing.insert(name.to_string(), env_var.to_string());
    }

    /// Resolve a provider by name. Unknown names and missing
    /// credentials are distinct configuration errors.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ChatProvider>> {
        let key = name.trim().to_ascii_lowercase();
        if let Some(provider) = self.providers.get(&key) {
            return Ok(Arc::clone(provider));
        }
        if let Some(env_var) = self.missing.get(&key) {
            return Err(RagError::MissingCredential {
                provider: key,
                env_var: env_var.clone(),
            });
        }
        Err(RagError::UnknownProvider(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> GroundingDoc {
        GroundingDoc {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_role_translation_total() {
        assert_eq!(cohere_role("user"), "USER");
        assert_eq!(cohere_role("assistant"), "CHATBOT");
        assert_eq!(cohere_role("system"), "SYSTEM");
        // Opaque roles land in the system bucket
        assert_eq!(cohere_role("moderator"), "SYSTEM");

        assert_eq!(openai_role("user"), "user");
        assert_eq!(openai_role("assistant"), "assistant");
        assert_eq!(openai_role("tool_output"), "system");
    }

    #[test]
    fn test_cohere_request_shape() {
        let turns = vec![
            ConversationTurn::user("first question"),
            ConversationTurn::assistant("first answer"),
            ConversationTurn::user("second question"),
        ];
        let body =
            build_cohere_request(&turns, "be helpful", Some(&[doc("Paris facts")])).unwrap();

        assert_eq!(body["message"], "second question");
        assert_eq!(body["preamble"], "be helpful");
        let history = body["chat_history"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["role"], "USER");
        assert_eq!(history[0]["message"], "first question");
        assert_eq!(history[1]["role"], "CHATBOT");
        assert_eq!(body["documents"][0]["text"], "Paris facts");
    }

    #[test]
    fn test_cohere_request_without_documents() {
        let turns = vec![ConversationTurn::user("q")];
        let body = build_cohere_request(&turns, "", None).unwrap();
        assert!(body.get("documents").is_none());
        assert!(body["chat_history"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_cohere_request_requires_a_turn() {
        assert!(build_cohere_request(&[], "sys", None).is_err());
    }

    #[test]
    fn test_openai_system_prepended() {
        let turns = vec![ConversationTurn::user("q")];
        let messages = build_openai_messages(&turns, "be brief", None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "be brief");
        assert_eq!(messages[1]["role"], "user");
    }

    #[test]
    fn test_openai_folds_context_into_last_user_turn() {
        let turns = vec![
            ConversationTurn::user("old question"),
            ConversationTurn::assistant("old answer"),
            ConversationTurn::user("new question"),
        ];
        let messages =
            build_openai_messages(&turns, "sys", Some(&[doc("fact one"), doc("fact two")]));

        let last = messages.last().unwrap();
        assert_eq!(last["role"], "user");
        let content = last["content"].as_str().unwrap();
        assert!(content.starts_with("new question"));
        assert!(content.contains("Context:\nfact one\n\nfact two"));

        // Earlier turns untouched
        assert_eq!(messages[1]["content"], "old question");
    }

    #[test]
    fn test_openai_empty_documents_not_folded() {
        let turns = vec![ConversationTurn::user("q")];
        let messages = build_openai_messages(&turns, "", Some(&[]));
        assert_eq!(messages[0]["content"], "q");
    }

    #[test]
    fn test_registry_unknown_vs_missing_credential() {
        let mut registry = ProviderRegistry::new();
        registry.mark_missing("cohere", "COHERE_API_KEY");

        let err = registry.resolve("cohere").unwrap_err();
        assert!(matches!(err, RagError::MissingCredential { .. }));

        let err = registry.resolve("mistral").unwrap_err();
        assert!(matches!(err, RagError::UnknownProvider(_)));
    }

    #[test]
    fn test_registry_name_is_case_insensitive() {
        let mut registry = ProviderRegistry::new();
        registry.mark_missing("cohere", "COHERE_API_KEY");
        assert!(matches!(
            registry.resolve(" Cohere ").unwrap_err(),
            RagError::MissingCredential { .. }
        ));
    }
}
