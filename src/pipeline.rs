//! End-to-end orchestration of ingestion and question answering.
//!
//! [`RagOrchestrator`] wires the trait seams together and owns the
//! stage ordering:
//!
//! ```text
//! ingest:  text -> chunks -> embeddings -> (replace) -> upsert -> metadata
//! answer:  question -> history -> embed -> search -> render -> chat -> save
//! ```
//!
//! Guarantees:
//! - Ingestion is atomic from the caller's view: any stage failure
//!   aborts before the index or document metadata is touched, and in
//!   replace mode the scoped delete runs only after embeddings are in
//!   hand.
//! - Retrieval is owner-scoped; one user's documents never surface in
//!   another user's answers.
//! - A history save failure does not discard a produced answer; the
//!   reply is returned with `history_persisted` cleared.
//! - Concurrent answers for the same `(user_id, provider)` pair are
//!   serialized through a keyed lock, so the load-append-save cycle
//!   never loses turns.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::chat::{ChatProvider, ProviderRegistry};
use crate::chunk::split_text;
use crate::config::{Config, IngestionMode};
use crate::embedding::{EmbeddingProvider, InputType};
use crate::error::{RagError, Result};
use crate::history::normalize_history;
use crate::index::VectorIndex;
use crate::language::detect_language;
use crate::models::{ConversationTurn, DocumentRecord, GroundingDoc, RecordPayload, VectorRecord};
use crate::prompt::{render_user_prompt, PromptTemplate};
use crate::store::{ConversationStore, DocumentStore, PromptStore};

/// Pipeline tunables, lifted out of [`Config`] so tests can build them
/// directly.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chunk_size: usize,
    pub overlap: usize,
    pub top_k: i64,
    pub context_k: usize,
    pub ingestion_mode: IngestionMode,
    pub default_provider: String,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            overlap: config.chunking.overlap,
            top_k: config.retrieval.top_k,
            context_k: config.retrieval.context_k,
            ingestion_mode: config.ingestion.mode,
            default_provider: config.chat.default_provider.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
            top_k: 5,
            context_k: 3,
            ingestion_mode: IngestionMode::Replace,
            default_provider: "cohere".to_string(),
        }
    }
}

/// One question-answering request.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub user_id: String,
    /// Provider override; falls back to the configured default.
    pub provider: Option<String>,
    pub question: String,
    pub prompt_name: String,
    /// Restrict retrieval to a single document id.
    pub document: Option<String>,
    /// Force the answer language instead of detecting it.
    pub language: Option<String>,
    /// Caller-supplied history; replaces the stored one for this call.
    pub history: Option<Vec<serde_json::Value>>,
}

/// The outcome of an answered question.
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    /// Whether retrieval found any context for the question.
    pub context_found: bool,
    /// Whether the updated history was durably saved.
    pub history_persisted: bool,
}

pub struct RagOrchestrator {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    prompts: Arc<dyn PromptStore>,
    conversations: Arc<dyn ConversationStore>,
    documents: Arc<dyn DocumentStore>,
    chat_providers: ProviderRegistry,
    settings: PipelineSettings,
    /// One lock per (user_id, provider) pair, created on first use.
    history_locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl RagOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        prompts: Arc<dyn PromptStore>,
        conversations: Arc<dyn ConversationStore>,
        documents: Arc<dyn DocumentStore>,
        chat_providers: ProviderRegistry,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            prompts,
            conversations,
            documents,
            chat_providers,
            settings,
            history_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Ingest a document for `owner` under a stable name. Re-ingesting
    /// the same name replaces its previous chunks (in replace mode) and
    /// returns the same document id.
    pub async fn ingest(&self, raw_text: &str, owner: &str, document_name: &str) -> Result<String> {
        let text = raw_text.trim();
        if text.is_empty() {
            return Err(RagError::EmptyDocument);
        }

        let document_id = self.documents.resolve_id(owner, document_name).await?;
        tracing::info!(owner, name = document_name, id = %document_id, "ingesting document");

        let chunks = split_text(text, self.settings.chunk_size, self.settings.overlap)?;
        if chunks.is_empty() {
            return Err(RagError::ChunkingFailed);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts, InputType::Document).await?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::EmbeddingFailed(anyhow::anyhow!(
                "embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                embeddings.len()
            )));
        }

        self.index.ensure_collection(self.embedder.dims()).await?;

        if self.settings.ingestion_mode == IngestionMode::Replace {
            self.index.delete_by_owner(owner, Some(&document_id)).await?;
        }

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, vector)| VectorRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                payload: RecordPayload {
                    text: chunk.text.clone(),
                    owner: owner.to_string(),
                    document_id: document_id.clone(),
                    chunk_ordinal: chunk.ordinal,
                },
            })
            .collect();
        self.index.upsert(&records).await?;

        let now = chrono::Utc::now().timestamp();
        let dedup_hash = format!("{:x}", Sha256::digest(text.as_bytes()));
        self.documents
            .record_upload(&DocumentRecord {
                id: document_id.clone(),
                owner: owner.to_string(),
                name: document_name.to_string(),
                chunk_count: chunks.len() as i64,
                dedup_hash,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(id = %document_id, chunks = chunks.len(), "document indexed");
        Ok(document_id)
    }

    /// Answer a question against the owner's indexed documents,
    /// carrying the conversation forward.
    pub async fn answer(&self, req: &QueryRequest) -> Result<Answer> {
        let provider_name = req
            .provider
            .as_deref()
            .unwrap_or(&self.settings.default_provider);
        let provider = self.chat_providers.resolve(provider_name)?;
        let template = self.prompts.resolve(&req.prompt_name).await?;

        // Serialize the load-append-save cycle per conversation. The
        // lock entry is released again once no other task holds it, so
        // the map does not grow with every user ever seen.
        let lock = self
            .conversation_lock(&req.user_id, provider.name())
            .await;
        let result = {
            let _guard = lock.lock().await;
            self.answer_locked(req, provider.as_ref(), &template).await
        };
        self.release_conversation_lock(&req.user_id, provider.name(), lock)
            .await;
        result
    }

    async fn answer_locked(
        &self,
        req: &QueryRequest,
        provider: &dyn ChatProvider,
        template: &PromptTemplate,
    ) -> Result<Answer> {
        let mut turns = match &req.history {
            Some(values) => normalize_history(values),
            None => {
                self.conversations
                    .load(&req.user_id, provider.name())
                    .await?
            }
        };

        let question_vec = self
            .embedder
            .embed(&[req.question.clone()], InputType::Query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                RagError::EmbeddingFailed(anyhow::anyhow!("no vector returned for question"))
            })?;

        let hits = self
            .index
            .search(
                &question_vec,
                &req.user_id,
                req.document.as_deref(),
                self.settings.top_k,
            )
            .await?;

        let context_hits = &hits[..hits.len().min(self.settings.context_k)];
        let context_found = !context_hits.is_empty();
        let context = context_hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        tracing::debug!(
            user = %req.user_id,
            hits = hits.len(),
            context_found,
            "retrieval complete"
        );

        let language = match &req.language {
            Some(lang) => lang.clone(),
            None => detect_language(&req.question).to_string(),
        };
        let user_prompt = render_user_prompt(&template.user, &req.question, &context, &language)?;

        turns.push(ConversationTurn::user(user_prompt));

        let grounding: Vec<GroundingDoc> = context_hits
            .iter()
            .map(|h| GroundingDoc {
                text: h.text.clone(),
            })
            .collect();
        let documents = if grounding.is_empty() {
            None
        } else {
            Some(grounding.as_slice())
        };

        let reply = provider.chat(&turns, &template.system, documents).await?;
        turns.push(ConversationTurn::assistant(reply.clone()));

        let history_persisted = match self
            .conversations
            .save(&req.user_id, provider.name(), &turns)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user = %req.user_id, error = %e, "history save failed");
                false
            }
        };

        Ok(Answer {
            answer: reply,
            context_found,
            history_persisted,
        })
    }

    /// List the documents recorded for an owner.
    pub async fn list_documents(&self, owner: &str) -> Result<Vec<DocumentRecord>> {
        self.documents.list_documents(owner).await
    }

    async fn conversation_lock(&self, user_id: &str, provider: &str) -> Arc<Mutex<()>> {
        let mut locks = self.history_locks.lock().await;
        Arc::clone(
            locks
                .entry((user_id.to_string(), provider.to_string()))
                .or_default(),
        )
    }

    /// Drop the caller's handle and remove the map entry when no other
    /// task is waiting on it. The map guard is held across the check,
    /// so no task can clone the entry between count and removal.
    async fn release_conversation_lock(
        &self,
        user_id: &str,
        provider: &str,
        lock: Arc<Mutex<()>>,
    ) {
        let mut locks = self.history_locks.lock().await;
        drop(lock);
        let key = (user_id.to_string(), provider.to_string());
        if locks.get(&key).map_or(false, |l| Arc::strong_count(l) == 1) {
            locks.remove(&key);
        }
    }
}
