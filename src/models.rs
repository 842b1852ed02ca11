//! Core data models that flow through the ingestion and query pipelines.

use serde::{Deserialize, Serialize};

/// Canonical role tokens. Providers translate these into their own wire
/// vocabulary; anything outside this set passes through as an opaque
/// string and lands in the provider's system-instruction bucket.
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";
pub const ROLE_SYSTEM: &str = "system";

/// A bounded contiguous slice of a document's text, the unit of
/// embedding and retrieval. Ordinals preserve source order and are
/// never reordered after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub ordinal: i64,
}

/// Payload stored alongside each vector. `owner` is the access-control
/// boundary: every search carries a mandatory owner equality filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPayload {
    pub text: String,
    pub owner: String,
    pub document_id: String,
    pub chunk_ordinal: i64,
}

/// A vector record written to the index during ingestion. Immutable
/// once written; removed only by re-ingestion or explicit deletion.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: RecordPayload,
}

/// A search hit. `score` is cosine similarity (higher = closer);
/// results are ordered by descending score and tie order is not stable
/// across calls.
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub text: String,
    pub score: f32,
    pub document_id: String,
    pub owner: String,
}

/// One turn of a conversation in the canonical shape. Heterogeneous
/// transcript shapes are normalized into this at the store boundary
/// (see [`crate::history`]); no downstream code re-inspects raw shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_SYSTEM.to_string(),
            content: content.into(),
        }
    }
}

/// A retrieved passage handed to the chat provider as factual context.
/// Providers that support document grounding pass these natively;
/// others fold them into the final user turn.
#[derive(Debug, Clone, Serialize)]
pub struct GroundingDoc {
    pub text: String,
}

/// Metadata row for an uploaded document. The id is stable per
/// `(owner, name)` so re-ingestion replaces rather than duplicates.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub chunk_count: i64,
    pub dedup_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}
