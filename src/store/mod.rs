//! Persistence traits for prompts, conversation histories, and
//! uploaded-document metadata.
//!
//! The pipeline only ever talks to these traits, enabling pluggable
//! backends: SQLite for deployments, in-memory for tests and local
//! experiments.
//!
//! | Trait | Owns |
//! |-------|------|
//! | [`PromptStore`] | named `{system, user}` template pairs |
//! | [`ConversationStore`] | per `(user_id, provider)` ordered histories |
//! | [`DocumentStore`] | uploaded-document metadata rows |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ConversationTurn, DocumentRecord};
use crate::prompt::PromptTemplate;

#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Look up a template by name. Absence is
    /// [`RagError::PromptNotFound`](crate::error::RagError::PromptNotFound),
    /// never a default.
    async fn resolve(&self, name: &str) -> Result<PromptTemplate>;

    /// Insert or replace a template under its name.
    async fn insert(&self, template: &PromptTemplate) -> Result<()>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the history for `(user_id, provider)`. A missing history is
    /// an empty one, never an error.
    async fn load(&self, user_id: &str, provider: &str) -> Result<Vec<ConversationTurn>>;

    /// Replace the stored history wholesale (last-writer-wins at the
    /// store level; the orchestrator serializes writers per key).
    async fn save(&self, user_id: &str, provider: &str, turns: &[ConversationTurn]) -> Result<()>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return the stable document id for `(owner, name)`: the existing
    /// row's id if one exists, otherwise a fresh UUID. Nothing is
    /// persisted until [`record_upload`](DocumentStore::record_upload).
    async fn resolve_id(&self, owner: &str, name: &str) -> Result<String>;

    /// Persist (or refresh) the metadata row after a successful
    /// ingestion.
    async fn record_upload(&self, doc: &DocumentRecord) -> Result<()>;

    /// List all documents an owner has uploaded.
    async fn list_documents(&self, owner: &str) -> Result<Vec<DocumentRecord>>;
}
