//! Crate-wide error taxonomy.
//!
//! Every pipeline stage maps its failures into one [`RagError`]
//! variant, so callers can tell a caller mistake (empty input, bad
//! chunking parameters, unknown provider) from a transient backend
//! failure without string-matching messages. Backend variants carry
//! their underlying cause as an `anyhow::Error` source.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Error)]
pub enum RagError {
    /// Ingestion was handed text with no content after trimming.
    #[error("document is empty")]
    EmptyDocument,

    /// The chunker produced zero chunks from non-empty text.
    #[error("chunking produced no chunks")]
    ChunkingFailed,

    /// Chunking parameters that can never terminate: the overlap must
    /// be strictly smaller than the window.
    #[error("invalid chunking parameters: overlap {overlap} must be less than chunk size {chunk_size}")]
    InvalidChunking { chunk_size: usize, overlap: usize },

    /// The embedding backend failed or returned a malformed response.
    #[error("embedding failed: {0}")]
    EmbeddingFailed(#[source] anyhow::Error),

    /// A write to the vector index failed; no partial state is kept.
    #[error("vector index write failed: {0}")]
    VectorWriteFailed(#[source] anyhow::Error),

    /// A vector index search failed.
    #[error("vector index search failed: {0}")]
    VectorSearchFailed(#[source] anyhow::Error),

    /// No prompt template registered under the given name.
    #[error("prompt template not found: {0}")]
    PromptNotFound(String),

    /// A template references a placeholder the renderer does not fill.
    #[error("unresolved placeholder in prompt template: {{{0}}}")]
    UnresolvedPlaceholder(String),

    /// A provider name outside the registry.
    #[error("unknown chat provider: {0}")]
    UnknownProvider(String),

    /// A known provider whose credential was absent at startup.
    #[error("missing credential for provider {provider}: set {env_var}")]
    MissingCredential { provider: String, env_var: String },

    /// The chat backend rejected or failed the request.
    #[error("chat provider {provider} call failed: {source}")]
    ProviderCallFailed {
        provider: String,
        #[source]
        source: anyhow::Error,
    },

    /// Conversation history could not be persisted. Non-fatal in the
    /// answer flow: the reply is still returned.
    #[error("history persistence failed: {0}")]
    HistoryPersistenceFailed(#[source] anyhow::Error),

    /// A metadata store read or write failed.
    #[error("storage operation failed: {0}")]
    StorageFailed(#[source] anyhow::Error),
}

impl RagError {
    /// Whether retrying the same call could plausibly succeed. Caller
    /// mistakes are never retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingFailed(_)
                | RagError::VectorWriteFailed(_)
                | RagError::VectorSearchFailed(_)
                | RagError::ProviderCallFailed { .. }
                | RagError::HistoryPersistenceFailed(_)
                | RagError::StorageFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_retriable_classification() {
        assert!(RagError::EmbeddingFailed(anyhow!("timeout")).is_retriable());
        assert!(RagError::ProviderCallFailed {
            provider: "cohere".to_string(),
            source: anyhow!("503"),
        }
        .is_retriable());
        assert!(!RagError::EmptyDocument.is_retriable());
        assert!(!RagError::UnknownProvider("mistral".to_string()).is_retriable());
        assert!(!RagError::InvalidChunking {
            chunk_size: 10,
            overlap: 10
        }
        .is_retriable());
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = RagError::PromptNotFound("sales".to_string());
        assert!(err.to_string().contains("sales"));

        let err = RagError::MissingCredential {
            provider: "openai".to_string(),
            env_var: "OPENAI_API_KEY".to_string(),
        };
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let err = RagError::UnresolvedPlaceholder("topic".to_string());
        assert!(err.to_string().contains("{topic}"));
    }
}
