//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait covers everything the pipeline needs from
//! a vector backend: idempotent collection setup, batched upsert,
//! owner-scoped similarity search, and owner-scoped deletion for
//! replace-mode re-ingestion.
//!
//! The owner filter on [`search`](VectorIndex::search) is a mandatory
//! parameter, not an option: it is the per-tenant isolation boundary,
//! and a missing filter must be impossible to express at the call site.
//!
//! | Implementation | Backend |
//! |----------------|---------|
//! | [`QdrantIndex`](qdrant::QdrantIndex) | Qdrant REST API |
//! | [`MemoryIndex`](memory::MemoryIndex) | In-process brute-force cosine |

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{RetrievalHit, VectorRecord};

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the backing collection with the given dimension and
    /// cosine metric if absent; no-op otherwise. Safe on every startup.
    async fn ensure_collection(&self, dims: usize) -> Result<()>;

    /// Write or overwrite records by id. All-or-nothing from the
    /// caller's perspective; any backend rejection fails the call.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Return at most `top_k` hits matching the owner (and document,
    /// if given), ordered by descending similarity. No match is an
    /// empty result, never an error.
    async fn search(
        &self,
        vector: &[f32],
        owner: &str,
        document: Option<&str>,
        top_k: i64,
    ) -> Result<Vec<RetrievalHit>>;

    /// Remove every record in the owner (and optional document) scope.
    async fn delete_by_owner(&self, owner: &str, document: Option<&str>) -> Result<()>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
