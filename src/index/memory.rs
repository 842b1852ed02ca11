//! In-memory [`VectorIndex`] for tests and local runs.
//!
//! `RwLock`-guarded record list with brute-force cosine search. Honors
//! the same dimension, ownership, and ordering contracts as the Qdrant
//! backend, including rejecting writes whose vector length does not
//! match the collection dimension.

use std::collections::HashSet;
use std::sync::RwLock;

use anyhow::anyhow;
use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::models::{RetrievalHit, VectorRecord};

use super::{cosine_similarity, VectorIndex};

#[derive(Default)]
pub struct MemoryIndex {
    dims: RwLock<Option<usize>>,
    records: RwLock<Vec<VectorRecord>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, across all owners.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(&self, dims: usize) -> Result<()> {
        let mut stored = self.dims.write().unwrap();
        match *stored {
            Some(existing) if existing != dims => Err(RagError::VectorWriteFailed(anyhow!(
                "collection exists with dimension {}, requested {}",
                existing,
                dims
            ))),
            Some(_) => Ok(()),
            None => {
                *stored = Some(dims);
                Ok(())
            }
        }
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let dims = self.dims.read().unwrap().ok_or_else(|| {
            RagError::VectorWriteFailed(anyhow!("collection has not been created"))
        })?;

        for r in records {
            if r.vector.len() != dims {
                return Err(RagError::VectorWriteFailed(anyhow!(
                    "record {} has dimension {}, collection expects {}",
                    r.id,
                    r.vector.len(),
                    dims
                )));
            }
        }

        let ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let mut stored = self.records.write().unwrap();
        stored.retain(|r| !ids.contains(r.id.as_str()));
        stored.extend(records.iter().cloned());
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        owner: &str,
        document: Option<&str>,
        top_k: i64,
    ) -> Result<Vec<RetrievalHit>> {
        let stored = self.records.read().unwrap();
        let mut hits: Vec<RetrievalHit> = stored
            .iter()
            .filter(|r| r.payload.owner == owner)
            .filter(|r| document.map_or(true, |d| r.payload.document_id == d))
            .map(|r| RetrievalHit {
                text: r.payload.text.clone(),
                score: cosine_similarity(vector, &r.vector),
                document_id: r.payload.document_id.clone(),
                owner: r.payload.owner.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k.max(0) as usize);
        Ok(hits)
    }

    async fn delete_by_owner(&self, owner: &str, document: Option<&str>) -> Result<()> {
        let mut stored = self.records.write().unwrap();
        stored.retain(|r| {
            r.payload.owner != owner || document.map_or(false, |d| r.payload.document_id != d)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordPayload;

    fn record(id: &str, vector: Vec<f32>, owner: &str, doc: &str, ordinal: i64) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            vector,
            payload: RecordPayload {
                text: format!("text-{}", id),
                owner: owner.to_string(),
                document_id: doc.to_string(),
                chunk_ordinal: ordinal,
            },
        }
    }

    #[tokio::test]
    async fn test_ensure_collection_idempotent() {
        let index = MemoryIndex::new();
        index.ensure_collection(3).await.unwrap();
        index.ensure_collection(3).await.unwrap();
        assert!(index.ensure_collection(4).await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_rejects_dimension_mismatch() {
        let index = MemoryIndex::new();
        index.ensure_collection(3).await.unwrap();
        let err = index
            .upsert(&[record("a", vec![1.0, 0.0], "alice", "d1", 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::VectorWriteFailed(_)));
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let index = MemoryIndex::new();
        index.ensure_collection(2).await.unwrap();
        index
            .upsert(&[record("a", vec![1.0, 0.0], "alice", "d1", 0)])
            .await
            .unwrap();
        index
            .upsert(&[record("a", vec![0.0, 1.0], "alice", "d1", 0)])
            .await
            .unwrap();
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_owner_isolation() {
        let index = MemoryIndex::new();
        index.ensure_collection(2).await.unwrap();
        index
            .upsert(&[
                record("a", vec![1.0, 0.0], "alice", "d1", 0),
                record("b", vec![1.0, 0.0], "bob", "d2", 0),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], "alice", None, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|h| h.owner == "alice"));
    }

    #[tokio::test]
    async fn test_document_filter() {
        let index = MemoryIndex::new();
        index.ensure_collection(2).await.unwrap();
        index
            .upsert(&[
                record("a", vec![1.0, 0.0], "alice", "d1", 0),
                record("b", vec![1.0, 0.0], "alice", "d2", 0),
            ])
            .await
            .unwrap();

        let hits = index
            .search(&[1.0, 0.0], "alice", Some("d2"), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "d2");
    }

    #[tokio::test]
    async fn test_hits_sorted_descending() {
        let index = MemoryIndex::new();
        index.ensure_collection(2).await.unwrap();
        index
            .upsert(&[
                record("far", vec![0.0, 1.0], "alice", "d1", 0),
                record("near", vec![1.0, 0.0], "alice", "d1", 1),
                record("mid", vec![1.0, 1.0], "alice", "d1", 2),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], "alice", None, 10).await.unwrap();
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(hits[0].text, "text-near");
    }

    #[tokio::test]
    async fn test_top_k_truncation_and_empty_result() {
        let index = MemoryIndex::new();
        index.ensure_collection(2).await.unwrap();
        index
            .upsert(&[
                record("a", vec![1.0, 0.0], "alice", "d1", 0),
                record("b", vec![0.9, 0.1], "alice", "d1", 1),
                record("c", vec![0.8, 0.2], "alice", "d1", 2),
            ])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], "alice", None, 2).await.unwrap();
        assert_eq!(hits.len(), 2);

        let none = index.search(&[1.0, 0.0], "carol", None, 2).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_owner_scopes() {
        let index = MemoryIndex::new();
        index.ensure_collection(2).await.unwrap();
        index
            .upsert(&[
                record("a", vec![1.0, 0.0], "alice", "d1", 0),
                record("b", vec![1.0, 0.0], "alice", "d2", 0),
                record("c", vec![1.0, 0.0], "bob", "d3", 0),
            ])
            .await
            .unwrap();

        index.delete_by_owner("alice", Some("d1")).await.unwrap();
        assert_eq!(index.len(), 2);

        index.delete_by_owner("alice", None).await.unwrap();
        assert_eq!(index.len(), 1);
        let hits = index.search(&[1.0, 0.0], "bob", None, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
