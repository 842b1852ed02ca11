//! Qdrant-backed [`VectorIndex`] over the REST API.
//!
//! One collection per deployment, cosine metric, dimension fixed to the
//! embedding provider's output size. Payload fields: `text`, `owner`,
//! `document_id`, `chunk_ordinal`. Every search request carries the
//! owner filter as a `must` condition; deletion reuses the same filter
//! shape for replace-mode re-ingestion.

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::QdrantConfig;
use crate::error::{RagError, Result};
use crate::models::{RecordPayload, RetrievalHit, VectorRecord};

use super::VectorIndex;

pub struct QdrantIndex {
    base_url: String,
    collection: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl QdrantIndex {
    /// Create a client for the configured Qdrant deployment. The
    /// optional `QDRANT_API_KEY` env var is attached to every request.
    pub fn new(config: &QdrantConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::VectorWriteFailed(e.into()))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            api_key: std::env::var("QDRANT_API_KEY").ok(),
            client,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> anyhow::Result<Value> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Qdrant API error {}: {}", status, body_text));
        }
        Ok(response.json().await?)
    }
}

/// Build the Qdrant payload filter for an owner scope plus optional
/// document scope. Both are exact-match `must` conditions.
fn scope_filter(owner: &str, document: Option<&str>) -> Value {
    let mut must = vec![json!({ "key": "owner", "match": { "value": owner } })];
    if let Some(doc) = document {
        must.push(json!({ "key": "document_id", "match": { "value": doc } }));
    }
    json!({ "must": must })
}

/// Parse one entry of a Qdrant search response into a [`RetrievalHit`].
fn parse_hit(value: &Value) -> anyhow::Result<RetrievalHit> {
    let score = value
        .get("score")
        .and_then(|s| s.as_f64())
        .ok_or_else(|| anyhow!("Qdrant hit missing score"))? as f32;
    let payload: RecordPayload = serde_json::from_value(
        value
            .get("payload")
            .cloned()
            .ok_or_else(|| anyhow!("Qdrant hit missing payload"))?,
    )?;

    Ok(RetrievalHit {
        text: payload.text,
        score,
        document_id: payload.document_id,
        owner: payload.owner,
    })
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, dims: usize) -> Result<()> {
        let listing = self
            .send(reqwest::Method::GET, "/collections", None)
            .await
            .map_err(RagError::VectorWriteFailed)?;

        let exists = listing["result"]["collections"]
            .as_array()
            .map(|cols| {
                cols.iter()
                    .any(|c| c["name"].as_str() == Some(self.collection.as_str()))
            })
            .unwrap_or(false);

        if exists {
            return Ok(());
        }

        tracing::info!(
            collection = %self.collection,
            dims,
            "creating Qdrant collection"
        );
        let body = json!({
            "vectors": { "size": dims, "distance": "Cosine" }
        });
        self.send(
            reqwest::Method::PUT,
            &format!("/collections/{}", self.collection),
            Some(&body),
        )
        .await
        .map_err(RagError::VectorWriteFailed)?;
        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let points: Vec<Value> = records
            .iter()
            .map(|r| {
                json!({
                    "id": r.id,
                    "vector": r.vector,
                    "payload": r.payload,
                })
            })
            .collect();

        tracing::debug!(count = records.len(), "upserting vectors into Qdrant");
        self.send(
            reqwest::Method::PUT,
            &format!("/collections/{}/points?wait=true", self.collection),
            Some(&json!({ "points": points })),
        )
        .await
        .map_err(RagError::VectorWriteFailed)?;
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        owner: &str,
        document: Option<&str>,
        top_k: i64,
    ) -> Result<Vec<RetrievalHit>> {
        let body = json!({
            "vector": vector,
            "limit": top_k,
            "with_payload": true,
            "filter": scope_filter(owner, document),
        });

        let response = self
            .send(
                reqwest::Method::POST,
                &format!("/collections/{}/points/search", self.collection),
                Some(&body),
            )
            .await
            .map_err(RagError::VectorSearchFailed)?;

        let hits = response["result"]
            .as_array()
            .map(|items| items.iter().map(parse_hit).collect::<anyhow::Result<_>>())
            .transpose()
            .map_err(RagError::VectorSearchFailed)?
            .unwrap_or_default();

        Ok(hits)
    }

    async fn delete_by_owner(&self, owner: &str, document: Option<&str>) -> Result<()> {
        let body = json!({ "filter": scope_filter(owner, document) });
        self.send(
            reqwest::Method::POST,
            &format!("/collections/{}/points/delete?wait=true", self.collection),
            Some(&body),
        )
        .await
        .map_err(RagError::VectorWriteFailed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_filter_owner_only() {
        let filter = scope_filter("alice", None);
        let must = filter["must"].as_array().unwrap();
        assert_eq!(must.len(), 1);
        assert_eq!(must[0]["key"], "owner");
        assert_eq!(must[0]["match"]["value"], "alice");
    }

    #[test]
    fn test_scope_filter_with_document() {
        let filter = scope_filter("alice", Some("doc-7"));
        let must = filter["must"].as_array().unwrap();
        assert_eq!(must.len(), 2);
        assert_eq!(must[1]["key"], "document_id");
        assert_eq!(must[1]["match"]["value"], "doc-7");
    }

    #[test]
    fn test_parse_hit() {
        let value = json!({
            "id": "11111111-2222-3333-4444-555555555555",
            "score": 0.87,
            "payload": {
                "text": "Paris is the capital of France.",
                "owner": "alice",
                "document_id": "doc-1",
                "chunk_ordinal": 0
            }
        });
        let hit = parse_hit(&value).unwrap();
        assert_eq!(hit.owner, "alice");
        assert_eq!(hit.document_id, "doc-1");
        assert!((hit.score - 0.87).abs() < 1e-6);
    }

    #[test]
    fn test_parse_hit_rejects_missing_payload() {
        let value = json!({ "id": "x", "score": 0.5 });
        assert!(parse_hit(&value).is_err());
    }
}
