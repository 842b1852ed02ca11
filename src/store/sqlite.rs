//! SQLite store implementation over an sqlx pool.
//!
//! One [`SqliteStore`] implements all three store traits. Histories
//! are stored as a JSON array of canonical turns and replaced wholesale
//! on save; documents are upserted by `(owner, name)` so re-ingestion
//! keeps a stable id.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{RagError, Result};
use crate::models::{ConversationTurn, DocumentRecord};
use crate::prompt::PromptTemplate;

use super::{ConversationStore, DocumentStore, PromptStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn storage_err(e: sqlx::Error) -> RagError {
    RagError::StorageFailed(e.into())
}

#[async_trait]
impl PromptStore for SqliteStore {
    async fn resolve(&self, name: &str) -> Result<PromptTemplate> {
        let row = sqlx::query("SELECT system, user FROM prompts WHERE prompt_name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        match row {
            Some(row) => Ok(PromptTemplate {
                name: name.to_string(),
                system: row.get("system"),
                user: row.get("user"),
            }),
            None => Err(RagError::PromptNotFound(name.to_string())),
        }
    }

    async fn insert(&self, template: &PromptTemplate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO prompts (prompt_name, system, user) VALUES (?, ?, ?)
            ON CONFLICT(prompt_name) DO UPDATE SET
                system = excluded.system,
                user = excluded.user
            "#,
        )
        .bind(&template.name)
        .bind(&template.system)
        .bind(&template.user)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn load(&self, user_id: &str, provider: &str) -> Result<Vec<ConversationTurn>> {
        let row: Option<String> = sqlx::query_scalar(
            "SELECT turns_json FROM conversations WHERE user_id = ? AND provider = ?",
        )
        .bind(user_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some(json) => {
                serde_json::from_str(&json).map_err(|e| RagError::StorageFailed(e.into()))
            }
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, user_id: &str, provider: &str, turns: &[ConversationTurn]) -> Result<()> {
        let json = serde_json::to_string(turns)
            .map_err(|e| RagError::HistoryPersistenceFailed(e.into()))?;
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO conversations (user_id, provider, turns_json, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, provider) DO UPDATE SET
                turns_json = excluded.turns_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(provider)
        .bind(&json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| RagError::HistoryPersistenceFailed(e.into()))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn resolve_id(&self, owner: &str, name: &str) -> Result<String> {
        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM documents WHERE owner = ? AND name = ?")
                .bind(owner)
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;

        Ok(existing.unwrap_or_else(|| Uuid::new_v4().to_string()))
    }

    async fn record_upload(&self, doc: &DocumentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, owner, name, chunk_count, dedup_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(owner, name) DO UPDATE SET
                chunk_count = excluded.chunk_count,
                dedup_hash = excluded.dedup_hash,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.owner)
        .bind(&doc.name)
        .bind(doc.chunk_count)
        .bind(&doc.dedup_hash)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn list_documents(&self, owner: &str) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            "SELECT id, owner, name, chunk_count, dedup_hash, created_at, updated_at \
             FROM documents WHERE owner = ? ORDER BY name",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows
            .into_iter()
            .map(|row| DocumentRecord {
                id: row.get("id"),
                owner: row.get("owner"),
                name: row.get("name"),
                chunk_count: row.get("chunk_count"),
                dedup_hash: row.get("dedup_hash"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }
}
