//! In-memory store implementation for tests and local runs.
//!
//! `HashMap`s behind `std::sync::RwLock`, one [`MemoryStore`] struct
//! implementing all three store traits.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{RagError, Result};
use crate::models::{ConversationTurn, DocumentRecord};
use crate::prompt::PromptTemplate;

use super::{ConversationStore, DocumentStore, PromptStore};

#[derive(Default)]
pub struct MemoryStore {
    prompts: RwLock<HashMap<String, PromptTemplate>>,
    conversations: RwLock<HashMap<(String, String), Vec<ConversationTurn>>>,
    documents: RwLock<HashMap<String, DocumentRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromptStore for MemoryStore {
    async fn resolve(&self, name: &str) -> Result<PromptTemplate> {
        let prompts = self.prompts.read().unwrap();
        match prompts.get(name) {
            Some(template) => Ok(template.clone()),
            None => Err(RagError::PromptNotFound(name.to_string())),
        }
    }

    async fn insert(&self, template: &PromptTemplate) -> Result<()> {
        let mut prompts = self.prompts.write().unwrap();
        prompts.insert(template.name.clone(), template.clone());
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn load(&self, user_id: &str, provider: &str) -> Result<Vec<ConversationTurn>> {
        let conversations = self.conversations.read().unwrap();
        Ok(conversations
            .get(&(user_id.to_string(), provider.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, user_id: &str, provider: &str, turns: &[ConversationTurn]) -> Result<()> {
        let mut conversations = self.conversations.write().unwrap();
        conversations.insert(
            (user_id.to_string(), provider.to_string()),
            turns.to_vec(),
        );
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn resolve_id(&self, owner: &str, name: &str) -> Result<String> {
        let documents = self.documents.read().unwrap();
        let existing = documents
            .values()
            .find(|d| d.owner == owner && d.name == name)
            .map(|d| d.id.clone());
        Ok(existing.unwrap_or_else(|| Uuid::new_v4().to_string()))
    }

    async fn record_upload(&self, doc: &DocumentRecord) -> Result<()> {
        let mut documents = self.documents.write().unwrap();
        documents.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn list_documents(&self, owner: &str) -> Result<Vec<DocumentRecord>> {
        let documents = self.documents.read().unwrap();
        let mut rows: Vec<DocumentRecord> = documents
            .values()
            .filter(|d| d.owner == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }
}
