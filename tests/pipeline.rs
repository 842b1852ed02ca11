//! End-to-end tests for the ingestion and answering pipeline.
//!
//! These tests prove the orchestrator's guarantees through its real
//! trait seams, with deterministic in-process fakes standing in for
//! the network backends: a byte-histogram embedder, an echoing chat
//! provider, and the in-memory index and stores shipped with the
//! crate.

use async_trait::async_trait;
use docsearch::chat::{ChatProvider, ProviderRegistry};
use docsearch::config::IngestionMode;
use docsearch::embedding::{EmbeddingProvider, InputType};
use docsearch::error::{RagError, Result};
use docsearch::index::memory::MemoryIndex;
use docsearch::models::{ConversationTurn, GroundingDoc};
use docsearch::pipeline::{PipelineSettings, QueryRequest, RagOrchestrator};
use docsearch::prompt::default_templates;
use docsearch::store::memory::MemoryStore;
use docsearch::store::{ConversationStore, DocumentStore, PromptStore};
use serde_json::json;
use std::sync::Arc;

// ─── Fake Embedder ──────────────────────────────────────────────────

const FAKE_DIMS: usize = 8;

/// Deterministic embedder: an 8-bin byte histogram, so identical texts
/// get identical vectors and similar texts land close together.
struct FakeEmbedder;

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-histogram"
    }

    fn dims(&self) -> usize {
        FAKE_DIMS
    }

    async fn embed(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; FAKE_DIMS];
                for byte in text.bytes() {
                    v[byte as usize % FAKE_DIMS] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Embedder that always fails, for abort-path tests.
struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        FAKE_DIMS
    }

    async fn embed(&self, _texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>> {
        Err(RagError::EmbeddingFailed(anyhow::anyhow!(
            "backend unavailable"
        )))
    }
}

// ─── Fake Chat Providers ────────────────────────────────────────────

/// Replies with the last turn's content plus a marker for each
/// grounding document it was handed.
#[derive(Debug)]
struct EchoChat;

#[async_trait]
impl ChatProvider for EchoChat {
    fn name(&self) -> &str {
        "echo"
    }

    async fn chat(
        &self,
        turns: &[ConversationTurn],
        _system: &str,
        documents: Option<&[GroundingDoc]>,
    ) -> Result<String> {
        let last = turns.last().map(|t| t.content.as_str()).unwrap_or("");
        let doc_count = documents.map(|d| d.len()).unwrap_or(0);
        Ok(format!("echo[{}]: {}", doc_count, last))
    }
}

/// Sleeps before replying so overlapping calls genuinely interleave.
#[derive(Debug)]
struct SlowChat;

#[async_trait]
impl ChatProvider for SlowChat {
    fn name(&self) -> &str {
        "echo"
    }

    async fn chat(
        &self,
        turns: &[ConversationTurn],
        _system: &str,
        _documents: Option<&[GroundingDoc]>,
    ) -> Result<String> {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        Ok(format!(
            "slow: {}",
            turns.last().map(|t| t.content.as_str()).unwrap_or("")
        ))
    }
}

#[derive(Debug)]
struct FailingChat;

#[async_trait]
impl ChatProvider for FailingChat {
    fn name(&self) -> &str {
        "echo"
    }

    async fn chat(
        &self,
        _turns: &[ConversationTurn],
        _system: &str,
        _documents: Option<&[GroundingDoc]>,
    ) -> Result<String> {
        Err(RagError::ProviderCallFailed {
            provider: "echo".to_string(),
            source: anyhow::anyhow!("model overloaded"),
        })
    }
}

// ─── Failing Conversation Store ─────────────────────────────────────

/// Wraps [`MemoryStore`] but refuses to save history.
struct FailingSaveStore {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl ConversationStore for FailingSaveStore {
    async fn load(&self, user_id: &str, provider: &str) -> Result<Vec<ConversationTurn>> {
        self.inner.load(user_id, provider).await
    }

    async fn save(&self, _user_id: &str, _provider: &str, _turns: &[ConversationTurn]) -> Result<()> {
        Err(RagError::HistoryPersistenceFailed(anyhow::anyhow!(
            "disk full"
        )))
    }
}

// ─── Harness ────────────────────────────────────────────────────────

struct Harness {
    orchestrator: RagOrchestrator,
    index: Arc<MemoryIndex>,
    store: Arc<MemoryStore>,
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        chunk_size: 8,
        overlap: 2,
        top_k: 5,
        context_k: 3,
        ingestion_mode: IngestionMode::Replace,
        default_provider: "echo".to_string(),
    }
}

async fn harness_with(
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatProvider>,
    conversations: Option<Arc<dyn ConversationStore>>,
) -> Harness {
    let index = Arc::new(MemoryIndex::new());
    let store = Arc::new(MemoryStore::new());
    for template in default_templates() {
        store.insert(&template).await.unwrap();
    }

    let mut registry = ProviderRegistry::new();
    registry.register(chat);

    let conversations: Arc<dyn ConversationStore> =
        conversations.unwrap_or_else(|| store.clone() as Arc<dyn ConversationStore>);

    let orchestrator = RagOrchestrator::new(
        embedder,
        index.clone(),
        store.clone(),
        conversations,
        store.clone(),
        registry,
        settings(),
    );
    Harness {
        orchestrator,
        index,
        store,
    }
}

async fn harness() -> Harness {
    harness_with(Arc::new(FakeEmbedder), Arc::new(EchoChat), None).await
}

fn ask(user: &str, question: &str) -> QueryRequest {
    QueryRequest {
        user_id: user.to_string(),
        provider: None,
        question: question.to_string(),
        prompt_name: "default".to_string(),
        document: None,
        language: None,
        history: None,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ingest_then_answer_end_to_end() {
    let h = harness().await;

    h.orchestrator
        .ingest("Paris is the capital of France.", "alice", "facts")
        .await
        .unwrap();

    let answer = h.orchestrator.answer(&ask("alice", "capital of France")).await.unwrap();

    assert!(answer.context_found);
    assert!(answer.history_persisted);
    // The rendered prompt carries the retrieved chunk into the provider.
    assert!(answer.answer.contains("Paris is the capital of France."));
    assert!(answer.answer.contains("capital of France"));

    // Both turns of the exchange were persisted.
    let history = h.store.load("alice", "echo").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, "user");
    assert_eq!(history[1].role, "assistant");
}

#[tokio::test]
async fn test_retrieval_returns_closest_chunk_first() {
    let h = harness().await;

    h.orchestrator
        .ingest(
            "alpha beta gamma delta epsilon zeta eta theta \
             one two three four five six seven eight",
            "alice",
            "mixed",
        )
        .await
        .unwrap();

    // The question repeats one chunk's tokens, so the byte histogram
    // puts that chunk closest.
    let answer = h.orchestrator
        .answer(&ask("alice", "alpha beta gamma delta"))
        .await
        .unwrap();
    assert!(answer.context_found);
    assert!(answer.answer.contains("alpha beta gamma delta"));
}

#[tokio::test]
async fn test_reingest_replaces_previous_chunks() {
    let h = harness().await;

    let first_id = h.orchestrator
        .ingest("one two three four five six seven eight nine ten", "alice", "doc")
        .await
        .unwrap();
    let count_after_first = h.index.len();

    let second_id = h.orchestrator
        .ingest("eleven twelve thirteen", "alice", "doc")
        .await
        .unwrap();

    // Same name resolves to the same document id, and only the latest
    // version's chunks remain.
    assert_eq!(first_id, second_id);
    assert_eq!(h.index.len(), 1);
    assert!(count_after_first > 1);

    let docs = h.store.list_documents("alice").await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].chunk_count, 1);
}

#[tokio::test]
async fn test_owner_isolation() {
    let h = harness().await;

    h.orchestrator
        .ingest("alice secret travel plans", "alice", "diary")
        .await
        .unwrap();

    // Bob asks with the exact words of Alice's document.
    let answer = h.orchestrator
        .answer(&ask("bob", "alice secret travel plans"))
        .await
        .unwrap();

    assert!(!answer.context_found);
    assert!(!answer.answer.contains("secret travel plans"));
}

#[tokio::test]
async fn test_document_scoped_retrieval() {
    let h = harness().await;

    let cooking = h.orchestrator
        .ingest("flour sugar butter eggs", "alice", "recipes")
        .await
        .unwrap();
    h.orchestrator
        .ingest("flour sugar butter eggs", "alice", "shopping")
        .await
        .unwrap();

    let mut req = ask("alice", "flour sugar");
    req.document = Some(cooking.clone());
    let answer = h.orchestrator.answer(&req).await.unwrap();
    assert!(answer.context_found);

    req.document = Some("no-such-document".to_string());
    let answer = h.orchestrator.answer(&req).await.unwrap();
    assert!(!answer.context_found);
}

#[tokio::test]
async fn test_empty_document_rejected() {
    let h = harness().await;
    let err = h.orchestrator.ingest("   \n\t ", "alice", "empty").await.unwrap_err();
    assert!(matches!(err, RagError::EmptyDocument));
    assert!(h.index.is_empty());
}

#[tokio::test]
async fn test_embedding_failure_leaves_index_untouched() {
    let h = harness_with(Arc::new(FailingEmbedder), Arc::new(EchoChat), None).await;

    let err = h.orchestrator
        .ingest("some perfectly fine text", "alice", "doc")
        .await
        .unwrap_err();

    assert!(matches!(err, RagError::EmbeddingFailed(_)));
    assert!(h.index.is_empty());
    assert!(h.store.list_documents("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_failure_leaves_history_untouched() {
    let h = harness_with(Arc::new(FakeEmbedder), Arc::new(FailingChat), None).await;

    h.orchestrator
        .ingest("some indexed text", "alice", "doc")
        .await
        .unwrap();

    let err = h.orchestrator.answer(&ask("alice", "anything")).await.unwrap_err();
    assert!(matches!(err, RagError::ProviderCallFailed { .. }));

    // The failed exchange must not leak a dangling user turn.
    let history = h.store.load("alice", "echo").await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_save_failure_still_returns_answer() {
    let inner = Arc::new(MemoryStore::new());
    let failing: Arc<dyn ConversationStore> = Arc::new(FailingSaveStore { inner });
    let h = harness_with(Arc::new(FakeEmbedder), Arc::new(EchoChat), Some(failing)).await;

    let answer = h.orchestrator.answer(&ask("alice", "hello")).await.unwrap();

    assert!(!answer.answer.is_empty());
    assert!(!answer.history_persisted);
}

#[tokio::test]
async fn test_caller_supplied_history_overrides_stored() {
    let h = harness().await;

    // Seed stored history that must be ignored.
    h.store
        .save("alice", "echo", &[ConversationTurn::user("stale turn")])
        .await
        .unwrap();

    let mut req = ask("alice", "fresh question");
    req.history = Some(vec![
        json!({"role": "user", "message": "supplied turn"}),
        json!({"role": "chatbot", "text": "supplied reply"}),
    ]);
    let answer = h.orchestrator.answer(&req).await.unwrap();
    assert!(answer.history_persisted);

    // Saved history is the normalized supplied one plus the new exchange.
    let history = h.store.load("alice", "echo").await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].content, "supplied turn");
    assert_eq!(history[1].role, "assistant");
    assert_eq!(history[1].content, "supplied reply");
}

#[tokio::test]
async fn test_concurrent_answers_lose_no_turns() {
    let h = harness_with(Arc::new(FakeEmbedder), Arc::new(SlowChat), None).await;

    let req_a = ask("alice", "first question");
    let req_b = ask("alice", "second question");
    let (a, b) = tokio::join!(
        h.orchestrator.answer(&req_a),
        h.orchestrator.answer(&req_b),
    );
    a.unwrap();
    b.unwrap();

    // Two serialized exchanges leave four turns, whatever the order.
    let history = h.store.load("alice", "echo").await.unwrap();
    assert_eq!(history.len(), 4);
}

#[tokio::test]
async fn test_unknown_provider_rejected() {
    let h = harness().await;
    let mut req = ask("alice", "q");
    req.provider = Some("mistral".to_string());
    let err = h.orchestrator.answer(&req).await.unwrap_err();
    assert!(matches!(err, RagError::UnknownProvider(_)));
}

#[tokio::test]
async fn test_missing_prompt_rejected() {
    let h = harness().await;
    let mut req = ask("alice", "q");
    req.prompt_name = "no-such-template".to_string();
    let err = h.orchestrator.answer(&req).await.unwrap_err();
    assert!(matches!(err, RagError::PromptNotFound(_)));
}

#[tokio::test]
async fn test_arabic_question_selects_arabic_language() {
    let h = harness().await;

    // No forced language: detection runs on the question text.
    let answer = h.orchestrator
        .answer(&ask("alice", "ما هي عاصمة فرنسا؟"))
        .await
        .unwrap();
    assert!(answer.answer.contains("arabic"));

    let mut req = ask("alice", "ما هي عاصمة فرنسا؟");
    req.language = Some("english".to_string());
    let answer = h.orchestrator.answer(&req).await.unwrap();
    assert!(answer.answer.contains("english"));
}
