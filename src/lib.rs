//! # Docsearch
//!
//! A retrieval-augmented question answering pipeline over user-owned
//! documents.
//!
//! Docsearch ingests plain-text documents per owner, chunks and embeds
//! them into a vector index, and answers questions by retrieving the
//! owner's closest chunks, rendering them into a prompt template, and
//! calling a chat provider with the running conversation history.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │ Document │──▶│   Pipeline    │──▶│  Qdrant    │
//! │  (text)  │   │ Chunk+Embed  │   │ (vectors)  │
//! └──────────┘   └──────────────┘   └─────┬─────┘
//!                                         │ search
//! ┌──────────┐   ┌──────────────┐         │
//! │ Question │──▶│ Orchestrator │◀────────┘
//! └──────────┘   │ prompt+chat  │──▶ Cohere / OpenAI
//!                └──────┬───────┘
//!                       ▼
//!                  ┌─────────┐
//!                  │ SQLite  │  prompts, conversations, documents
//!                  └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docsearch init                               # create database, seed prompts
//! docsearch ingest notes.txt --owner alice     # chunk, embed, index
//! docsearch ask "What did I write about Paris?" --user alice
//! docsearch documents --owner alice            # list indexed documents
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`chunk`] | Sliding-window text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index abstraction (Qdrant, in-memory) |
//! | [`prompt`] | Prompt templates and rendering |
//! | [`history`] | Conversation history normalization |
//! | [`language`] | Answer-language detection |
//! | [`chat`] | Chat providers and registry |
//! | [`store`] | Prompt / conversation / document stores |
//! | [`pipeline`] | End-to-end orchestration |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod history;
pub mod index;
pub mod language;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod store;
