//! # Docsearch CLI (`docsearch`)
//!
//! The `docsearch` binary is the command-line interface to the
//! retrieval-augmented question answering pipeline. It provides
//! commands for database initialization, document ingestion, question
//! answering, and prompt template management.
//!
//! ## Usage
//!
//! ```bash
//! docsearch --config ./config/docsearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docsearch init` | Create the SQLite database and seed the default prompt templates |
//! | `docsearch ingest <file>` | Chunk, embed, and index a plain-text document |
//! | `docsearch ask "<question>"` | Answer a question against the owner's documents |
//! | `docsearch documents` | List an owner's indexed documents |
//! | `docsearch prompt add` | Register or update a prompt template |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! docsearch init --config ./config/docsearch.toml
//!
//! # Ingest a document for a user
//! docsearch ingest notes.txt --owner alice --name travel-notes
//!
//! # Ask against the default provider
//! docsearch ask "What did I write about Paris?" --user alice
//!
//! # Ask through OpenAI with a custom prompt, scoped to one document
//! docsearch ask "Summarize it" --user alice --provider openai \
//!     --prompt default --document 3f2b...
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docsearch::chat::ProviderRegistry;
use docsearch::config::{self, Config};
use docsearch::embedding::create_embedder;
use docsearch::index::qdrant::QdrantIndex;
use docsearch::pipeline::{PipelineSettings, QueryRequest, RagOrchestrator};
use docsearch::prompt::{default_templates, PromptTemplate};
use docsearch::store::sqlite::SqliteStore;
use docsearch::store::PromptStore;
use docsearch::{db, migrate};

/// Docsearch CLI — retrieval-augmented question answering over
/// user-owned documents.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file. See `config/docsearch.example.toml` for a full
/// example.
#[derive(Parser)]
#[command(
    name = "docsearch",
    about = "Docsearch — retrieval-augmented question answering over user-owned documents",
    version,
    long_about = "Docsearch ingests plain-text documents per owner, chunks and embeds them into \
    a vector index, and answers questions by retrieving the owner's closest chunks, rendering \
    them into a prompt template, and calling a chat provider with the conversation history."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docsearch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and seed default prompts.
    ///
    /// Creates the SQLite database file and all required tables
    /// (prompts, conversations, documents), then inserts the built-in
    /// prompt templates if they are not already present. Idempotent.
    Init,

    /// Ingest a plain-text document.
    ///
    /// Splits the file into overlapping chunks, embeds them, and
    /// indexes the vectors under the owner. Re-ingesting the same
    /// owner + name replaces the previous chunks.
    Ingest {
        /// Path to the plain-text file to ingest.
        file: PathBuf,

        /// Owner the document belongs to; retrieval is scoped to this.
        #[arg(long)]
        owner: String,

        /// Stable document name. Defaults to the file name.
        #[arg(long)]
        name: Option<String>,
    },

    /// Answer a question against the user's indexed documents.
    Ask {
        /// The question to answer.
        question: String,

        /// User asking the question; retrieval and history are scoped
        /// to this id.
        #[arg(long)]
        user: String,

        /// Chat provider: `cohere` or `openai`. Defaults to the
        /// configured default provider.
        #[arg(long)]
        provider: Option<String>,

        /// Prompt template name.
        #[arg(long, default_value = "default")]
        prompt: String,

        /// Restrict retrieval to a single document id.
        #[arg(long)]
        document: Option<String>,

        /// Force the answer language instead of detecting it from the
        /// question.
        #[arg(long)]
        language: Option<String>,
    },

    /// List an owner's indexed documents.
    Documents {
        /// Owner whose documents to list.
        #[arg(long)]
        owner: String,
    },

    /// Manage prompt templates.
    Prompt {
        #[command(subcommand)]
        action: PromptAction,
    },
}

/// Prompt template subcommands.
#[derive(Subcommand)]
enum PromptAction {
    /// Register or update a prompt template.
    ///
    /// The user template may reference `{question}`, `{context}`, and
    /// `{language}` placeholders; anything else is rejected at render
    /// time.
    Add {
        /// Template name to register under.
        name: String,

        /// System-level instruction for the provider.
        #[arg(long)]
        system: String,

        /// User-facing template with placeholders.
        #[arg(long)]
        user: String,
    },
}

/// Build the orchestrator from config plus process environment.
async fn build_orchestrator(cfg: &Config) -> anyhow::Result<RagOrchestrator> {
    let pool = db::connect(cfg).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let index = Arc::new(QdrantIndex::new(&cfg.qdrant)?);
    let embedder: Arc<dyn docsearch::embedding::EmbeddingProvider> =
        Arc::from(create_embedder(&cfg.embedding)?);
    let registry = ProviderRegistry::from_env(&cfg.chat)?;

    Ok(RagOrchestrator::new(
        embedder,
        index,
        store.clone(),
        store.clone(),
        store,
        registry,
        PipelineSettings::from_config(cfg),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            let store = SqliteStore::new(pool);
            for template in default_templates() {
                if store.resolve(&template.name).await.is_err() {
                    store.insert(&template).await?;
                }
            }
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file, owner, name } => {
            let text = std::fs::read_to_string(&file)?;
            let name = name.unwrap_or_else(|| {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.display().to_string())
            });
            let orchestrator = build_orchestrator(&cfg).await?;
            let document_id = orchestrator.ingest(&text, &owner, &name).await?;
            println!("Indexed document {} as {}", name, document_id);
        }
        Commands::Ask {
            question,
            user,
            provider,
            prompt,
            document,
            language,
        } => {
            let orchestrator = build_orchestrator(&cfg).await?;
            let answer = orchestrator
                .answer(&QueryRequest {
                    user_id: user,
                    provider,
                    question,
                    prompt_name: prompt,
                    document,
                    language,
                    history: None,
                })
                .await?;
            println!("{}", answer.answer);
            if !answer.context_found {
                eprintln!("(no matching context was found for this question)");
            }
            if !answer.history_persisted {
                eprintln!("(warning: conversation history could not be saved)");
            }
        }
        Commands::Documents { owner } => {
            let orchestrator = build_orchestrator(&cfg).await?;
            let docs = orchestrator.list_documents(&owner).await?;
            if docs.is_empty() {
                println!("No documents indexed for {}.", owner);
            } else {
                println!("{:<38} {:<30} {:>8}", "ID", "NAME", "CHUNKS");
                for doc in docs {
                    println!("{:<38} {:<30} {:>8}", doc.id, doc.name, doc.chunk_count);
                }
            }
        }
        Commands::Prompt { action } => match action {
            PromptAction::Add { name, system, user } => {
                let pool = db::connect(&cfg).await?;
                let store = SqliteStore::new(pool);
                store
                    .insert(&PromptTemplate { name: name.clone(), system, user })
                    .await?;
                println!("Prompt template '{}' saved.", name);
            }
        },
    }

    Ok(())
}
