use anyhow::Result;
use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Prompt templates
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prompts (
            prompt_name TEXT PRIMARY KEY,
            system TEXT NOT NULL,
            user TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Conversation histories, keyed by (user_id, provider), value is a
    // JSON array of canonical {role, content} turns replaced wholesale
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conversations (
            user_id TEXT NOT NULL,
            provider TEXT NOT NULL,
            turns_json TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, provider)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Uploaded-document metadata
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            name TEXT NOT NULL,
            chunk_count INTEGER NOT NULL,
            dedup_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(owner, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner)")
        .execute(pool)
        .await?;

    Ok(())
}
