//! SQLite pool construction.
//!
//! One WAL-mode pool is shared by every store trait the
//! [`SqliteStore`](crate::store::sqlite::SqliteStore) implements. The
//! database file and its parent directory are created on first
//! connect, so `docsearch init` works from an empty checkout.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::Config;

/// Upper bound on pooled connections. SQLite serializes writers
/// regardless, and a handful of readers covers the CLI workload.
const MAX_CONNECTIONS: u32 = 5;

/// Open the pool for the configured database path, creating the file
/// and any missing parent directories.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let path = &config.db.path;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory {}", parent.display())
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;

    fn config_at(path: std::path::PathBuf) -> Config {
        Config {
            db: DbConfig { path },
            chunking: Default::default(),
            retrieval: Default::default(),
            embedding: Default::default(),
            chat: Default::default(),
            qdrant: Default::default(),
            ingestion: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_connect_creates_nested_parent_directories() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("state").join("db").join("docsearch.sqlite");

        let pool = connect(&config_at(path.clone())).await.unwrap();
        sqlx::query("SELECT 1").execute(&pool).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_connect_is_reopenable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = config_at(tmp.path().join("docsearch.sqlite"));

        let pool = connect(&config).await.unwrap();
        sqlx::query("CREATE TABLE t (x INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let pool = connect(&config).await.unwrap();
        sqlx::query("SELECT x FROM t").fetch_all(&pool).await.unwrap();
    }
}
