//! Database setup and initialization.
//!
//! Provides `setup_database()` for initializing the `SQLite` database with
//! the full schema. Entry points call this with the resolved
//! database path.

use anyhow::Result;
use sqlx::{SqlitePool, sqlite::SqliteConnectOptions};
use std::path::Path;

/// Sets up the `SQLite` database connection and ensures the schema exists.
pub async fn setup_database(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true),
    )
    .await?;

    create_schema(&pool).await?;
    seed_kb_articles(&pool).await?;

    Ok(pool)
}

/// Sets up an in-memory `SQLite` database for testing.
#[cfg(any(test, feature = "test-utils"))]
pub async fn setup_test_database() -> Result<SqlitePool> {
    let pool = SqlitePool::connect("sqlite::memory:").await?;
    create_schema(&pool).await?;
    seed_kb_articles(&pool).await?;
    Ok(pool)
}

/// Creates the complete database schema. Safe to call multiple times; all
/// statements use `IF NOT EXISTS`.
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS utterances (
            call_id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            text TEXT NOT NULL,
            speaker TEXT NOT NULL,
            ts TEXT NOT NULL,
            PRIMARY KEY (call_id, seq)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_utterances_call_id ON utterances(call_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS intents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            call_id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            label TEXT NOT NULL,
            confidence REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_intents_call_id ON intents(call_id, id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dispositions (
            call_id TEXT PRIMARY KEY NOT NULL,
            issue_summary TEXT NOT NULL,
            resolution TEXT NOT NULL,
            next_steps TEXT NOT NULL,
            suggested_categories TEXT NOT NULL DEFAULT '[]',
            confidence REAL NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kb_articles (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL,
            snippet TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            score REAL NOT NULL DEFAULT 0.0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Migration: confidence floor columns added after the initial release;
    // best-effort, ignored if already present.
    let _ = sqlx::query("ALTER TABLE intents ADD COLUMN confidence REAL DEFAULT 0.0")
        .execute(pool)
        .await;

    Ok(())
}

/// Seeds a small fixed set of KB articles so Intent+KB is exercisable
/// without an external content pipeline (outside this system's scope —
/// the table is read-only from the pipeline's perspective).
async fn seed_kb_articles(pool: &SqlitePool) -> Result<()> {
    let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM kb_articles")
        .fetch_one(pool)
        .await?;
    if existing.0 > 0 {
        return Ok(());
    }

    let seeds: &[(&str, &str, &str, &[&str])] = &[
        (
            "kb-billing-001",
            "Understanding your monthly statement",
            "Walks through each line item on a customer's bill.",
            &["billing", "account_balance"],
        ),
        (
            "kb-fraud-001",
            "Reporting suspected card fraud",
            "Steps to freeze a card and open a fraud case.",
            &["credit_card_fraud", "security"],
        ),
        (
            "kb-cancel-001",
            "Cancelling a subscription",
            "How to process a cancellation and applicable refund policy.",
            &["cancellation", "billing"],
        ),
    ];

    for (id, title, snippet, tags) in seeds {
        let tags_json = serde_json::to_string(tags)?;
        sqlx::query(
            "INSERT INTO kb_articles (id, title, snippet, tags, score) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(title)
        .bind(snippet)
        .bind(tags_json)
        .bind(1.0)
        .execute(pool)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_test_database() {
        let pool = setup_test_database().await.unwrap();

        let _: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM utterances")
            .fetch_one(&pool)
            .await
            .unwrap();

        let (kb_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM kb_articles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(kb_count, 3);
    }
}
