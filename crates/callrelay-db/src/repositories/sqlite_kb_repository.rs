//! `SQLite` implementation of `KbRepository`. Read-only from the
//! pipeline's perspective.

use async_trait::async_trait;
use callrelay_core::domain::KbArticle;
use callrelay_core::error::RepositoryError;
use callrelay_core::ports::KbRepository;
use sqlx::{Row, SqlitePool};

pub struct SqliteKbRepository {
    pool: SqlitePool,
}

impl SqliteKbRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KbRepository for SqliteKbRepository {
    async fn search_by_tags(
        &self,
        tags: &[String],
        limit: usize,
    ) -> Result<Vec<KbArticle>, RepositoryError> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query("SELECT id, title, snippet, tags, score FROM kb_articles ORDER BY score DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        let mut matches = Vec::new();
        for row in rows {
            let tags_json: String = row.get("tags");
            let row_tags: Vec<String> = serde_json::from_str(&tags_json)
                .map_err(|e| RepositoryError::Storage(e.to_string()))?;
            if row_tags.iter().any(|t| tags.contains(t)) {
                matches.push(KbArticle {
                    id: row.get("id"),
                    title: row.get("title"),
                    snippet: row.get("snippet"),
                    tags: row_tags,
                    score: row.get("score"),
                });
            }
            if matches.len() >= limit {
                break;
            }
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;

    #[tokio::test]
    async fn matches_seeded_fraud_article_by_tag() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteKbRepository::new(pool);

        let results = repo
            .search_by_tags(&["credit_card_fraud".to_string()], 5)
            .await
            .unwrap();
        assert!(results.iter().any(|a| a.id == "kb-fraud-001"));
    }

    #[tokio::test]
    async fn unrelated_tag_returns_no_articles() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteKbRepository::new(pool);

        let results = repo
            .search_by_tags(&["weather_forecast".to_string()], 5)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
