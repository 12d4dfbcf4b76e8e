//! `SQLite` implementation of `DispositionRepository`. One row per call;
//! written at most once.

use async_trait::async_trait;
use callrelay_core::domain::{CallId, Disposition};
use callrelay_core::error::RepositoryError;
use callrelay_core::ports::DispositionRepository;
use sqlx::{Row, SqlitePool};

pub struct SqliteDispositionRepository {
    pool: SqlitePool,
}

impl SqliteDispositionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DispositionRepository for SqliteDispositionRepository {
    async fn insert_if_absent(&self, disposition: Disposition) -> Result<Disposition, RepositoryError> {
        if let Some(existing) = self.get(&disposition.call_id).await? {
            return Ok(existing);
        }

        let categories_json = serde_json::to_string(&disposition.suggested_categories)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO dispositions (call_id, issue_summary, resolution, next_steps, suggested_categories, confidence)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(call_id) DO NOTHING
            "#,
        )
        .bind(disposition.call_id.as_str())
        .bind(&disposition.issue_summary)
        .bind(&disposition.resolution)
        .bind(&disposition.next_steps)
        .bind(&categories_json)
        .bind(disposition.confidence)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            // Lost a race with a concurrent end-of-call request; return
            // whatever the winner persisted.
            return self
                .get(&disposition.call_id)
                .await?
                .ok_or_else(|| RepositoryError::Storage("disposition vanished after insert race".into()));
        }

        Ok(disposition)
    }

    async fn get(&self, call_id: &CallId) -> Result<Option<Disposition>, RepositoryError> {
        let row = sqlx::query(
            "SELECT call_id, issue_summary, resolution, next_steps, suggested_categories, confidence FROM dispositions WHERE call_id = ?",
        )
        .bind(call_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let categories_json: String = row.get("suggested_categories");
        let suggested_categories: Vec<String> = serde_json::from_str(&categories_json)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(Some(Disposition {
            call_id: CallId::new(row.get::<String, _>("call_id")),
            issue_summary: row.get("issue_summary"),
            resolution: row.get("resolution"),
            next_steps: row.get("next_steps"),
            suggested_categories,
            confidence: row.get("confidence"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;

    fn sample(call_id: &str) -> Disposition {
        Disposition {
            call_id: CallId::new(call_id),
            issue_summary: "billing question".into(),
            resolution: "explained statement".into(),
            next_steps: "none".into(),
            suggested_categories: vec!["billing".into()],
            confidence: 0.7,
        }
    }

    #[tokio::test]
    async fn repeat_insert_returns_first_stored_disposition() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteDispositionRepository::new(pool);

        let first = repo.insert_if_absent(sample("c1")).await.unwrap();

        let mut second_attempt = sample("c1");
        second_attempt.issue_summary = "different summary".into();
        let second = repo.insert_if_absent(second_attempt).await.unwrap();

        assert_eq!(first.issue_summary, second.issue_summary);
        assert_eq!(second.issue_summary, "billing question");
    }
}
