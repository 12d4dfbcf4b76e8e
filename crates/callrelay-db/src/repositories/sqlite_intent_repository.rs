//! `SQLite` implementation of `IntentRepository`. Append-only; the most
//! recent row per call is current.

use async_trait::async_trait;
use callrelay_core::domain::{CallId, Intent};
use callrelay_core::error::RepositoryError;
use callrelay_core::ports::IntentRepository;
use sqlx::{Row, SqlitePool};

pub struct SqliteIntentRepository {
    pool: SqlitePool,
}

impl SqliteIntentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntentRepository for SqliteIntentRepository {
    async fn append(&self, intent: &Intent) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO intents (call_id, seq, label, confidence) VALUES (?, ?, ?, ?)",
        )
        .bind(intent.call_id.as_str())
        .bind(intent.seq as i64)
        .bind(&intent.label)
        .bind(intent.confidence)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn latest_for_call(&self, call_id: &CallId) -> Result<Option<Intent>, RepositoryError> {
        let row = sqlx::query(
            "SELECT call_id, seq, label, confidence FROM intents WHERE call_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(call_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(row.map(|r| Intent {
            call_id: CallId::new(r.get::<String, _>("call_id")),
            seq: r.get::<i64, _>("seq") as u64,
            label: r.get("label"),
            confidence: r.get("confidence"),
        }))
    }

    async fn delete_for_call(&self, call_id: &CallId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM intents WHERE call_id = ?")
            .bind(call_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;

    #[tokio::test]
    async fn latest_for_call_returns_most_recently_appended() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteIntentRepository::new(pool);
        let call_id = CallId::new("c1");

        repo.append(&Intent {
            call_id: call_id.clone(),
            seq: 1,
            label: "account_balance".into(),
            confidence: 0.8,
        })
        .await
        .unwrap();
        repo.append(&Intent {
            call_id: call_id.clone(),
            seq: 2,
            label: "credit_card_fraud".into(),
            confidence: 0.9,
        })
        .await
        .unwrap();

        let latest = repo.latest_for_call(&call_id).await.unwrap().unwrap();
        assert_eq!(latest.label, "credit_card_fraud");
    }

    #[tokio::test]
    async fn delete_for_call_removes_dispose_isolation() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteIntentRepository::new(pool);
        let call_id = CallId::new("c1");
        repo.append(&Intent {
            call_id: call_id.clone(),
            seq: 1,
            label: "credit_card_fraud".into(),
            confidence: 0.9,
        })
        .await
        .unwrap();

        repo.delete_for_call(&call_id).await.unwrap();

        assert!(repo.latest_for_call(&call_id).await.unwrap().is_none());
    }
}
