//! `SQLite` implementation of `UtteranceRepository`.

use async_trait::async_trait;
use callrelay_core::domain::{CallId, Speaker, Utterance};
use callrelay_core::error::RepositoryError;
use callrelay_core::ports::UtteranceRepository;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

pub struct SqliteUtteranceRepository {
    pool: SqlitePool,
}

impl SqliteUtteranceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UtteranceRepository for SqliteUtteranceRepository {
    async fn upsert(&self, utterance: &Utterance) -> Result<bool, RepositoryError> {
        // The DO UPDATE's WHERE clause makes a true-duplicate upsert (same
        // text and speaker) a no-op row-wise, so `rows_affected()` is 0
        // rather than 1 and callers can tell "inserted/changed" apart from
        // "already had this exact content".
        let result = sqlx::query(
            r#"
            INSERT INTO utterances (call_id, seq, text, speaker, ts)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(call_id, seq) DO UPDATE SET
                text = excluded.text,
                speaker = excluded.speaker,
                ts = excluded.ts
            WHERE excluded.text != utterances.text
               OR excluded.speaker != utterances.speaker
            "#,
        )
        .bind(utterance.call_id.as_str())
        .bind(utterance.seq as i64)
        .bind(&utterance.text)
        .bind(utterance.speaker.as_str())
        .bind(utterance.ts.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_call(&self, call_id: &CallId) -> Result<Vec<Utterance>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT call_id, seq, text, speaker, ts FROM utterances WHERE call_id = ? ORDER BY seq ASC",
        )
        .bind(call_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        rows.iter().map(row_to_utterance).collect()
    }

    async fn max_seq(&self, call_id: &CallId) -> Result<Option<u64>, RepositoryError> {
        let row = sqlx::query("SELECT MAX(seq) as max_seq FROM utterances WHERE call_id = ?")
            .bind(call_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;

        let max_seq: Option<i64> = row.get("max_seq");
        Ok(max_seq.map(|v| v as u64))
    }

    async fn delete_for_call(&self, call_id: &CallId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM utterances WHERE call_id = ?")
            .bind(call_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn row_to_utterance(row: &sqlx::sqlite::SqliteRow) -> Result<Utterance, RepositoryError> {
    let ts_raw: String = row.get("ts");
    let ts: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_raw)
        .map_err(|e| RepositoryError::Storage(e.to_string()))?
        .with_timezone(&Utc);
    let speaker_raw: String = row.get("speaker");
    Ok(Utterance {
        call_id: CallId::new(row.get::<String, _>("call_id")),
        seq: row.get::<i64, _>("seq") as u64,
        text: row.get("text"),
        speaker: Speaker::parse(&speaker_raw),
        ts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;

    fn sample(call_id: &str, seq: u64, text: &str) -> Utterance {
        Utterance {
            call_id: CallId::new(call_id),
            seq,
            text: text.to_string(),
            speaker: Speaker::Unknown,
            ts: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_for_same_key() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteUtteranceRepository::new(pool);

        repo.upsert(&sample("c1", 1, "hello")).await.unwrap();
        repo.upsert(&sample("c1", 1, "hello")).await.unwrap();
        repo.upsert(&sample("c1", 1, "hello")).await.unwrap();

        let rows = repo.list_for_call(&CallId::new("c1")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "hello");
    }

    #[tokio::test]
    async fn upsert_updates_text_on_conflict() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteUtteranceRepository::new(pool);

        repo.upsert(&sample("c1", 7, "foo")).await.unwrap();
        repo.upsert(&sample("c1", 7, "foo-corrected")).await.unwrap();

        let rows = repo.list_for_call(&CallId::new("c1")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "foo-corrected");
    }

    #[tokio::test]
    async fn upsert_reports_inserted_vs_true_duplicate() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteUtteranceRepository::new(pool);

        assert!(repo.upsert(&sample("c1", 1, "hello")).await.unwrap());
        assert!(!repo.upsert(&sample("c1", 1, "hello")).await.unwrap());
        assert!(repo.upsert(&sample("c1", 1, "hello-corrected")).await.unwrap());
    }

    #[tokio::test]
    async fn max_seq_reflects_highest_persisted_value() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteUtteranceRepository::new(pool);
        assert_eq!(repo.max_seq(&CallId::new("c1")).await.unwrap(), None);

        repo.upsert(&sample("c1", 1, "a")).await.unwrap();
        repo.upsert(&sample("c1", 3, "b")).await.unwrap();
        assert_eq!(repo.max_seq(&CallId::new("c1")).await.unwrap(), Some(3));
    }
}
