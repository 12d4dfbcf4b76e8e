//! Persistence port for utterances: key `(call_id, seq)`, UPSERT on
//! conflict so duplicate delivery never produces two rows.

use crate::domain::{CallId, Utterance};
use crate::error::RepositoryError;
use async_trait::async_trait;

#[async_trait]
pub trait UtteranceRepository: Send + Sync {
    /// Inserts or updates the row for `(utterance.call_id, utterance.seq)`.
    /// Returns `true` if the row was inserted or its contents changed, and
    /// `false` for a true-duplicate upsert that left the row untouched.
    async fn upsert(&self, utterance: &Utterance) -> Result<bool, RepositoryError>;

    /// All utterances for a call, ordered by `seq` ascending.
    async fn list_for_call(&self, call_id: &CallId) -> Result<Vec<Utterance>, RepositoryError>;

    /// The highest `seq` persisted for a call, if any.
    async fn max_seq(&self, call_id: &CallId) -> Result<Option<u64>, RepositoryError>;

    /// Deletes all utterances for a call (disposal's default cleanup is
    /// intent-only, but tests and the dispose endpoint may also need this
    /// for full cleanup).
    async fn delete_for_call(&self, call_id: &CallId) -> Result<(), RepositoryError>;
}
