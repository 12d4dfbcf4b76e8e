//! Persistence port for intents: append-only; the most recent row
//! per call is current.

use crate::domain::{CallId, Intent};
use crate::error::RepositoryError;
use async_trait::async_trait;

#[async_trait]
pub trait IntentRepository: Send + Sync {
    async fn append(&self, intent: &Intent) -> Result<(), RepositoryError>;

    /// The most recently appended intent row for a call, if any.
    async fn latest_for_call(&self, call_id: &CallId) -> Result<Option<Intent>, RepositoryError>;

    /// Deletes all intent rows for a call: disposal must prevent stale
    /// suggestions from surfacing on a later call reusing the same cache key.
    async fn delete_for_call(&self, call_id: &CallId) -> Result<(), RepositoryError>;
}
