//! Persistence port for dispositions: one row per call, written at
//! most once; repeat call-end requests return the stored row unchanged
//!.

use crate::domain::{CallId, Disposition};
use crate::error::RepositoryError;
use async_trait::async_trait;

#[async_trait]
pub trait DispositionRepository: Send + Sync {
    /// Inserts the disposition if one does not already exist for this
    /// call; if one exists, returns it instead without overwriting.
    async fn insert_if_absent(&self, disposition: Disposition) -> Result<Disposition, RepositoryError>;

    async fn get(&self, call_id: &CallId) -> Result<Option<Disposition>, RepositoryError>;
}
