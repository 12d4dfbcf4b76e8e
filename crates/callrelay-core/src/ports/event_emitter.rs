//! Decouples services that need to broadcast (Intent+KB, Disposition) from
//! the concrete SSE Hub implementation, which lives in `callrelay-app` and
//! depends on axum.

use crate::domain::CallId;
use crate::events::AppEvent;
use async_trait::async_trait;

#[async_trait]
pub trait AppEventEmitter: Send + Sync {
    /// Best-effort broadcast to every SSE client subscribed to `call_id`.
    /// Never fails the caller: a broadcast with no subscribed clients, or
    /// one where a client write fails, is not an error.
    async fn emit(&self, call_id: &CallId, event: AppEvent);
}
