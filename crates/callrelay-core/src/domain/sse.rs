//! SSE client bookkeeping shared between the SSE Hub and callers that need
//! to reason about hub state (e.g. eviction order in tests).

use crate::domain::call::CallId;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SseClientInfo {
    pub id: Uuid,
    pub call_id: CallId,
    pub connected_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    /// Cancelled when this client is evicted, so its SSE stream can end the
    /// connection instead of lingering with a receiver nobody drains.
    pub close: CancellationToken,
}

impl SseClientInfo {
    pub fn new(call_id: CallId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            call_id,
            connected_at: now,
            last_activity_at: now,
            close: CancellationToken::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_activity_at
    }
}
