//! Lets the App ingest endpoint ask the Transcript Consumer to subscribe to
//! a call's bus topic on first fragment, without the App crate
//! depending on the consumer's bus-subscription internals.

use crate::domain::CallId;
use async_trait::async_trait;

#[async_trait]
pub trait ConsumerSubscribeNotifier: Send + Sync {
    /// Requests that the consumer start forwarding `transcript.<call_id>`.
    /// Idempotent — calling it for an already-subscribed call is a no-op.
    async fn notify_first_fragment(&self, call_id: &CallId);
}

/// No-op implementation for deployments/tests where the Transcript
/// Consumer only discovers calls via its own startup recovery sweep.
pub struct NullConsumerSubscribeNotifier;

#[async_trait]
impl ConsumerSubscribeNotifier for NullConsumerSubscribeNotifier {
    async fn notify_first_fragment(&self, _call_id: &CallId) {}
}
