//! The durable topic log. A pull-based port: callers `subscribe` to
//! get a `BusSubscription` handle and drive their own receive loop, rather
//! than registering a callback — this keeps cancellation, backoff and
//! per-call task ownership entirely in the caller's hands.

use crate::error::BusError;
use async_trait::async_trait;

/// One delivered message. `message_id` is opaque and must be passed back to
/// `ack` after the handler completes successfully.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub message_id: String,
    pub payload: Vec<u8>,
}

/// A live subscription to one topic under one consumer group. Pending
/// entries (messages previously delivered to this consumer name but never
/// acked) are drained first, then live delivery begins — callers don't need
/// to know which phase they're in.
#[async_trait]
pub trait BusSubscription: Send {
    /// Awaits and returns the next message, or `None` if the subscription
    /// has been closed.
    async fn recv(&mut self) -> Result<Option<BusMessage>, BusError>;

    /// Acks a message. Must be called exactly once per successfully
    /// handled message; unacked messages become pending and are redelivered
    /// to this consumer on the next `subscribe`.
    async fn ack(&mut self, message_id: &str) -> Result<(), BusError>;
}

#[async_trait]
pub trait BusPort: Send + Sync {
    /// Publishes `payload` to `topic`, returning the assigned message id.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<String, BusError>;

    /// Joins `group` on `topic` as `consumer`, creating both lazily if
    /// absent. Only one producer and one consumer connection are held per
    /// process; implementations must be safe to call concurrently from
    /// many logical subscribers while honoring that cap internally.
    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
    ) -> Result<Box<dyn BusSubscription>, BusError>;

    /// Lists topic names currently known to the bus matching `prefix`, used
    /// only for the Transcript Consumer's one-time startup recovery sweep
    /// — never for continuous polling.
    async fn list_topics(&self, prefix: &str) -> Result<Vec<String>, BusError>;
}
