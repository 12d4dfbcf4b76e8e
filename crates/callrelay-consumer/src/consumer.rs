//! The Transcript Consumer: one process-wide registry of
//! per-call subscription tasks, grown reactively by
//! [`ConsumerSubscribeNotifier::notify_first_fragment`] and pruned by an
//! idle sweep — never by continuous polling.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use callrelay_core::domain::{CallId, TranscriptEvent};
use callrelay_core::error::BusError;
use callrelay_core::ports::{BusPort, BusSubscription, ConsumerSubscribeNotifier};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConsumerConfig;
use crate::forwarder::Forwarder;

pub const TOPIC_PREFIX: &str = "transcript.";
pub const CONSUMER_GROUP: &str = "transcript-consumer";

/// One forward attempt that exhausted retries, kept for observability only
/// — never replayed automatically.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub call_id: CallId,
    pub seq: u64,
    pub failed_at: DateTime<Utc>,
    pub error: String,
}

struct SubscriptionState {
    subscribed_at: DateTime<Utc>,
    fragments_forwarded: AtomicU64,
    last_activity_at: Mutex<DateTime<Utc>>,
}

impl SubscriptionState {
    fn new() -> Self {
        Self {
            subscribed_at: Utc::now(),
            fragments_forwarded: AtomicU64::new(0),
            last_activity_at: Mutex::new(Utc::now()),
        }
    }

    async fn touch(&self) {
        self.fragments_forwarded.fetch_add(1, Ordering::Relaxed);
        *self.last_activity_at.lock().await = Utc::now();
    }

    async fn idle_for(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(*self.last_activity_at.lock().await)
    }
}

struct Subscription {
    handle: JoinHandle<()>,
    state: Arc<SubscriptionState>,
}

pub struct TranscriptConsumer {
    /// Lets `&self` methods (notably the `ConsumerSubscribeNotifier` impl)
    /// hand spawned tasks an `Arc<Self>` without callers needing to pass
    /// one in themselves.
    self_ref: std::sync::Weak<TranscriptConsumer>,
    bus: Arc<dyn BusPort>,
    config: ConsumerConfig,
    forwarder: Arc<Forwarder>,
    subscriptions: Mutex<HashMap<CallId, Subscription>>,
    dead_letters: Mutex<VecDeque<DeadLetter>>,
}

impl TranscriptConsumer {
    pub fn new(bus: Arc<dyn BusPort>, config: ConsumerConfig) -> Arc<Self> {
        let forwarder = Arc::new(Forwarder::new(
            config.app_base_url.clone(),
            config.forward_timeout,
            config.max_retries,
            config.retry_base_delay_ms,
        ));
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            bus,
            config,
            forwarder,
            subscriptions: Mutex::new(HashMap::new()),
            dead_letters: Mutex::new(VecDeque::new()),
        })
    }

    /// One-time crash-recovery sweep at startup: anything already
    /// publishing on `transcript.*` gets picked back up even if no fresh
    /// fragment arrives through the App ingest endpoint to re-trigger it.
    pub async fn recover(&self) -> Result<(), BusError> {
        let topics = self.bus.list_topics(TOPIC_PREFIX).await?;
        for topic in topics {
            if let Some(call_id) = topic.strip_prefix(TOPIC_PREFIX) {
                info!(call_id, "recovering transcript subscription at startup");
                self.subscribe_call(CallId::new(call_id)).await;
            }
        }
        Ok(())
    }

    /// Idempotent: subscribing a call already subscribed is a no-op.
    async fn subscribe_call(&self, call_id: CallId) {
        let Some(consumer) = self.self_ref.upgrade() else {
            return;
        };
        let mut subscriptions = self.subscriptions.lock().await;
        if subscriptions.contains_key(&call_id) {
            return;
        }

        let topic = format!("{TOPIC_PREFIX}{call_id}");
        let state = Arc::new(SubscriptionState::new());
        let handle = tokio::spawn(run_subscription(consumer, call_id.clone(), topic, state.clone()));
        subscriptions.insert(call_id, Subscription { handle, state });
    }

    /// Evicts subscriptions idle for longer than `callIdleMax`,
    /// aborting their task. Runs on `cleanup_interval`.
    pub async fn sweep_idle(&self) {
        let mut stale = Vec::new();
        {
            let subscriptions = self.subscriptions.lock().await;
            for (call_id, sub) in subscriptions.iter() {
                if sub.state.idle_for().await.num_seconds().max(0) as u64
                    >= self.config.call_idle_max.as_secs()
                {
                    stale.push(call_id.clone());
                }
            }
        }
        if stale.is_empty() {
            return;
        }
        let mut subscriptions = self.subscriptions.lock().await;
        for call_id in stale {
            if let Some(sub) = subscriptions.remove(&call_id) {
                sub.handle.abort();
                debug!(%call_id, "evicting idle transcript subscription");
            }
        }
    }

    /// Removes the subscription for `call_id` immediately, used by the
    /// Disposition flow once a call ends.
    pub async fn remove_subscription(&self, call_id: &CallId) {
        if let Some(sub) = self.subscriptions.lock().await.remove(call_id) {
            sub.handle.abort();
        }
    }

    fn record_dead_letter(&self, dead_letters: &mut VecDeque<DeadLetter>, entry: DeadLetter) {
        if dead_letters.len() >= self.config.dead_letter_capacity {
            dead_letters.pop_front();
        }
        dead_letters.push_back(entry);
    }

    /// Snapshot of final forward failures, for observability surfaces only.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().await.iter().cloned().collect()
    }

    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.lock().await.len()
    }
}

#[async_trait]
impl ConsumerSubscribeNotifier for TranscriptConsumer {
    async fn notify_first_fragment(&self, call_id: &CallId) {
        self.subscribe_call(call_id.clone()).await;
    }
}

/// The per-call subscription loop: forwards every fragment to the App API,
/// acking only on success so a failed forward is redelivered on the next
/// `subscribe` rather than silently dropped.
async fn run_subscription(
    consumer: Arc<TranscriptConsumer>,
    call_id: CallId,
    topic: String,
    state: Arc<SubscriptionState>,
) {
    let mut sub: Box<dyn BusSubscription> = match consumer
        .bus
        .subscribe(&topic, CONSUMER_GROUP, &consumer.config.consumer_name)
        .await
    {
        Ok(sub) => sub,
        Err(err) => {
            warn!(%call_id, error = %err, "failed to subscribe to transcript topic");
            return;
        }
    };

    loop {
        match sub.recv().await {
            Ok(Some(message)) => {
                let event: TranscriptEvent = match serde_json::from_slice(&message.payload) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(%call_id, error = %err, "dropping malformed transcript message");
                        continue;
                    }
                };

                match consumer.forwarder.forward(&event).await {
                    Ok(()) => {
                        state.touch().await;
                        if let Err(err) = sub.ack(&message.message_id).await {
                            warn!(%call_id, error = %err, "failed to ack transcript message");
                        }
                    }
                    Err(err) => {
                        warn!(%call_id, seq = event.seq, error = %err, "transcript forward failed, leaving unacked");
                        let mut dead_letters = consumer.dead_letters.lock().await;
                        consumer.record_dead_letter(
                            &mut dead_letters,
                            DeadLetter {
                                call_id: call_id.clone(),
                                seq: event.seq,
                                failed_at: Utc::now(),
                                error: err.to_string(),
                            },
                        );
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(%call_id, error = %err, "transcript subscription error");
            }
        }
    }
}

/// Background task: sweeps idle subscriptions every `cleanup_interval`
/// until cancelled.
pub async fn run_idle_sweep(consumer: Arc<TranscriptConsumer>, cancel: tokio_util::sync::CancellationToken) {
    let mut interval = tokio::time::interval(consumer.config.cleanup_interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => consumer.sweep_idle().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callrelay_bus::InMemoryBus;
    use callrelay_core::domain::{TenantId, TranscriptKind};
    use std::time::Duration;

    fn test_config() -> ConsumerConfig {
        let mut cfg = ConsumerConfig::new("http://127.0.0.1:0");
        cfg.call_idle_max = Duration::from_secs(0);
        cfg
    }

    fn sample_event(call_id: &str, seq: u64) -> TranscriptEvent {
        TranscriptEvent {
            call_id: CallId::new(call_id),
            tenant_id: TenantId::new("tenant-1"),
            seq,
            kind: TranscriptKind::Final,
            text: "hello".into(),
            confidence: 0.9,
            start_ms: 0,
            end_ms: 100,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn notify_first_fragment_is_idempotent() {
        let bus: Arc<dyn BusPort> = Arc::new(InMemoryBus::new());
        let consumer = TranscriptConsumer::new(bus, test_config());
        consumer.notify_first_fragment(&CallId::new("call-a")).await;
        consumer.notify_first_fragment(&CallId::new("call-a")).await;
        assert_eq!(consumer.subscription_count().await, 1);
    }

    #[tokio::test]
    async fn recover_subscribes_to_existing_transcript_topics() {
        let bus = Arc::new(InMemoryBus::new());
        bus.publish(
            "transcript.call-a",
            serde_json::to_vec(&sample_event("call-a", 1)).unwrap(),
        )
        .await
        .unwrap();

        let consumer = TranscriptConsumer::new(bus, test_config());
        consumer.recover().await.unwrap();
        assert_eq!(consumer.subscription_count().await, 1);
    }

    #[tokio::test]
    async fn sweep_idle_evicts_past_call_idle_max() {
        let bus: Arc<dyn BusPort> = Arc::new(InMemoryBus::new());
        let consumer = TranscriptConsumer::new(bus, test_config());
        consumer.notify_first_fragment(&CallId::new("call-a")).await;
        assert_eq!(consumer.subscription_count().await, 1);

        consumer.sweep_idle().await;
        assert_eq!(consumer.subscription_count().await, 0);
    }

    #[tokio::test]
    async fn remove_subscription_is_immediate() {
        let bus: Arc<dyn BusPort> = Arc::new(InMemoryBus::new());
        let consumer = TranscriptConsumer::new(bus, test_config());
        consumer.notify_first_fragment(&CallId::new("call-a")).await;
        consumer.remove_subscription(&CallId::new("call-a")).await;
        assert_eq!(consumer.subscription_count().await, 0);
    }

    #[tokio::test]
    async fn dead_letter_queue_is_bounded_fifo() {
        let bus: Arc<dyn BusPort> = Arc::new(InMemoryBus::new());
        let mut cfg = test_config();
        cfg.dead_letter_capacity = 2;
        let consumer = TranscriptConsumer::new(bus, cfg);

        let mut dead_letters = consumer.dead_letters.lock().await;
        for seq in 1..=3 {
            consumer.record_dead_letter(
                &mut dead_letters,
                DeadLetter {
                    call_id: CallId::new("call-a"),
                    seq,
                    failed_at: Utc::now(),
                    error: "boom".to_string(),
                },
            );
        }
        drop(dead_letters);

        let snapshot = consumer.dead_letters().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].seq, 2);
        assert_eq!(snapshot[1].seq, 3);
    }
}
