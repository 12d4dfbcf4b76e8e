//! One task per call: owns the `ChunkAggregator`, the provider
//! session and its lifecycle, and publishes `TranscriptEvent`s. No state is
//! shared with other calls beyond the `BusPort` and `ProviderSessionFactory`
//! handles, both of which are safe to use concurrently.

use std::sync::Arc;
use std::time::{Duration, Instant};

use callrelay_core::aggregator::{AggregatorConfig, ChunkAggregator};
use callrelay_core::domain::{AudioFrame, CallId, TenantId, TranscriptEvent, TranscriptKind};
use callrelay_core::error::BusError;
use callrelay_core::ports::{BusPort, ProviderEvent, ProviderSession, ProviderSessionFactory};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Reopen is attempted at most this many times per call before the
/// call transitions to `Closed` with a synthetic error final.
const MAX_RECONNECT: u32 = 3;
/// Readiness poll cadence and timeout.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);
const READY_TIMEOUT: Duration = Duration::from_secs(3);

pub enum WorkerCommand {
    Audio(AudioFrame),
    CallEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Idle,
    Opening,
    Ready,
    Draining,
    Closed,
}

pub struct CallWorker {
    call_id: CallId,
    tenant_id: TenantId,
    sample_rate: u32,
    aggregator: ChunkAggregator,
    provider_factory: Arc<dyn ProviderSessionFactory>,
    bus: Arc<dyn BusPort>,
    session: Option<Box<dyn ProviderSession>>,
    provider_events: Option<mpsc::UnboundedReceiver<ProviderEvent>>,
    state: ConnectionState,
    reconnect_count: u32,
    last_seq: u64,
}

impl CallWorker {
    pub fn new(
        call_id: CallId,
        tenant_id: TenantId,
        sample_rate: u32,
        channels: u8,
        config: AggregatorConfig,
        provider_factory: Arc<dyn ProviderSessionFactory>,
        bus: Arc<dyn BusPort>,
    ) -> Self {
        Self {
            call_id,
            tenant_id,
            sample_rate,
            aggregator: ChunkAggregator::new(config, sample_rate, channels),
            provider_factory,
            bus,
            session: None,
            provider_events: None,
            state: ConnectionState::Idle,
            reconnect_count: 0,
            last_seq: 0,
        }
    }

    /// Drives this call until `CallEnd` or the command channel closes.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<WorkerCommand>) {
        let mut tick = tokio::time::interval(self.aggregator.processing_timer());
        let mut keepalive = tokio::time::interval(self.aggregator.keepalive_period());

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(WorkerCommand::Audio(frame)) => {
                            self.aggregator.push(frame.payload);
                            self.tick_aggregator().await;
                        }
                        Some(WorkerCommand::CallEnd) | None => {
                            self.end_call().await;
                            break;
                        }
                    }
                }
                _ = tick.tick() => {
                    self.tick_aggregator().await;
                }
                _ = keepalive.tick() => {
                    self.send_keepalive().await;
                }
                event = Self::recv_provider_event(&mut self.provider_events) => {
                    if let Some(event) = event {
                        self.handle_provider_event(event).await;
                    }
                }
            }
        }
    }

    async fn recv_provider_event(
        rx: &mut Option<mpsc::UnboundedReceiver<ProviderEvent>>,
    ) -> Option<ProviderEvent> {
        match rx {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    async fn tick_aggregator(&mut self) {
        if let Some(bytes) = self.aggregator.decide(Instant::now()) {
            self.ensure_session_and_send(bytes).await;
        }
    }

    /// Per-call single-flight session creation — safe without an explicit
    /// lock because only this task ever touches `self.session`.
    async fn ensure_session_and_send(&mut self, bytes: Vec<u8>) {
        if self.session.is_none() && !self.open_session().await {
            return;
        }

        if !self.wait_until_ready().await {
            warn!(call_id = %self.call_id, "provider not ready within timeout, reopening");
            self.reopen().await;
            if let Some(session) = self.session.as_mut() {
                let _ = session.send(&bytes).await;
            }
            return;
        }

        if let Some(session) = self.session.as_mut() {
            if let Err(err) = session.send(&bytes).await {
                warn!(call_id = %self.call_id, error = %err, "send failed, reopening and retrying once");
                self.reopen().await;
                if let Some(session) = self.session.as_mut() {
                    let _ = session.send(&bytes).await;
                }
            }
        }
    }

    async fn open_session(&mut self) -> bool {
        self.state = ConnectionState::Opening;
        match self.provider_factory.open(self.sample_rate).await {
            Ok((session, events)) => {
                self.session = Some(session);
                self.provider_events = Some(events);
                self.state = ConnectionState::Ready;
                self.reconnect_count = 0;
                true
            }
            Err(err) => {
                warn!(call_id = %self.call_id, error = %err, "provider open failed");
                self.state = ConnectionState::Idle;
                false
            }
        }
    }

    /// Polls both the protocol-level ready flag and the transport state
    /// before allowing a send.
    async fn wait_until_ready(&mut self) -> bool {
        let deadline = Instant::now() + READY_TIMEOUT;
        loop {
            let Some(session) = self.session.as_ref() else {
                return false;
            };
            if session.is_ready()
                && session.transport_state() == callrelay_core::ports::TransportState::Open
            {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    async fn reopen(&mut self) {
        if self.reconnect_count >= MAX_RECONNECT {
            warn!(call_id = %self.call_id, "reconnect limit exceeded, closing call with error final");
            self.state = ConnectionState::Closed;
            self.session = None;
            self.provider_events = None;
            self.publish_synthetic_final(true).await;
            return;
        }

        self.reconnect_count += 1;
        if let Some(mut session) = self.session.take() {
            let _ = session.close().await;
        }
        self.provider_events = None;
        self.open_session().await;
    }

    async fn send_keepalive(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if session.is_ready() {
                if let Err(err) = session.keep_alive().await {
                    warn!(call_id = %self.call_id, error = %err, "keep-alive failed");
                }
            }
        }
    }

    async fn handle_provider_event(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::Ready => {
                self.state = ConnectionState::Ready;
            }
            ProviderEvent::Transcript(t) => {
                // Empty transcripts are dropped unless final, so downstream
                // seq stays contiguous for stream termination.
                if t.text.is_empty() && !t.is_final {
                    return;
                }
                self.last_seq += 1;
                let event = TranscriptEvent {
                    call_id: self.call_id.clone(),
                    tenant_id: self.tenant_id.clone(),
                    seq: self.last_seq,
                    kind: if t.is_final { TranscriptKind::Final } else { TranscriptKind::Partial },
                    text: t.text,
                    confidence: t.confidence,
                    start_ms: t.start_ms,
                    end_ms: t.end_ms,
                    created_at: Utc::now(),
                };
                self.publish(event).await;
            }
            ProviderEvent::Error(err) => {
                warn!(call_id = %self.call_id, error = %err, "provider error event, reopening");
                self.reopen().await;
            }
            ProviderEvent::Closed => {
                info!(call_id = %self.call_id, "provider session closed");
                self.session = None;
                self.provider_events = None;
                self.state = ConnectionState::Idle;
            }
        }
    }

    /// Flush remaining audio, close cleanly, and publish a synthetic final
    /// marker so consumers see stream termination.
    async fn end_call(&mut self) {
        self.state = ConnectionState::Draining;
        if self.aggregator.total_buffered_ms() >= self.aggregator.timeout_fallback_min_ms() {
            if let Some(bytes) = self.aggregator.flush_all() {
                self.ensure_session_and_send(bytes).await;
            }
        }
        if let Some(mut session) = self.session.take() {
            let _ = session.close().await;
        }
        self.provider_events = None;
        self.state = ConnectionState::Closed;
        self.publish_synthetic_final(false).await;
    }

    /// A synthetic empty final, published on both a clean end-of-call drain
    /// and a reconnect-budget exhaustion, so downstream consumers always
    /// see stream termination with `seq = lastSeq + 1`.
    async fn publish_synthetic_final(&mut self, _is_error: bool) {
        self.last_seq += 1;
        let event = TranscriptEvent {
            call_id: self.call_id.clone(),
            tenant_id: self.tenant_id.clone(),
            seq: self.last_seq,
            kind: TranscriptKind::Final,
            text: String::new(),
            confidence: 0.0,
            start_ms: 0,
            end_ms: 0,
            created_at: Utc::now(),
        };
        self.publish(event).await;
    }

    async fn publish(&self, event: TranscriptEvent) {
        let topic = format!("transcript.{}", self.call_id);
        let payload = match serde_json::to_vec(&event) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(call_id = %self.call_id, error = %err, "failed to serialize transcript event");
                return;
            }
        };
        if let Err(err) = self.publish_with_retry(&topic, payload).await {
            warn!(call_id = %self.call_id, error = %err, "failed to publish transcript after retries");
        }
    }

    /// Downstream publish errors are retried with bounded backoff; audio
    /// consumption is never blocked on this.
    async fn publish_with_retry(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let mut backoff = Duration::from_millis(100);
        for attempt in 0..5 {
            match self.bus.publish(topic, payload.clone()).await {
                Ok(_) => return Ok(()),
                Err(err) if attempt == 4 => return Err(err),
                Err(_) => {
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProviderFactory;
    use callrelay_bus::InMemoryBus;
    use callrelay_core::ports::BusSubscription;

    async fn drain_transcripts(bus: &InMemoryBus, call_id: &CallId) -> Vec<TranscriptEvent> {
        let topic = format!("transcript.{call_id}");
        let mut sub = bus.subscribe(&topic, "test", "test-consumer").await.unwrap();
        let mut events = Vec::new();
        while let Ok(Some(msg)) =
            tokio::time::timeout(Duration::from_millis(200), sub.recv()).await
        {
            events.push(serde_json::from_slice(&msg.payload).unwrap());
            sub.ack(&msg.message_id).await.unwrap();
        }
        events
    }

    #[tokio::test]
    async fn end_of_call_with_no_buffered_audio_publishes_synthetic_empty_final() {
        let bus = InMemoryBus::new();
        let call_id = CallId::new("call-1");
        let worker = CallWorker::new(
            call_id.clone(),
            TenantId::new("tenant-1"),
            16_000,
            1,
            AggregatorConfig::p1(),
            Arc::new(MockProviderFactory),
            Arc::new(bus.clone()),
        );

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(WorkerCommand::CallEnd).unwrap();
        worker.run(rx).await;

        let events = drain_transcripts(&bus, &call_id).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, TranscriptKind::Final);
        assert_eq!(events[0].text, "");
        assert_eq!(events[0].seq, 1);
    }

    #[tokio::test]
    async fn audio_frame_triggers_a_transcript_once_initial_burst_is_reached() {
        let bus = InMemoryBus::new();
        let call_id = CallId::new("call-2");
        let worker = CallWorker::new(
            call_id.clone(),
            TenantId::new("tenant-1"),
            16_000,
            1,
            AggregatorConfig::p1(),
            Arc::new(MockProviderFactory),
            Arc::new(bus.clone()),
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(worker.run(rx));

        // 13 * 20ms = 260ms, clears the 250ms p1 initial burst threshold.
        for _ in 0..13 {
            let frame = AudioFrame {
                call_id: call_id.clone(),
                tenant_id: TenantId::new("tenant-1"),
                seq: 1,
                sample_rate: 16_000,
                encoding: callrelay_core::domain::AudioEncoding::Pcm16,
                channels: 1,
                payload: vec![0u8; 16_000 / 1000 * 20 * 2],
                timestamp_ms: 0,
            };
            tx.send(WorkerCommand::Audio(frame)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(WorkerCommand::CallEnd).unwrap();
        handle.await.unwrap();

        let events = drain_transcripts(&bus, &call_id).await;
        assert!(events.iter().any(|e| e.text.starts_with("mock transcript")));
    }
}
