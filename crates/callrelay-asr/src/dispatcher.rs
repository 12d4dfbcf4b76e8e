//! Process-level demux from the shared `audio_stream` bus topic to one
//! [`CallWorker`] task per `call_id`. The bus's consumer group
//! distributes `audio_stream` across every ASR worker process, but once a
//! frame lands here it is routed to a single owning task for that call.

use std::collections::HashMap;
use std::sync::Arc;

use callrelay_core::aggregator::AggregatorConfig;
use callrelay_core::domain::{AudioFrame, CallEndSignal, CallId};
use callrelay_core::ports::{BusPort, BusSubscription, ProviderSessionFactory};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::call_worker::{CallWorker, WorkerCommand};

pub const AUDIO_STREAM_TOPIC: &str = "audio_stream";
pub const CALL_END_TOPIC: &str = "call_end";
pub const CONSUMER_GROUP: &str = "asr-workers";

struct RoutedCall {
    tx: mpsc::UnboundedSender<WorkerCommand>,
    handle: JoinHandle<()>,
}

pub struct Dispatcher {
    bus: Arc<dyn BusPort>,
    provider_factory: Arc<dyn ProviderSessionFactory>,
    aggregator_config: AggregatorConfig,
    consumer_name: String,
    calls: HashMap<CallId, RoutedCall>,
}

impl Dispatcher {
    pub fn new(
        bus: Arc<dyn BusPort>,
        provider_factory: Arc<dyn ProviderSessionFactory>,
        aggregator_config: AggregatorConfig,
        consumer_name: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            provider_factory,
            aggregator_config,
            consumer_name: consumer_name.into(),
            calls: HashMap::new(),
        }
    }

    /// Subscribes to `audio_stream` and `call_end` and routes both until the
    /// audio subscription closes. Frames whose call has ended and been
    /// reaped are routed to a freshly spawned worker, matching the bus's
    /// at-least-once semantics: a late-arriving frame for an already-closed
    /// call simply starts (and then quickly drains) a new worker.
    pub async fn run(mut self) {
        let mut audio_sub = match self
            .bus
            .subscribe(AUDIO_STREAM_TOPIC, CONSUMER_GROUP, &self.consumer_name)
            .await
        {
            Ok(sub) => sub,
            Err(err) => {
                error!(error = %err, "failed to subscribe to audio_stream");
                return;
            }
        };
        let mut call_end_sub = match self
            .bus
            .subscribe(CALL_END_TOPIC, CONSUMER_GROUP, &self.consumer_name)
            .await
        {
            Ok(sub) => sub,
            Err(err) => {
                error!(error = %err, "failed to subscribe to call_end");
                return;
            }
        };

        loop {
            self.reap_finished_workers();
            tokio::select! {
                result = audio_sub.recv() => {
                    match result {
                        Ok(Some(message)) => {
                            let frame: AudioFrame = match serde_json::from_slice(&message.payload) {
                                Ok(frame) => frame,
                                Err(err) => {
                                    warn!(error = %err, "dropping malformed audio_stream frame");
                                    continue;
                                }
                            };
                            self.route(frame);
                            if let Err(err) = audio_sub.ack(&message.message_id).await {
                                warn!(error = %err, "failed to ack audio_stream message");
                            }
                        }
                        Ok(None) => break,
                        Err(err) => {
                            warn!(error = %err, "audio_stream subscription error");
                        }
                    }
                }
                result = call_end_sub.recv() => {
                    match result {
                        Ok(Some(message)) => {
                            match serde_json::from_slice::<CallEndSignal>(&message.payload) {
                                Ok(signal) => self.signal_call_end(&signal.call_id),
                                Err(err) => warn!(error = %err, "dropping malformed call_end signal"),
                            }
                            if let Err(err) = call_end_sub.ack(&message.message_id).await {
                                warn!(error = %err, "failed to ack call_end message");
                            }
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(error = %err, "call_end subscription error");
                        }
                    }
                }
            }
        }
    }

    fn route(&mut self, frame: AudioFrame) {
        let call_id = frame.call_id.clone();
        if !self.calls.contains_key(&call_id) {
            let routed = self.spawn_worker(&frame);
            self.calls.insert(call_id.clone(), routed);
        }
        let routed = self.calls.get(&call_id).expect("just inserted");
        if routed.tx.send(WorkerCommand::Audio(frame)).is_err() {
            self.calls.remove(&call_id);
        }
    }

    /// A new worker inherits its sample rate and channel count from the
    /// call's first frame; every subsequent frame for the same call is
    /// expected to share them (the Ingest Gateway normalizes per call).
    fn spawn_worker(&self, first_frame: &AudioFrame) -> RoutedCall {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = CallWorker::new(
            first_frame.call_id.clone(),
            first_frame.tenant_id.clone(),
            first_frame.sample_rate,
            first_frame.channels,
            self.aggregator_config,
            self.provider_factory.clone(),
            self.bus.clone(),
        );
        let handle = tokio::spawn(worker.run(rx));
        RoutedCall { tx, handle }
    }

    /// Removes bookkeeping for workers whose task has already finished
    /// (end-of-call or an unrecoverable error), so `calls` doesn't grow
    /// unbounded across a long-lived process.
    fn reap_finished_workers(&mut self) {
        self.calls.retain(|_, routed| !routed.handle.is_finished());
    }

    /// Signals end-of-call to the routed worker, if one exists. Called by
    /// whatever surface learns a call has ended (e.g. the App API's
    /// disposition path relays this via a side channel, or the gateway
    /// publishes a final frame — wiring is left to the binary crate that
    /// composes gateway, bus and this dispatcher together).
    pub fn signal_call_end(&mut self, call_id: &CallId) {
        if let Some(routed) = self.calls.get(call_id) {
            let _ = routed.tx.send(WorkerCommand::CallEnd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProviderFactory;
    use callrelay_bus::InMemoryBus;
    use callrelay_core::domain::{AudioEncoding, TenantId};

    fn test_frame(call_id: &str) -> AudioFrame {
        AudioFrame {
            call_id: CallId::new(call_id),
            tenant_id: TenantId::new("tenant-1"),
            seq: 1,
            sample_rate: 16_000,
            encoding: AudioEncoding::Pcm16,
            channels: 1,
            payload: vec![0u8; 640],
            timestamp_ms: 0,
        }
    }

    fn test_dispatcher() -> Dispatcher {
        Dispatcher::new(
            Arc::new(InMemoryBus::new()),
            Arc::new(MockProviderFactory),
            AggregatorConfig::p1(),
            "worker-test",
        )
    }

    #[tokio::test]
    async fn distinct_call_ids_are_routed_to_distinct_workers() {
        let mut dispatcher = test_dispatcher();
        dispatcher.route(test_frame("call-a"));
        dispatcher.route(test_frame("call-b"));
        assert_eq!(dispatcher.calls.len(), 2);
        assert!(dispatcher.calls.contains_key(&CallId::new("call-a")));
        assert!(dispatcher.calls.contains_key(&CallId::new("call-b")));
    }

    #[tokio::test]
    async fn same_call_id_reuses_the_existing_worker() {
        let mut dispatcher = test_dispatcher();
        dispatcher.route(test_frame("call-a"));
        dispatcher.route(test_frame("call-a"));
        assert_eq!(dispatcher.calls.len(), 1);
    }

    #[tokio::test]
    async fn ended_call_is_reaped_from_the_routing_table() {
        let mut dispatcher = test_dispatcher();
        dispatcher.route(test_frame("call-a"));
        dispatcher.signal_call_end(&CallId::new("call-a"));
        // Give the worker task a moment to observe CallEnd and exit.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        dispatcher.reap_finished_workers();
        assert!(dispatcher.calls.is_empty());
    }
}
