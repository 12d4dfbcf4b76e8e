//! SSE Hub: per-call broadcast of `AppEvent`s to connected browsers.
//!
//! Each call gets its own broadcast channel, but client bookkeeping (the
//! 20-client cap and 30 s idle sweep) is process-wide — the oldest client
//! anywhere is evicted on overflow, not the oldest within its own call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::sse::Event;
use callrelay_core::domain::{CallId, SseClientInfo};
use callrelay_core::events::AppEvent;
use callrelay_core::ports::AppEventEmitter;
use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// `maxConcurrentClients`: process-wide, not per call.
pub const MAX_CONCURRENT_CLIENTS: usize = 20;

/// Sweep cadence for the idle-client cleanup task.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Clients idle (no activity) longer than this are evicted by the sweep.
pub const CLIENT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

const CHANNEL_CAPACITY: usize = 256;

struct CallChannel {
    tx: broadcast::Sender<AppEvent>,
}

impl CallChannel {
    fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }
}

/// Registry of per-call broadcast channels plus a single process-wide
/// client list used for the connection cap and idle sweep.
pub struct SseHub {
    channels: Mutex<HashMap<CallId, CallChannel>>,
    /// Connection order across every call, oldest first.
    clients: Mutex<Vec<SseClientInfo>>,
    max_clients: usize,
}

impl SseHub {
    pub fn new(max_clients: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            clients: Mutex::new(Vec::new()),
            max_clients,
        }
    }

    /// Registers a new SSE client for `call_id`, evicting the globally
    /// oldest client if the process-wide cap is already reached, and
    /// returns that client's id plus a stream of axum SSE `Event`s ready to
    /// hand to `Sse::new`. The stream ends on its own once the client is
    /// evicted, by the idle sweep, or (via the id) by the caller.
    pub async fn subscribe(
        &self,
        call_id: CallId,
    ) -> (Uuid, impl futures_core::Stream<Item = Result<Event, axum::Error>>) {
        let mut channels = self.channels.lock().await;
        let channel = channels
            .entry(call_id.clone())
            .or_insert_with(CallChannel::new);
        let rx = channel.tx.subscribe();
        drop(channels);

        let client = SseClientInfo::new(call_id.clone());
        let client_id = client.id;
        let close = client.close.clone();
        {
            let mut clients = self.clients.lock().await;
            if clients.len() >= self.max_clients {
                let evicted = clients.remove(0);
                evicted.close.cancel();
                debug!(call_id = %evicted.call_id, client_id = %evicted.id, "evicting oldest SSE client over process-wide cap");
            }
            clients.push(client);
        }

        let events = BroadcastStream::new(rx).filter_map(move |msg| match msg {
            Ok(event) => Some(Ok(Event::default()
                .event(event.name())
                .json_data(event.data_json())
                .unwrap_or_else(|_| Event::default().event(event.name())))),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "SSE client lagged, dropping missed events");
                None
            }
            Err(broadcast::error::RecvError::Closed) => None,
        });

        let bounded = futures_util::StreamExt::take_until(events, close.cancelled_owned());
        (client_id, bounded)
    }

    /// Marks `client_id` as recently active, delaying its idle eviction.
    pub async fn touch_client(&self, client_id: Uuid) {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.iter_mut().find(|c| c.id == client_id) {
            client.touch();
        }
    }

    pub async fn remove_client(&self, client_id: Uuid) {
        let mut clients = self.clients.lock().await;
        clients.retain(|c| c.id != client_id);
    }

    /// Drops clients idle for longer than `CLIENT_IDLE_TIMEOUT` and removes
    /// call channels with no receivers left. Runs on `SWEEP_INTERVAL`.
    pub async fn sweep_idle(&self) {
        let now = Utc::now();
        let mut clients = self.clients.lock().await;
        clients.retain(|client| {
            let idle = client.idle_for(now).num_seconds().max(0) as u64;
            let keep = idle < CLIENT_IDLE_TIMEOUT.as_secs();
            if !keep {
                debug!(call_id = %client.call_id, client_id = %client.id, idle, "sweeping idle SSE client");
            }
            keep
        });
        drop(clients);

        let mut channels = self.channels.lock().await;
        channels.retain(|_, channel| channel.tx.receiver_count() > 0);
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }
}

#[async_trait]
impl AppEventEmitter for SseHub {
    async fn emit(&self, call_id: &CallId, event: AppEvent) {
        let channels = self.channels.lock().await;
        if let Some(channel) = channels.get(call_id) {
            // Send is non-blocking and failure (no receivers) is not an
            // error: the call may have no connected browsers right now.
            let _ = channel.tx.send(event);
        }
    }
}

/// Background task: sweeps idle SSE clients every `SWEEP_INTERVAL` until
/// cancelled.
pub async fn run_idle_sweep(hub: Arc<SseHub>, cancel: tokio_util::sync::CancellationToken) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => hub.sweep_idle().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt as _;

    fn call_id(s: &str) -> CallId {
        CallId::from(s.to_string())
    }

    #[tokio::test]
    async fn eviction_is_process_wide_across_calls() {
        let hub = SseHub::new(2);
        let (_id1, _s1) = hub.subscribe(call_id("call-a")).await;
        let (_id2, _s2) = hub.subscribe(call_id("call-b")).await;
        assert_eq!(hub.client_count().await, 2);

        let (_id3, _s3) = hub.subscribe(call_id("call-c")).await;
        // Cap is 2, globally: the call-a client was evicted even though
        // this new subscriber is on a different call entirely.
        assert_eq!(hub.client_count().await, 2);
    }

    #[tokio::test]
    async fn emit_with_no_subscribers_does_not_panic() {
        let hub = SseHub::new(MAX_CONCURRENT_CLIENTS);
        hub.emit(&call_id("call-a"), AppEvent::Ping).await;
    }

    #[tokio::test]
    async fn subscribed_client_receives_broadcast_event() {
        let hub = SseHub::new(MAX_CONCURRENT_CLIENTS);
        let id = call_id("call-a");
        let (_client_id, stream) = hub.subscribe(id.clone()).await;
        let mut stream = Box::pin(stream);
        hub.emit(&id, AppEvent::Hello { call_id: id.clone() }).await;

        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.to_string().contains("hello"), true);
    }

    #[tokio::test]
    async fn evicted_client_stream_ends() {
        let hub = SseHub::new(1);
        let (_id1, s1) = hub.subscribe(call_id("call-a")).await;
        let mut s1 = Box::pin(s1);

        // Pushes the cap and evicts call-a's client, cancelling its token.
        let (_id2, _s2) = hub.subscribe(call_id("call-b")).await;

        assert_eq!(s1.next().await, None);
    }
}
