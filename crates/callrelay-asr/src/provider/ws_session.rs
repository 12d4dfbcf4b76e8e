//! Shared WebSocket plumbing for the `p1`/`p2` vendor adapters:
//! open, send binary PCM, send a JSON keep-alive, and fan provider replies
//! out to an `mpsc` channel read independently of `send` (the
//! fire-and-forget contract).

use async_trait::async_trait;
use base64::Engine;
use callrelay_core::error::ProviderError;
use callrelay_core::ports::{ProviderEvent, ProviderSession, ProviderSessionFactory, ProviderTranscript, TransportState};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::warn;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Per-vendor wire details: the endpoint URL and the exact keep-alive
/// payload the vendor expects on the same transport as audio.
pub struct VendorConfig {
    pub ws_url: String,
    pub keepalive_payload: String,
}

pub struct WsProviderFactory {
    pub vendor: VendorConfig,
}

#[async_trait]
impl ProviderSessionFactory for WsProviderFactory {
    async fn open(
        &self,
        sample_rate: u32,
    ) -> Result<(Box<dyn ProviderSession>, mpsc::UnboundedReceiver<ProviderEvent>), ProviderError> {
        let url = format!("{}?sample_rate={sample_rate}", self.vendor.ws_url);
        let (ws, _response) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let (sink, mut source) = ws.split();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let reader_tx = event_tx.clone();
        tokio::spawn(async move {
            let _ = reader_tx.send(ProviderEvent::Ready);
            while let Some(msg) = source.next().await {
                match msg {
                    Ok(Message::Text(text)) => match parse_vendor_event(&text) {
                        Some(event) => {
                            if reader_tx.send(event).is_err() {
                                break;
                            }
                        }
                        None => warn!(payload = %text, "unrecognized provider message"),
                    },
                    Ok(Message::Close(_)) => {
                        let _ = reader_tx.send(ProviderEvent::Closed);
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        let _ = reader_tx.send(ProviderEvent::Error(err.to_string()));
                        break;
                    }
                }
            }
        });

        let keepalive_payload = self.vendor.keepalive_payload.clone();
        Ok((
            Box::new(WsSession {
                sink,
                keepalive_payload,
                ready: true,
                state: TransportState::Open,
            }),
            event_rx,
        ))
    }
}

#[derive(Deserialize)]
struct VendorTranscriptMessage {
    text: String,
    confidence: f32,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    start_ms: u64,
    #[serde(default)]
    end_ms: u64,
}

fn parse_vendor_event(raw: &str) -> Option<ProviderEvent> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    match value.get("type").and_then(|t| t.as_str())? {
        "transcript" => {
            let msg: VendorTranscriptMessage = serde_json::from_value(value).ok()?;
            Some(ProviderEvent::Transcript(ProviderTranscript {
                text: msg.text,
                confidence: msg.confidence,
                is_final: msg.is_final,
                start_ms: msg.start_ms,
                end_ms: msg.end_ms,
            }))
        }
        "error" => Some(ProviderEvent::Error(
            value
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown provider error")
                .to_string(),
        )),
        _ => None,
    }
}

struct WsSession {
    sink: futures_util::stream::SplitSink<WsStream, Message>,
    keepalive_payload: String,
    ready: bool,
    state: TransportState,
}

#[async_trait]
impl ProviderSession for WsSession {
    async fn send(&mut self, pcm: &[u8]) -> Result<(), ProviderError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(pcm);
        let frame = serde_json::json!({ "type": "audio", "payload_b64": encoded });
        self.sink
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))
    }

    async fn keep_alive(&mut self) -> Result<(), ProviderError> {
        self.sink
            .send(Message::Text(self.keepalive_payload.clone()))
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ProviderError> {
        self.state = TransportState::Closing;
        let result = self
            .sink
            .send(Message::Close(None))
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()));
        self.state = TransportState::Closed;
        self.ready = false;
        result
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn transport_state(&self) -> TransportState {
        self.state
    }
}
