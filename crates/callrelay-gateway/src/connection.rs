//! Per-connection state machine: `AwaitStart -> Streaming -> Stopping
//! -> Closed`. One task reads inbound frames and publishes them to the bus,
//! another emits periodic acks back to the carrier; `tokio::select!` waits
//! for either to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use base64::Engine;
use callrelay_core::domain::{AudioEncoding, AudioFrame, CallEndSignal, CallId, TenantId};
use callrelay_core::ports::BusPort;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::jwt::JwtVerifier;
use crate::protocol::{parse_carrier_start, parse_native_start, CarrierFrame};

pub const AUDIO_STREAM_TOPIC: &str = "audio_stream";
pub const CALL_END_TOPIC: &str = "call_end";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    AwaitStart,
    Streaming,
    Stopping,
    Closed,
}

/// Tracks whether the gateway has hit a publish failure without closing the
/// socket: bus back-pressure should degrade health, not drop connections.
#[derive(Clone, Default)]
pub struct HealthFlag(Arc<AtomicBool>);

impl HealthFlag {
    pub fn is_degraded(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn mark_degraded(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

pub struct GatewayConfig {
    pub default_tenant: String,
    pub idle_close: Duration,
    pub mark_every_n_frames: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_tenant: "default".to_string(),
            idle_close: Duration::from_secs(60),
            mark_every_n_frames: 50,
        }
    }
}

pub async fn handle_connection(
    socket: WebSocket,
    bus: Arc<dyn BusPort>,
    config: Arc<GatewayConfig>,
    health: HealthFlag,
    jwt_verifier: Option<Arc<JwtVerifier>>,
    bearer_header: Option<String>,
) {
    let (mut sender, mut receiver) = socket.split();
    let mut state = ConnState::AwaitStart;
    let mut call_id: Option<CallId> = None;
    let mut tenant_id = TenantId::new(config.default_tenant.clone());
    let mut sample_rate: u32 = 16_000;
    let mut channels: u8 = 1;
    let mut seq: u64 = 0;
    let mut frames_since_mark: u32 = 0;

    loop {
        let next = tokio::time::timeout(config.idle_close, receiver.next()).await;
        let msg = match next {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(err))) => {
                warn!(error = %err, "ingest gateway socket error");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                // Idle watchdog: no media within idleCloseSec closes
                // the connection and synthesizes a stop downstream.
                info!(call_id = ?call_id.as_ref().map(CallId::as_str), "idle watchdog fired, closing");
                if let Some(call_id) = &call_id {
                    publish_call_end(&bus, call_id).await;
                }
                break;
            }
        };

        match (state, msg) {
            (ConnState::AwaitStart, Message::Text(text)) => {
                if matches!(
                    serde_json::from_str::<CarrierFrame>(&text),
                    Ok(CarrierFrame::Connected)
                ) {
                    continue;
                }
                // Carrier connections skip the JWT gate; native connections
                // require a valid bearer token unless no verifier is
                // configured (e.g. local dev).
                let start = if let Some(start) = parse_carrier_start(&text, &config.default_tenant) {
                    Some(start)
                } else if let Some(start) = parse_native_start(&text) {
                    match &jwt_verifier {
                        Some(verifier) => match verifier.verify(bearer_header.as_deref()) {
                            Ok(()) => Some(start),
                            Err(err) => {
                                warn!(error = %err, "native ingest JWT rejected, closing connection");
                                None
                            }
                        },
                        None => Some(start),
                    }
                } else {
                    None
                };

                match start {
                    Some(start) => {
                        call_id = Some(CallId::new(start.call_id));
                        tenant_id = TenantId::new(start.tenant_id);
                        sample_rate = start.sample_rate;
                        channels = start.channels;
                        state = ConnState::Streaming;
                        info!(call_id = %call_id.as_ref().unwrap(), "ingest connection streaming");
                    }
                    None => {
                        warn!(payload = %text, "malformed or unauthorized start frame, closing connection");
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            (ConnState::Streaming, Message::Text(text)) => {
                if let Ok(frame) = serde_json::from_str::<CarrierFrame>(&text) {
                    match frame {
                        CarrierFrame::Media { media } => {
                            let Some(call_id) = call_id.clone() else { continue };
                            match decode_media_payload(&media.payload) {
                                Ok(pcm) => {
                                    seq += 1;
                                    publish_audio(
                                        &bus,
                                        call_id,
                                        tenant_id.clone(),
                                        seq,
                                        sample_rate,
                                        channels,
                                        pcm,
                                        media.timestamp.unwrap_or(0),
                                        &health,
                                    )
                                    .await;
                                    frames_since_mark += 1;
                                    if frames_since_mark >= config.mark_every_n_frames {
                                        frames_since_mark = 0;
                                        let ack = serde_json::json!({
                                            "event": "mark",
                                            "mark": { "name": format!("ack-{seq}") }
                                        });
                                        let _ = sender.send(Message::Text(ack.to_string())).await;
                                    }
                                }
                                Err(err) => {
                                    debug!(error = %err, "dropping undecodable media payload");
                                }
                            }
                        }
                        CarrierFrame::Stop => {
                            state = ConnState::Stopping;
                        }
                        CarrierFrame::Mark | CarrierFrame::Connected | CarrierFrame::Start { .. } => {}
                    }
                } else if matches!(
                    serde_json::from_str::<crate::protocol::NativeFrame>(&text),
                    Ok(crate::protocol::NativeFrame::Stop)
                ) {
                    state = ConnState::Stopping;
                }
            }
            (ConnState::Streaming, Message::Binary(data)) => {
                let Some(call_id) = call_id.clone() else { continue };
                // Defensive rejection of JSON mistakenly sent on the binary
                // channel by some carriers.
                if serde_json::from_slice::<serde_json::Value>(&data).is_ok() {
                    debug!("binary frame decodes as JSON, dropping (defensive)");
                    continue;
                }
                seq += 1;
                publish_audio(
                    &bus,
                    call_id,
                    tenant_id.clone(),
                    seq,
                    sample_rate,
                    channels,
                    data.to_vec(),
                    0,
                    &health,
                )
                .await;
            }
            (_, Message::Close(_)) => {
                state = ConnState::Stopping;
            }
            (_, Message::Ping(_) | Message::Pong(_)) => {}
            (ConnState::Stopping | ConnState::Closed, _) => {}
            (ConnState::AwaitStart, Message::Binary(_)) => {
                debug!("binary frame before start, ignoring");
            }
        }

        if state == ConnState::Stopping {
            if let Some(call_id) = &call_id {
                publish_call_end(&bus, call_id).await;
            }
            state = ConnState::Closed;
            break;
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

#[allow(clippy::too_many_arguments)]
async fn publish_audio(
    bus: &Arc<dyn BusPort>,
    call_id: CallId,
    tenant_id: TenantId,
    seq: u64,
    sample_rate: u32,
    channels: u8,
    payload: Vec<u8>,
    timestamp_ms: u64,
    health: &HealthFlag,
) {
    let frame = AudioFrame {
        call_id,
        tenant_id,
        seq,
        sample_rate,
        encoding: AudioEncoding::Pcm16,
        channels,
        payload,
        timestamp_ms,
    };
    let Ok(bytes) = serde_json::to_vec(&frame) else {
        warn!("failed to serialize audio frame");
        return;
    };
    if let Err(err) = bus.publish(AUDIO_STREAM_TOPIC, bytes).await {
        warn!(error = %err, "audio_stream publish failed, marking gateway degraded");
        health.mark_degraded();
    }
}

/// Published on `stop` or on idle watchdog expiry so the ASR Worker can
/// finish its per-call task even after the last audio frame.
async fn publish_call_end(bus: &Arc<dyn BusPort>, call_id: &CallId) {
    let signal = CallEndSignal {
        call_id: call_id.clone(),
    };
    let Ok(bytes) = serde_json::to_vec(&signal) else {
        warn!("failed to serialize call_end signal");
        return;
    };
    if let Err(err) = bus.publish(CALL_END_TOPIC, bytes).await {
        warn!(error = %err, call_id = %call_id, "call_end publish failed");
    }
}

fn decode_media_payload(payload_b64: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(payload_b64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_valid_base64_media_payload() {
        let encoded = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]);
        assert_eq!(decode_media_payload(&encoded).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(decode_media_payload("not base64!!").is_err());
    }
}
