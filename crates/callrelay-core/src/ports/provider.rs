//! The streaming ASR provider capability. A single trait with four
//! methods and an explicit readiness probe, deliberately flat — vendor
//! adapters (`callrelay-asr`'s `p1`/`p2`/`mock` modules) implement it
//! directly rather than exposing vendor-specific socket handles.

use crate::error::ProviderError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Underlying transport readiness, checked before every send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Events pushed by the provider's reply-handling task. Consumed
/// independently of `send` so a send never blocks on a reply.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    Ready,
    Transcript(ProviderTranscript),
    Error(String),
    Closed,
}

#[derive(Debug, Clone)]
pub struct ProviderTranscript {
    pub text: String,
    pub confidence: f32,
    pub is_final: bool,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// One open session with the provider for exactly one call: at most one
/// per `callId`.
#[async_trait]
pub trait ProviderSession: Send {
    /// Sends a binary PCM frame. Fire-and-forget: the call returns once the
    /// frame is handed to the transport, not once the provider replies.
    async fn send(&mut self, pcm: &[u8]) -> Result<(), ProviderError>;

    /// Sends the provider's idle keep-alive frame.
    async fn keep_alive(&mut self) -> Result<(), ProviderError>;

    /// Closes the session. Idempotent.
    async fn close(&mut self) -> Result<(), ProviderError>;

    /// True once the protocol-level handshake has completed.
    fn is_ready(&self) -> bool;

    /// Underlying transport state, checked independently of `is_ready` —
    /// both must hold before a send is issued.
    fn transport_state(&self) -> TransportState;
}

/// Opens provider sessions. One instance per process per provider backend;
/// `open` is called once per call under the ASR Worker's per-call
/// single-flight lock.
#[async_trait]
pub trait ProviderSessionFactory: Send + Sync {
    async fn open(
        &self,
        sample_rate: u32,
    ) -> Result<(Box<dyn ProviderSession>, mpsc::UnboundedReceiver<ProviderEvent>), ProviderError>;
}
