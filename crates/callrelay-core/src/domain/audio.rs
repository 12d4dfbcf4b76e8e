//! Normalized inbound audio, as published by the Ingest Gateway onto the
//! `audio_stream` bus topic.

use crate::domain::call::{CallId, TenantId};
use serde::{Deserialize, Serialize};

/// One chunk of raw PCM audio for a call, carrying a strictly-increasing
/// per-call sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFrame {
    pub call_id: CallId,
    pub tenant_id: TenantId,
    /// Strictly increasing per `call_id`, starting at 1.
    pub seq: u64,
    pub sample_rate: u32,
    pub encoding: AudioEncoding,
    pub channels: u8,
    /// Raw little-endian PCM samples. Never base64 once inside the process;
    /// wire encodings (e.g. the carrier's base64 JSON payload) are decoded
    /// at the gateway boundary.
    #[serde(with = "serde_bytes_b64")]
    pub payload: Vec<u8>,
    /// Monotonic offset since call start, milliseconds.
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration of this frame in milliseconds, given this frame's own
    /// sample rate and channel count.
    pub fn duration_ms(&self) -> f64 {
        let bytes_per_sample = 2usize * self.channels as usize;
        if bytes_per_sample == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        let samples = self.payload.len() / bytes_per_sample;
        (samples as f64) * 1000.0 / self.sample_rate as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    Pcm16,
}

/// Audio frames travel the bus as JSON with the payload base64-encoded, to
/// stay compatible with JSON-only bus transports (Redis Streams values are
/// bulk strings, not structured binary).
mod serde_bytes_b64 {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        s.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_ms_for_20ms_16khz_mono_frame() {
        let frame = AudioFrame {
            call_id: CallId::new("c1"),
            tenant_id: TenantId::new("t1"),
            seq: 1,
            sample_rate: 16_000,
            encoding: AudioEncoding::Pcm16,
            channels: 1,
            payload: vec![0u8; 16_000 / 1000 * 20 * 2],
            timestamp_ms: 0,
        };
        assert!((frame.duration_ms() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn round_trips_through_json() {
        let frame = AudioFrame {
            call_id: CallId::new("c1"),
            tenant_id: TenantId::new("t1"),
            seq: 42,
            sample_rate: 16_000,
            encoding: AudioEncoding::Pcm16,
            channels: 1,
            payload: vec![1, 2, 3, 4],
            timestamp_ms: 123,
        };
        let json = serde_json::to_string(&frame).unwrap();
        let back: AudioFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back.payload, frame.payload);
        assert_eq!(back.seq, 42);
    }
}
