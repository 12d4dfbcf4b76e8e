//! The two inbound wire protocols, auto-detected from the
//! shape of the first JSON message on the socket.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierFrame {
    Connected,
    Start { start: CarrierStart },
    Media { media: CarrierMedia },
    Stop,
    Mark,
}

#[derive(Debug, Deserialize)]
pub struct CarrierStart {
    #[serde(rename = "streamSid")]
    pub stream_sid: Option<String>,
    #[serde(rename = "callSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "mediaFormat")]
    pub media_format: CarrierMediaFormat,
}

#[derive(Debug, Deserialize)]
pub struct CarrierMediaFormat {
    pub encoding: String,
    #[serde(rename = "sampleRate")]
    pub sample_rate: u32,
    pub channels: u8,
}

#[derive(Debug, Deserialize)]
pub struct CarrierMedia {
    pub payload: String,
    pub timestamp: Option<u64>,
    pub chunk: Option<u64>,
}

impl CarrierStart {
    /// `callId = callSid || streamSid`.
    pub fn call_id(&self) -> Option<&str> {
        self.call_sid.as_deref().or(self.stream_sid.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum NativeFrame {
    Start {
        #[serde(rename = "interactionId")]
        interaction_id: String,
        #[serde(rename = "tenantId")]
        tenant_id: String,
        #[serde(rename = "sampleRate")]
        sample_rate: u32,
        encoding: String,
    },
    Stop,
}

/// One detected `start` event, normalized across both protocols so the
/// connection state machine doesn't need to branch on protocol afterward.
pub struct NormalizedStart {
    pub call_id: String,
    pub tenant_id: String,
    pub sample_rate: u32,
    pub channels: u8,
}

/// Carrier-shaped `start` only, used to decide whether the JWT gate applies
/// (carrier connections are not subject to it).
pub fn parse_carrier_start(text: &str, default_tenant: &str) -> Option<NormalizedStart> {
    let CarrierFrame::Start { start } = serde_json::from_str::<CarrierFrame>(text).ok()? else {
        return None;
    };
    Some(NormalizedStart {
        call_id: start.call_id()?.to_string(),
        tenant_id: default_tenant.to_string(),
        sample_rate: start.media_format.sample_rate,
        channels: start.media_format.channels,
    })
}

pub fn parse_native_start(text: &str) -> Option<NormalizedStart> {
    let NativeFrame::Start {
        interaction_id,
        tenant_id,
        sample_rate,
        ..
    } = serde_json::from_str::<NativeFrame>(text).ok()?
    else {
        return None;
    };
    Some(NormalizedStart {
        call_id: interaction_id,
        tenant_id,
        sample_rate,
        channels: 1,
    })
}

/// Tries the carrier shape first (text JSON with an `event` tag), then the
/// native shape. Returns `None` if neither parses — the connection fails
/// with a close frame for a malformed start.
pub fn parse_start_frame(text: &str, default_tenant: &str) -> Option<NormalizedStart> {
    parse_carrier_start(text, default_tenant).or_else(|| parse_native_start(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_carrier_start_preferring_call_sid() {
        let raw = r#"{"event":"start","start":{"streamSid":"s1","callSid":"c1","mediaFormat":{"encoding":"audio/x-mulaw","sampleRate":8000,"channels":1}}}"#;
        let start = parse_start_frame(raw, "default-tenant").unwrap();
        assert_eq!(start.call_id, "c1");
        assert_eq!(start.sample_rate, 8000);
    }

    #[test]
    fn parses_carrier_start_falling_back_to_stream_sid() {
        let raw = r#"{"event":"start","start":{"streamSid":"s1","mediaFormat":{"encoding":"audio/x-mulaw","sampleRate":8000,"channels":1}}}"#;
        let start = parse_start_frame(raw, "default-tenant").unwrap();
        assert_eq!(start.call_id, "s1");
    }

    #[test]
    fn parses_native_start() {
        let raw = r#"{"event":"start","interactionId":"i1","tenantId":"t1","sampleRate":16000,"encoding":"pcm16"}"#;
        let start = parse_start_frame(raw, "default-tenant").unwrap();
        assert_eq!(start.call_id, "i1");
        assert_eq!(start.tenant_id, "t1");
        assert_eq!(start.sample_rate, 16_000);
    }

    #[test]
    fn malformed_start_is_rejected() {
        assert!(parse_start_frame("not json", "t").is_none());
    }
}
