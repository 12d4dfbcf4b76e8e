//! Transcript fragments, produced by the ASR Worker and persisted as
//! utterances by the App ingest endpoint.

use crate::domain::call::{CallId, TenantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptKind {
    Partial,
    Final,
}

/// A transcript fragment published by the ASR Worker onto
/// `transcript.<callId>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub call_id: CallId,
    pub tenant_id: TenantId,
    pub seq: u64,
    pub kind: TranscriptKind,
    pub text: String,
    pub confidence: f32,
    pub start_ms: u64,
    pub end_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl TranscriptEvent {
    /// A `final` transcript supersedes any `partial` whose span it overlaps.
    pub fn supersedes(&self, other: &TranscriptEvent) -> bool {
        self.kind == TranscriptKind::Final
            && self.call_id == other.call_id
            && self.start_ms < other.end_ms
            && other.start_ms < self.end_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Customer,
    Agent,
    Unknown,
}

impl Speaker {
    pub fn as_str(self) -> &'static str {
        match self {
            Speaker::Customer => "customer",
            Speaker::Agent => "agent",
            Speaker::Unknown => "unknown",
        }
    }

    pub fn parse(raw: &str) -> Speaker {
        match raw {
            "customer" => Speaker::Customer,
            "agent" => Speaker::Agent,
            _ => Speaker::Unknown,
        }
    }

    /// Heuristic classification from a leading "Agent:"/"Customer:" prefix,
    /// matching the App ingest endpoint's fallback rule.
    pub fn classify(text: &str) -> Speaker {
        let trimmed = text.trim_start();
        if trimmed.len() >= 6 && trimmed[..6].eq_ignore_ascii_case("agent:") {
            Speaker::Agent
        } else if trimmed.len() >= 9 && trimmed[..9].eq_ignore_ascii_case("customer:") {
            Speaker::Customer
        } else {
            Speaker::Unknown
        }
    }
}

/// A persisted utterance row; primary key `(call_id, seq)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub call_id: CallId,
    pub seq: u64,
    pub text: String,
    pub speaker: Speaker,
    pub ts: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_prefixes() {
        assert_eq!(Speaker::classify("Agent: hello"), Speaker::Agent);
        assert_eq!(Speaker::classify("Customer: hi"), Speaker::Customer);
        assert_eq!(Speaker::classify("just talking"), Speaker::Unknown);
    }

    #[test]
    fn final_supersedes_overlapping_partial() {
        let tenant = TenantId::new("t1");
        let call = CallId::new("c1");
        let partial = TranscriptEvent {
            call_id: call.clone(),
            tenant_id: tenant.clone(),
            seq: 1,
            kind: TranscriptKind::Partial,
            text: "hel".into(),
            confidence: 0.4,
            start_ms: 0,
            end_ms: 500,
            created_at: Utc::now(),
        };
        let finall = TranscriptEvent {
            call_id: call,
            tenant_id: tenant,
            seq: 2,
            kind: TranscriptKind::Final,
            text: "hello".into(),
            confidence: 0.9,
            start_ms: 200,
            end_ms: 700,
            created_at: Utc::now(),
        };
        assert!(finall.supersedes(&partial));
    }
}
