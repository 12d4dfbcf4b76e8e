//! Shared configuration keys, loaded directly from the process
//! environment the way the rest of the workspace does — no config crate,
//! just typed accessors over `std::env`.

use crate::aggregator::AggregatorConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    P1,
    P2,
    Mock,
}

impl ProviderKind {
    pub fn from_env() -> Result<Self, SettingsError> {
        match std::env::var("ASR_PROVIDER").as_deref() {
            Ok("p1") | Err(_) => Ok(ProviderKind::P1),
            Ok("p2") => Ok(ProviderKind::P2),
            Ok("mock") => Ok(ProviderKind::Mock),
            Ok(other) => Err(SettingsError::InvalidValue {
                key: "ASR_PROVIDER",
                value: other.to_string(),
            }),
        }
    }

    pub fn default_aggregator_config(self) -> AggregatorConfig {
        match self {
            ProviderKind::P1 | ProviderKind::Mock => AggregatorConfig::p1(),
            ProviderKind::P2 => AggregatorConfig::p2(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusAdapterKind {
    StreamLog,
    InMemory,
}

impl BusAdapterKind {
    pub fn from_env() -> Result<Self, SettingsError> {
        match std::env::var("PUBSUB_ADAPTER").as_deref() {
            Ok("stream-log") | Err(_) => Ok(BusAdapterKind::StreamLog),
            Ok("in-memory") => Ok(BusAdapterKind::InMemory),
            Ok(other) => Err(SettingsError::InvalidValue {
                key: "PUBSUB_ADAPTER",
                value: other.to_string(),
            }),
        }
    }
}

fn env_u32(key: &'static str, default: u32) -> Result<u32, SettingsError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| SettingsError::InvalidValue { key, value: raw }),
    }
}

/// Aggregator timing overrides from the environment, layered
/// on top of the provider's defaults.
pub fn aggregator_config_from_env(base: AggregatorConfig) -> Result<AggregatorConfig, SettingsError> {
    Ok(AggregatorConfig {
        initial_burst_ms: env_u32("AGGREGATOR_INITIAL_BURST_MS", base.initial_burst_ms)?,
        min_chunk_ms: env_u32("AGGREGATOR_MIN_CHUNK_MS", base.min_chunk_ms)?,
        max_wait_ms: env_u32("AGGREGATOR_MAX_WAIT_MS", base.max_wait_ms)?,
        timeout_fallback_min_ms: env_u32(
            "AGGREGATOR_TIMEOUT_FALLBACK_MIN_MS",
            base.timeout_fallback_min_ms,
        )?,
        max_chunk_ms: env_u32("AGGREGATOR_MAX_CHUNK_MS", base.max_chunk_ms)?,
        keepalive_period_ms: env_u32("AGGREGATOR_KEEPALIVE_PERIOD_MS", base.keepalive_period_ms)?,
        processing_timer_ms: env_u32("AGGREGATOR_PROCESSING_TIMER_MS", base.processing_timer_ms)?,
        first_audio_deadline_ms: env_u32(
            "AGGREGATOR_FIRST_AUDIO_DEADLINE_MS",
            base.first_audio_deadline_ms,
        )?,
    })
}

/// `MAX_CONCURRENT_SSE_CLIENTS`.
pub fn max_concurrent_sse_clients() -> Result<usize, SettingsError> {
    env_u32("MAX_CONCURRENT_SSE_CLIENTS", 20).map(|v| v as usize)
}

/// WebSocket endpoint for the `p1`/`p2` vendor adapters. Authentication is
/// covered separately by each vendor's API key; this is just the endpoint
/// URL. Not read for `ASR_PROVIDER=mock`.
pub fn asr_provider_ws_url() -> Result<String, SettingsError> {
    std::env::var("ASR_PROVIDER_WS_URL").map_err(|_| SettingsError::InvalidValue {
        key: "ASR_PROVIDER_WS_URL",
        value: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_defaults_to_p1_when_unset() {
        // SAFETY: test runs single-threaded env mutation via serial harness
        // not available here; this only reads, never sets, the var.
        if std::env::var("ASR_PROVIDER").is_err() {
            assert_eq!(ProviderKind::from_env().unwrap(), ProviderKind::P1);
        }
    }

    #[test]
    fn aggregator_overrides_pass_through_when_unset() {
        let base = AggregatorConfig::p1();
        let cfg = aggregator_config_from_env(base).unwrap();
        assert_eq!(cfg.min_chunk_ms, base.min_chunk_ms);
    }
}
