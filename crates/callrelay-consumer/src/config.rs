//! Tunables for the Transcript Consumer, mirroring how
//! `callrelay-core::settings` layers defaults from the environment.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Base URL of the App API's `/api/calls/ingest-transcript` endpoint.
    pub app_base_url: String,
    /// A subscription idle longer than this is cancelled by the sweep.
    pub call_idle_max: Duration,
    /// Cadence of the idle-subscription sweep.
    pub cleanup_interval: Duration,
    /// Per-forward HTTP timeout.
    pub forward_timeout: Duration,
    /// Forward attempts beyond the first before giving up on one message.
    pub max_retries: u8,
    /// Base delay for the forward retry's exponential backoff.
    pub retry_base_delay_ms: u64,
    /// Bounded FIFO capacity of the dead-letter queue.
    pub dead_letter_capacity: usize,
    /// Consumer identity registered with the Bus.
    pub consumer_name: String,
}

impl ConsumerConfig {
    pub fn new(app_base_url: impl Into<String>) -> Self {
        Self {
            app_base_url: app_base_url.into(),
            call_idle_max: Duration::from_secs(600),
            cleanup_interval: Duration::from_secs(30),
            forward_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay_ms: 200,
            dead_letter_capacity: 50,
            consumer_name: "transcript-consumer-1".to_string(),
        }
    }
}
