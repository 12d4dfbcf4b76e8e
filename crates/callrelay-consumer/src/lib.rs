//! The Transcript Consumer: activity-driven subscription to
//! `transcript.<callId>` bus topics, forwarding fragments to the App API.

pub mod config;
pub mod consumer;
pub mod forwarder;

pub use config::ConsumerConfig;
pub use consumer::{run_idle_sweep, DeadLetter, TranscriptConsumer, CONSUMER_GROUP, TOPIC_PREFIX};
pub use forwarder::{ForwardError, Forwarder};
