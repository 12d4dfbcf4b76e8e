//! The Ingest Gateway: terminates carrier and native audio WebSocket
//! protocols and publishes normalized `AudioFrame`s onto `audio_stream`.

pub mod connection;
pub mod handler;
pub mod jwt;
pub mod protocol;

pub use connection::{GatewayConfig, HealthFlag, AUDIO_STREAM_TOPIC, CALL_END_TOPIC};
pub use handler::{router, GatewayState};
pub use jwt::JwtVerifier;
