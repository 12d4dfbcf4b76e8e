//! The ASR Worker: one task per call translating buffered audio into
//! provider sessions and `transcript.<callId>` events.

pub mod call_worker;
pub mod dispatcher;
pub mod provider;

pub use call_worker::{CallWorker, WorkerCommand};
pub use dispatcher::{Dispatcher, AUDIO_STREAM_TOPIC, CALL_END_TOPIC, CONSUMER_GROUP};
