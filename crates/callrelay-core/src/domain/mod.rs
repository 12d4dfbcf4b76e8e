//! Plain domain types shared across every callrelay component.

pub mod audio;
pub mod call;
pub mod call_end;
pub mod disposition;
pub mod intent;
pub mod sse;
pub mod transcript;

pub use audio::{AudioEncoding, AudioFrame};
pub use call::{CallId, TenantId};
pub use call_end::CallEndSignal;
pub use disposition::Disposition;
pub use intent::{Intent, KbArticle, INTENT_CONFIDENCE_FLOOR};
pub use sse::SseClientInfo;
pub use transcript::{Speaker, TranscriptEvent, TranscriptKind, Utterance};
