//! The out-of-band call-end signal: published by whichever
//! component first learns a call has ended (the Ingest Gateway on a `stop`
//! event, or the App API's `POST /api/calls/end`) onto the `call_end` bus
//! topic, so the ASR Worker can finish its per-call task even when no more
//! audio is ever going to arrive.

use crate::domain::call::CallId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEndSignal {
    pub call_id: CallId,
}
