//! Shared ingest pipeline driven by both `/api/transcripts/receive`
//! and `/api/calls/ingest-transcript` — the two endpoints differ only in
//! their request body shape, not in what happens once a fragment arrives.

use std::time::Instant;

use callrelay_core::domain::{CallId, Speaker, Utterance};
use callrelay_core::events::AppEvent;
use callrelay_core::ports::AppEventEmitter;
use chrono::Utc;
use tracing::warn;

use crate::bootstrap::AxumContext;
use crate::state::AppState;

pub struct IncomingFragment {
    pub call_id: CallId,
    pub text: String,
    pub seq: Option<u64>,
    pub speaker: Option<Speaker>,
}

/// First-fragment threshold below which the Transcript Consumer is asked
/// to subscribe to this call's bus topic.
const FIRST_FRAGMENT_SEQ_CEILING: u64 = 2;

pub async fn process_fragment(
    state: &AppState,
    fragment: IncomingFragment,
) -> Result<u64, crate::error::HttpError> {
    let ctx = state.as_ref();
    let seq = resolve_seq(ctx, &fragment.call_id, fragment.seq).await?;
    let speaker = fragment
        .speaker
        .unwrap_or_else(|| Speaker::classify(&fragment.text));

    let utterance = Utterance {
        call_id: fragment.call_id.clone(),
        seq,
        text: fragment.text,
        speaker,
        ts: Utc::now(),
    };

    let changed = ctx.repos.utterances.upsert(&utterance).await?;

    maybe_classify_intent(state, &fragment.call_id);

    if changed {
        ctx.sse_hub
            .emit(
                &fragment.call_id,
                AppEvent::TranscriptLine {
                    call_id: fragment.call_id.clone(),
                    seq,
                    text: utterance.text.clone(),
                    speaker: speaker.as_str().to_string(),
                },
            )
            .await;
    }

    if seq <= FIRST_FRAGMENT_SEQ_CEILING {
        ctx.consumer_notifier
            .notify_first_fragment(&fragment.call_id)
            .await;
    }

    Ok(seq)
}

/// Assigns the next `seq` for `call_id`: tries the 1 s TTL cache first,
/// falling back to `max(seq) + 1` from the repository and seeding the
/// cache for subsequent callers within the window.
async fn resolve_seq(
    ctx: &AxumContext,
    call_id: &CallId,
    requested_seq: Option<u64>,
) -> Result<u64, crate::error::HttpError> {
    if let Some(seq) = requested_seq {
        return Ok(seq);
    }

    let now = Instant::now();
    if let Some(seq) = ctx.seq_allocator.next(call_id, now) {
        return Ok(seq);
    }

    let max_seq = ctx.repos.utterances.max_seq(call_id).await?;
    let seq = max_seq.map(|s| s + 1).unwrap_or(1);
    ctx.seq_allocator.seed(call_id.clone(), seq, now);
    Ok(seq)
}

/// Spawns Intent+KB classification in the background, skipping if one is
/// already running for this call: bounded concurrency, one in-flight per
/// call.
fn maybe_classify_intent(state: &AppState, call_id: &CallId) {
    {
        let mut inflight = state.intent_inflight.lock().unwrap();
        if !inflight.insert(call_id.clone()) {
            return;
        }
    }

    let state = state.clone();
    let call_id = call_id.clone();

    tokio::spawn(async move {
        match state.repos.utterances.list_for_call(&call_id).await {
            Ok(utterances) => {
                state
                    .intent_service
                    .classify_and_broadcast(&call_id, &utterances)
                    .await;
            }
            Err(err) => {
                warn!(call_id = %call_id, error = %err, "failed to load utterances for intent classification");
            }
        }
        state.intent_inflight.lock().unwrap().remove(&call_id);
    });
}
