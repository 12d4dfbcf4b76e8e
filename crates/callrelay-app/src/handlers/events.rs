//! `GET /api/events/stream`: one SSE connection per browser,
//! scoped to a single `callId`. Emits `hello` immediately, then whatever
//! the SSE Hub broadcasts for that call, plus a `ping` keep-alive.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use callrelay_core::domain::CallId;
use callrelay_core::events::AppEvent;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::sse::SseHub;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(rename = "callId")]
    pub call_id: String,
}

pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let call_id = CallId::new(query.call_id);
    let hello_event = AppEvent::Hello {
        call_id: call_id.clone(),
    };

    let hello = stream::once(async move {
        Ok(Event::default()
            .event("hello")
            .json_data(hello_event.data_json())
            .unwrap_or_else(|_| Event::default().event("hello")))
    });

    let (client_id, broadcast) = state.sse_hub.subscribe(call_id).await;

    let touch_hub = state.sse_hub.clone();
    let touched = broadcast.then(move |item| {
        let touch_hub = touch_hub.clone();
        async move {
            touch_hub.touch_client(client_id).await;
            item
        }
    });

    let inner: Pin<Box<dyn Stream<Item = Result<Event, axum::Error>> + Send>> =
        Box::pin(hello.chain(touched));
    let guarded = GuardedStream {
        inner,
        _guard: RemoveOnDisconnect {
            hub: state.sse_hub.clone(),
            client_id,
        },
    };

    Sse::new(guarded).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Calls `SseHub::remove_client` once the connection's stream is dropped,
/// whether that's a clean close or the browser just going away.
struct RemoveOnDisconnect {
    hub: Arc<SseHub>,
    client_id: Uuid,
}

impl Drop for RemoveOnDisconnect {
    fn drop(&mut self) {
        let hub = self.hub.clone();
        let client_id = self.client_id;
        tokio::spawn(async move {
            hub.remove_client(client_id).await;
        });
    }
}

struct GuardedStream {
    inner: Pin<Box<dyn Stream<Item = Result<Event, axum::Error>> + Send>>,
    _guard: RemoveOnDisconnect,
}

impl Stream for GuardedStream {
    type Item = Result<Event, axum::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}
