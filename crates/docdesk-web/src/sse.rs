//! Server-Sent Events (SSE) streaming for live toasts and file updates.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_core::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::state::SharedState;

/// SSE endpoint. Notification queue changes arrive as `notification`
/// events, dashboard changes as `dashboard` events.
pub async fn sse_handler(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let notifications = BroadcastStream::new(state.notifications.subscribe())
        .filter_map(|result| result.ok().and_then(|event| encode("notification", &event)));
    let dashboard = BroadcastStream::new(state.subscribe())
        .filter_map(|result| result.ok().and_then(|event| encode("dashboard", &event)));

    Sse::new(notifications.merge(dashboard)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn encode<T: Serialize>(name: &str, event: &T) -> Option<Result<Event, Infallible>> {
    serde_json::to_string(event)
        .ok()
        .map(|data| Ok(Event::default().event(name).data(data)))
}
