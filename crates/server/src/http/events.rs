// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSE fan-out endpoint.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream, StreamExt};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::event::SerialEvent;
use crate::state::AppState;

/// `GET /events` — serial event stream: replay buffer first, then live.
///
/// The subscription handshake is atomic against publishers, so a live event
/// arriving during replay is queued behind it, never delivered early.
/// Dropping the connection drops the receiver, which unsubscribes.
pub async fn stream(
    State(s): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (replay, rx) = s.broadcaster.subscribe();

    let replay =
        stream::iter(replay.into_iter().filter_map(|e| frame(&e)).map(Ok::<_, Infallible>));
    let live = BroadcastStream::new(rx).filter_map(|item| async move {
        match item {
            Ok(event) => frame(&event).map(Ok),
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                tracing::debug!(dropped = n, "slow SSE subscriber, oldest events dropped");
                None
            }
        }
    });

    Sse::new(replay.chain(live)).keep_alive(
        KeepAlive::new().interval(s.config.keep_alive_interval()).text("keep-alive"),
    )
}

fn frame(event: &SerialEvent) -> Option<Event> {
    Event::default().json_data(event).ok()
}
