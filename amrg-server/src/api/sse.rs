//! Server-Sent Events (SSE) for merge progress streaming

use crate::AppState;
use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Spacing of `: heartbeat` comments on an open stream
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Optional stream filter
#[derive(Debug, Default, Deserialize)]
pub struct EventStreamQuery {
    /// Only forward events for this merge request
    pub session_id: Option<Uuid>,
}

/// GET /merge/events - SSE event stream for merge progress
///
/// Streams events:
/// - MergeStarted
/// - DecodeStarted
/// - FileDecoded (once per upload, in order)
/// - ExportCompleted
/// - TaggingCompleted
/// - MergeCompleted / MergeFailed
///
/// A heartbeat comment goes out every [`HEARTBEAT_INTERVAL`] whether or not
/// other sessions' events are being filtered out.
pub async fn merge_event_stream(
    State(state): State<AppState>,
    Query(query): Query<EventStreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(session_id = ?query.session_id, "New SSE client connected to merge events");

    let mut rx = state.event_bus.subscribe();
    let filter = query.session_id;

    let stream = async_stream::stream! {
        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
            HEARTBEAT_INTERVAL,
        );

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    let event = match received {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("SSE: Client lagged, {} events skipped", skipped);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    if filter.is_some_and(|id| id != event.session_id()) {
                        continue;
                    }

                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: Broadcasting merge event: {}", event_type);
                            yield Ok(Event::default()
                                .event(event_type)
                                .data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream)
}
