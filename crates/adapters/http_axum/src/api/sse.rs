//! Server-Sent Events (SSE) stream of cover telemetry.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use shutterctl_app::telemetry_feed::Subscription;

use crate::state::AppState;

/// `GET /api/telemetry/stream`: SSE stream of published telemetry.
///
/// The stream opens with the latest telemetry of every cover, then carries
/// each new [`Telemetry`](shutterctl_domain::telemetry::Telemetry) as one
/// JSON frame until the client disconnects or the feed is closed.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let Subscription { snapshot, updates } = state.telemetry.subscribe();
    let telemetry_stream = tokio_stream::iter(snapshot.into_iter().map(Ok))
        .chain(BroadcastStream::new(updates))
        .filter_map(|result| match result {
            Ok(telemetry) => match serde_json::to_string(&telemetry) {
                Ok(json) => Some(Ok(Event::default().data(json))),
                Err(err) => {
                    tracing::warn!(%err, "failed to serialize telemetry for SSE stream");
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "SSE subscriber lagged, some telemetry was dropped");
                None
            }
        });

    Sse::new(telemetry_stream).keep_alive(KeepAlive::default())
}
