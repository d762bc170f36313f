//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod covers;
#[allow(clippy::missing_errors_doc)]
pub mod schedule;
pub mod sse;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/covers", get(covers::list))
        // static segment wins over the `{id}` capture
        .route("/covers/move", post(covers::move_covers))
        .route("/covers/{id}", get(covers::get))
        .route(
            "/covers/{id}/override",
            post(covers::set_override).delete(covers::clear_override),
        )
        .route("/covers/{id}/shading", post(covers::activate_shading))
        .route("/schedule/recalculate", post(schedule::recalculate))
        .route("/telemetry/stream", get(sse::stream))
}
