//! Schedule maintenance handler.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use shutterctl_domain::id::CoverId;

use crate::api::covers::ListResponse;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RecalculateQuery {
    pub cover: Option<String>,
}

/// `POST /api/schedule/recalculate[?cover=…]`
///
/// Recomputes the next open/close triggers from fresh sun data without
/// firing anything.
pub async fn recalculate(
    State(state): State<AppState>,
    Query(query): Query<RecalculateQuery>,
) -> Result<ListResponse, ApiError> {
    let updated = state
        .control
        .recalculate_schedule(query.cover.map(CoverId::new))
        .await?;
    Ok(ListResponse::Ok(Json(updated)))
}
