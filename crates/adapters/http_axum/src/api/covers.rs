//! JSON REST handlers for covers and their overrides.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use shutterctl_domain::cover::CoverDirection;
use shutterctl_domain::id::CoverId;
use shutterctl_domain::telemetry::Telemetry;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for setting a manual override.
#[derive(Deserialize)]
pub struct OverrideRequest {
    pub minutes: i64,
}

/// Optional request body for a shading hold.
#[derive(Deserialize)]
pub struct ShadingRequest {
    pub minutes: i64,
}

/// Request body for an immediate move.
#[derive(Deserialize)]
pub struct MoveRequest {
    pub direction: CoverDirection,
    /// Every cover when absent.
    #[serde(default)]
    pub cover: Option<String>,
}

/// Possible responses from the list endpoints.
pub enum ListResponse {
    Ok(Json<Vec<Telemetry>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the single-cover endpoints.
pub enum CoverResponse {
    Ok(Json<Telemetry>),
}

impl IntoResponse for CoverResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/covers`
pub async fn list(State(state): State<AppState>) -> Result<ListResponse, ApiError> {
    let all = state.control.telemetry_all().await?;
    Ok(ListResponse::Ok(Json(all)))
}

/// `GET /api/covers/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<CoverResponse, ApiError> {
    let telemetry = state.control.telemetry(CoverId::new(id)).await?;
    Ok(CoverResponse::Ok(Json(telemetry)))
}

/// `POST /api/covers/{id}/override`
pub async fn set_override(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<OverrideRequest>,
) -> Result<CoverResponse, ApiError> {
    let telemetry = state
        .control
        .set_manual_override(CoverId::new(id), req.minutes)
        .await?;
    Ok(CoverResponse::Ok(Json(telemetry)))
}

/// `DELETE /api/covers/{id}/override`
pub async fn clear_override(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<CoverResponse, ApiError> {
    let telemetry = state.control.clear_override(CoverId::new(id)).await?;
    Ok(CoverResponse::Ok(Json(telemetry)))
}

/// `POST /api/covers/{id}/shading`
///
/// Without a JSON body the cover's default override duration applies.
pub async fn activate_shading(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ShadingRequest>>,
) -> Result<CoverResponse, ApiError> {
    let minutes = body.map(|Json(req)| req.minutes);
    let telemetry = state
        .control
        .activate_shading(CoverId::new(id), minutes)
        .await?;
    Ok(CoverResponse::Ok(Json(telemetry)))
}

/// `POST /api/covers/move`
pub async fn move_covers(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> Result<ListResponse, ApiError> {
    let moved = state
        .control
        .move_covers(req.direction, req.cover.map(CoverId::new))
        .await?;
    Ok(ListResponse::Ok(Json(moved)))
}
