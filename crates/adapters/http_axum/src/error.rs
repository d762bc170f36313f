//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use shutterctl_domain::error::ShutterError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`ShutterError`] to an HTTP response with appropriate status code.
pub struct ApiError(ShutterError);

impl From<ShutterError> for ApiError {
    fn from(err: ShutterError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ShutterError::Configuration(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ShutterError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            ShutterError::Scheduling(err) => {
                tracing::warn!(error = %err, "scheduling error");
                (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            ShutterError::Delivery(err) => {
                tracing::error!(error = %err, "delivery error");
                (StatusCode::BAD_GATEWAY, "command delivery failed".to_string())
            }
            ShutterError::EngineStopped => (
                StatusCode::SERVICE_UNAVAILABLE,
                ShutterError::EngineStopped.to_string(),
            ),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
