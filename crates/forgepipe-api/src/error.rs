//! Maps an [`OrchestratorError`] onto the HTTP surface: a status code and the
//! `{kind, message, retryable, stage?, attempt?, correlation_id}` error
//! payload shape the control surface promises every caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use forgepipe_core::error::{ErrorCategory, UserFriendlyError};
use forgepipe_orchestrator::OrchestratorError;

pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.category() {
            ErrorCategory::ClientInput => StatusCode::BAD_REQUEST,
            ErrorCategory::Authorization => StatusCode::FORBIDDEN,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Budget => StatusCode::TOO_MANY_REQUESTS,
            ErrorCategory::Provider | ErrorCategory::Timeout => StatusCode::BAD_GATEWAY,
            ErrorCategory::Cancelled => StatusCode::CONFLICT,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "kind": self.0.kind(),
            "message": self.0.user_message(),
            "retryable": self.0.is_retryable(),
        });

        (status, Json(body)).into_response()
    }
}
