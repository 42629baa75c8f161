use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use clinica_core::CoreError;

/// HTTP rendering of a [`CoreError`].
pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            CoreError::PermissionDenied => (StatusCode::FORBIDDEN, self.0.to_string()),
            CoreError::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            CoreError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.0.to_string()),
            CoreError::Dependencies(_) => (StatusCode::CONFLICT, self.0.to_string()),
            CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, self.0.to_string()),
            CoreError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_owned())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
