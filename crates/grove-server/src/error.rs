//! Maps the workspace error taxonomy onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use grove_types::ForestError;

/// Handler-level error: a [`ForestError`] rendered as a plaintext body
/// with the matching status code.
#[derive(Debug)]
pub struct ApiError(pub ForestError);

impl ApiError {
    /// Status code the wrapped error maps to.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ForestError::InvalidArgument(_) | ForestError::InvalidType(_) => {
                StatusCode::BAD_REQUEST
            }
            ForestError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ForestError::Forbidden(_) => StatusCode::FORBIDDEN,
            ForestError::NotFound(_) => StatusCode::NOT_FOUND,
            ForestError::Conflict(_) => StatusCode::CONFLICT,
            ForestError::Precondition(_) => StatusCode::PRECONDITION_FAILED,
            ForestError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ForestError::Corruption(_) | ForestError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }
        (status, self.0.to_string()).into_response()
    }
}

impl From<ForestError> for ApiError {
    fn from(err: ForestError) -> Self {
        Self(err)
    }
}

impl From<grove_auth::AuthError> for ApiError {
    fn from(err: grove_auth::AuthError) -> Self {
        Self(err.into())
    }
}

impl From<grove_store::StoreError> for ApiError {
    fn from(err: grove_store::StoreError) -> Self {
        Self(err.into())
    }
}

impl From<grove_queue::QueueError> for ApiError {
    fn from(err: grove_queue::QueueError) -> Self {
        Self(ForestError::Internal(err.to_string()))
    }
}

/// Handler result alias.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
