//! REST API types and the error-to-response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ServerError;

/// Message returned by both validation endpoints on success.
pub const VALID_MESSAGE: &str = "Data model is valid.";

/// Success body of the validation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn valid() -> Self {
        Self {
            message: VALID_MESSAGE.to_string(),
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Unique identifier, also logged, to correlate reports with server logs
    pub request_id: String,
    /// Always "error"
    pub status: String,
    pub error: String,
}

impl ErrorResponse {
    /// Create an error response with a fresh request id
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            status: "error".to_string(),
            error: error.into(),
        }
    }
}

impl ServerError {
    /// Caller mistakes are 400, everything else 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Pipeline(e) if e.is_user_error() => StatusCode::BAD_REQUEST,
            Self::Pipeline(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse::new(message);
        if status.is_server_error() {
            tracing::error!(request_id = %body.request_id, error = %self, "request failed");
        } else {
            tracing::warn!(request_id = %body.request_id, error = %self, "request rejected");
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DataModelError, PipelineError};

    #[test]
    fn test_error_response_shape() {
        let body = serde_json::to_value(ErrorResponse::new("No file provided")).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "No file provided");
        assert!(Uuid::parse_str(body["requestId"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_status_codes() {
        let invalid: ServerError = PipelineError::from(DataModelError::MissingDataset).into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let io: ServerError =
            PipelineError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk")).into();
        assert_eq!(io.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(
            ServerError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::Internal("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
