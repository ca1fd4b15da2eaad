//! Error-to-HTTP mapping.
//!
//! Every failure leaves the API as `{ "error": "<message>" }`. Validation
//! and malformed bodies are 400, missing documents 404. Everything else the
//! store rejects is 500, conflicts included; handlers that treat a conflict
//! as a bad request say so with [`ApiError::from_state_conflict_as_bad_request`].

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{error, warn};

use todogrid_core::ValidationError;
use todogrid_state::StateError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Wrap a store error with the operation that failed.
    pub fn from_state(context: &str, err: StateError) -> Self {
        let status = match err {
            StateError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: format!("{context}: {err}"),
        }
    }

    /// Like [`ApiError::from_state`], but a conflict is the caller's fault.
    pub fn from_state_conflict_as_bad_request(context: &str, err: StateError) -> Self {
        match err {
            StateError::Conflict(_) => Self::bad_request(format!("{context}: {err}")),
            err => Self::from_state(context, err),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.0)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        } else {
            warn!(status = %self.status, error = %self.message, "request rejected");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Decode an already-validated body into a typed input.
pub(crate) fn decode_body<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_errors_map_to_statuses() {
        let not_found = ApiError::from_state("Failed to get todo", StateError::NotFound("Todo not found".into()));
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.message, "Failed to get todo: Todo not found");

        let conflict = ApiError::from_state("Failed to delete column", StateError::Conflict("protected".into()));
        assert_eq!(conflict.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(conflict.message, "Failed to delete column: protected");

        let duplicate = ApiError::from_state_conflict_as_bad_request(
            "Failed to add column",
            StateError::Conflict("dup".into()),
        );
        assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
        assert_eq!(duplicate.message, "Failed to add column: dup");

        let missing = ApiError::from_state_conflict_as_bad_request(
            "Failed to add column",
            StateError::NotFound("Column not found".into()),
        );
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let storage = ApiError::from_state("Failed to get todos", StateError::Read("io".into()));
        assert_eq!(storage.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_is_bad_request() {
        let err: ApiError = ValidationError("Invalid email format".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
