use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use postspace_shared::wire::ErrorBody;
use postspace_shared::ValidationError;
use postspace_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream service failed: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ServerError::NotFound(what.to_string()),
            // Constraint messages name tables and columns; keep them out
            // of responses.
            StoreError::Conflict(detail) => {
                tracing::debug!(detail = %detail, "Store constraint violated");
                ServerError::Conflict("resource already exists".to_string())
            }
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(e: JsonRejection) -> Self {
        ServerError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(e: QueryRejection) -> Self {
        ServerError::BadRequest(e.body_text())
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) | ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::Upstream(detail) => {
                tracing::warn!(detail = %detail, "Upstream failure");
                "Upstream service unavailable".to_string()
            }
            ServerError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal error");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, axum::Json(ErrorBody { error: message })).into_response()
    }
}
