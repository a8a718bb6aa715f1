use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use notary_engine::EngineError;
use notary_ledger::LedgerError;
use notary_store::StoreError;

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Errors returned from request handlers, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(e) => engine_status(e),
        }
    }
}

fn engine_status(error: &EngineError) -> StatusCode {
    match error {
        EngineError::NotFound(_)
        | EngineError::ArtifactBytesMissing(_)
        | EngineError::UnknownAttempt(_) => StatusCode::NOT_FOUND,
        EngineError::NotAnchored { .. }
        | EngineError::AttemptResolved { .. }
        | EngineError::ReconcileMismatch { .. } => StatusCode::CONFLICT,
        EngineError::MissingHash { .. }
        | EngineError::InvalidHash { .. }
        | EngineError::Type(_)
        | EngineError::Merkle(_) => StatusCode::BAD_REQUEST,
        EngineError::Store(e) => match e {
            StoreError::NotFound(_) | StoreError::BatchNotFound(_) => StatusCode::NOT_FOUND,
            StoreError::DuplicateArtifact(_)
            | StoreError::InvalidTransition { .. }
            | StoreError::BatchImmutable(_) => StatusCode::CONFLICT,
            StoreError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        EngineError::Ledger(e) => match e {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        },
        EngineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
