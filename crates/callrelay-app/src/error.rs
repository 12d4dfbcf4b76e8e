//! Axum-specific error types and mappings.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use callrelay_core::{BusError, CoreError, ProviderError, RepositoryError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            HttpError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            HttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            HttpError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            HttpError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            HttpError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = ErrorBody {
            error: message,
            status: status.as_u16(),
            error_type: None,
            metadata: None,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<CoreError> for HttpError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Repository(repo_err) => repo_err.into(),
            CoreError::Bus(bus_err) => bus_err.into(),
            CoreError::Provider(provider_err) => provider_err.into(),
            CoreError::Validation(msg) => HttpError::BadRequest(msg),
            CoreError::ExternalService(msg) => HttpError::ServiceUnavailable(msg),
            CoreError::Internal(msg) => HttpError::Internal(msg),
        }
    }
}

impl From<RepositoryError> for HttpError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => HttpError::NotFound(msg),
            RepositoryError::Storage(msg) => HttpError::Internal(format!("Storage: {msg}")),
            RepositoryError::Constraint(msg) => HttpError::BadRequest(msg),
        }
    }
}

impl From<BusError> for HttpError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::TransientTransport(msg) => HttpError::ServiceUnavailable(msg),
            BusError::CapacityExhausted(msg) => HttpError::ServiceUnavailable(msg),
            BusError::Closed => HttpError::ServiceUnavailable("bus connection closed".into()),
        }
    }
}

impl From<ProviderError> for HttpError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotReady => HttpError::ServiceUnavailable("provider not ready".into()),
            ProviderError::Transport(msg) => HttpError::ServiceUnavailable(msg),
            ProviderError::ReconnectLimitExceeded => {
                HttpError::ServiceUnavailable("provider reconnect limit exceeded".into())
            }
        }
    }
}
