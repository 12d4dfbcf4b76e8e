//! Error hierarchy shared by every adapter crate. Mirrors the layering the
//! rest of the workspace uses: adapter-specific errors convert into
//! `CoreError` via `#[from]`, and `callrelay-app::HttpError` converts
//! `CoreError` into an HTTP response.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("transient transport error: {0}")]
    TransientTransport(String),

    #[error("bus capacity exhausted: {0}")]
    CapacityExhausted(String),

    #[error("bus connection closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider session not ready")]
    NotReady,

    #[error("provider transport error: {0}")]
    Transport(String),

    #[error("provider reconnect limit exceeded")]
    ReconnectLimitExceeded,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("internal error: {0}")]
    Internal(String),
}
