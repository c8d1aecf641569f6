use axum::http::StatusCode;
use thiserror::Error;

/// Failures surfaced by the reservation engine.
///
/// Consistency errors indicate a bug in the engine itself; they are logged
/// at the point of detection and must never be downgraded or retried.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("insufficient quantity available for resource {resource_id}")]
    InsufficientResource { resource_id: i32 },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("timed out waiting for a lock, try again")]
    LockTimeout,

    #[error("internal consistency violation: {0}")]
    Consistency(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// `what` is the missing entity, e.g. `"request 42"`.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientResource { .. } => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::LockTimeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::Consistency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Lock timeouts are the only retryable failure; everything else is a
    /// definitive answer for the request that produced it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout)
    }
}
