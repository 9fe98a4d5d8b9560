//! Structured failure classes surfaced to callers of the structure service.

/// Error returned by the repository structure service.
///
/// Infrastructure code works with `anyhow::Error`; a `ServiceError` can ride
/// inside one and is recovered unchanged by [`ServiceError::from_anyhow`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Missing project, repository, or scope path.
    #[error("{0}")]
    NotFound(String),

    /// The request names something that cannot be used as asked.
    #[error("{0}")]
    BadRequest(String),

    /// Unexpected failure.  Carries the original message for diagnostics.
    #[error("Failed to fetch project structure: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Recover a structured error if one was wrapped, otherwise classify the
    /// failure as internal, keeping the whole context chain.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<ServiceError>() {
            Ok(structured) => structured,
            Err(other) => Self::Internal(format!("{other:#}")),
        }
    }

    /// Short label used for metrics and logs.
    pub fn class(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal",
        }
    }
}
