//! Shared error type across PDP crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed message.
    BadRequest,
    /// Policy definition failed to compile.
    InvalidPolicy,
    /// Decision could not be computed for this request.
    EvaluationFailed,
    /// Update queue no longer accepts commands (shutdown in progress).
    Unavailable,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::InvalidPolicy => "INVALID_POLICY",
            ClientCode::EvaluationFailed => "EVALUATION_FAILED",
            ClientCode::Unavailable => "UNAVAILABLE",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PdpError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum PdpError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
    #[error("evaluation failed: {0}")]
    Evaluation(String),
    #[error("update queue closed")]
    QueueClosed,
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl PdpError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            PdpError::BadRequest(_) => ClientCode::BadRequest,
            PdpError::InvalidPolicy(_) => ClientCode::InvalidPolicy,
            PdpError::Evaluation(_) => ClientCode::EvaluationFailed,
            PdpError::QueueClosed => ClientCode::Unavailable,
            PdpError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            PdpError::Bind { .. } | PdpError::Internal(_) => ClientCode::Internal,
        }
    }
}
