use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Startup and transport failures. Tool-level failures are [`OperationError`].
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    ConfigError(String),

    #[error("file access error: {path} - {reason}")]
    FileAccessError { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    PermissionDenied,
    InvalidArgument,
    Internal,
    Unavailable,
    Unauthenticated,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::Internal => "INTERNAL",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed query or detail lookup, passed through to the caller as a value.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct OperationError {
    pub message: String,
    pub code: ErrorCode,
}

impl OperationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

/// Wire shape `{"error": {"message": .., "code": ..}}` used by both tool surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: OperationError,
}

impl From<OperationError> for ErrorBody {
    fn from(error: OperationError) -> Self {
        Self { error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_serializes_screaming_snake() {
        let err = OperationError::not_found("log entry with ID x not found");
        let json = serde_json::to_value(ErrorBody::from(err)).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "log entry with ID x not found");

        let code: ErrorCode = serde_json::from_str("\"PERMISSION_DENIED\"").unwrap();
        assert_eq!(code, ErrorCode::PermissionDenied);
    }

    #[test]
    fn display_includes_code() {
        let err = OperationError::new(ErrorCode::Unavailable, "backend down");
        assert_eq!(err.to_string(), "UNAVAILABLE: backend down");
    }
}
