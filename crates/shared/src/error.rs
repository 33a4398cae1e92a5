use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidInput,
    CommitFailed,
    StartFailed,
    VerifyFailed,
    NoResultAvailable,
    NoRoundId,
    IncompleteInput,
    EmptyPath,
    Disposed,
}

impl ErrorCode {
    /// Guard violations only happen when a host sequences calls incorrectly.
    pub fn is_guard_violation(self) -> bool {
        matches!(
            self,
            ErrorCode::NoResultAvailable | ErrorCode::NoRoundId | ErrorCode::EmptyPath
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BetParseError {
    #[error("bet amount is empty")]
    Empty,
    #[error("bet amount '{0}' is not a decimal number")]
    Malformed(String),
    #[error("bet amount '{0}' is too large")]
    Overflow(String),
}
