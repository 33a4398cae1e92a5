use std::time::Duration;

use shared::{
    domain::VerificationField,
    error::{BetParseError, ErrorCode, ErrorReport},
};
use thiserror::Error;

use crate::controller::RoundPhase;

/// A failed call against the round authority, normalized from whatever went wrong
/// on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    #[error("authority returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("authority did not answer within {0:?}")]
    Timeout(Duration),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("unexpected authority response: {0}")]
    Decode(String),
}

impl AuthorityError {
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthorityError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            AuthorityError::Timeout(timeout)
        } else if err.is_decode() {
            AuthorityError::Decode(err.to_string())
        } else {
            AuthorityError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    #[error("invalid bet amount: {0}")]
    InvalidBet(#[from] BetParseError),
    #[error("drop column {0} is outside 0..=12")]
    InvalidColumn(u8),
    #[error("failed to create round commitment: {0}")]
    CommitFailed(#[source] AuthorityError),
    #[error("failed to start round: {0}")]
    StartFailed(#[source] AuthorityError),
    #[error("verification failed: {0}")]
    VerifyFailed(#[source] AuthorityError),
    #[error("no round result is available yet")]
    NoResultAvailable,
    #[error("round result carries no round id")]
    NoRoundId,
    #[error("missing verification fields: {}", field_names(.0))]
    IncompleteInput(Vec<VerificationField>),
    #[error("cannot play back an empty path")]
    EmptyPath,
    #[error("round controller was shut down while in {0:?}")]
    Disposed(RoundPhase),
}

fn field_names(fields: &[VerificationField]) -> String {
    fields
        .iter()
        .map(|field| field.name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl RoundError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RoundError::InvalidBet(_) | RoundError::InvalidColumn(_) => ErrorCode::InvalidInput,
            RoundError::CommitFailed(_) => ErrorCode::CommitFailed,
            RoundError::StartFailed(_) => ErrorCode::StartFailed,
            RoundError::VerifyFailed(_) => ErrorCode::VerifyFailed,
            RoundError::NoResultAvailable => ErrorCode::NoResultAvailable,
            RoundError::NoRoundId => ErrorCode::NoRoundId,
            RoundError::IncompleteInput(_) => ErrorCode::IncompleteInput,
            RoundError::EmptyPath => ErrorCode::EmptyPath,
            RoundError::Disposed(_) => ErrorCode::Disposed,
        }
    }
}

impl From<&RoundError> for ErrorReport {
    fn from(value: &RoundError) -> Self {
        ErrorReport::new(value.code(), value.to_string())
    }
}
