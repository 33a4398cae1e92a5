//! Client-side round controller for a provably fair Plinko authority.
//!
//! [`RoundController`] drives commit, start, animated playback and the background
//! reveal; [`VerificationReconciler`] and [`VerifyForm`] turn a finished round into
//! a verify query against the same authority.

pub mod authority;
pub mod controller;
pub mod error;
pub mod playback;
pub mod reconciler;
pub mod seed;
pub mod verify_form;

pub use authority::{HttpRoundAuthority, RoundAuthority, DEFAULT_REQUEST_TIMEOUT};
pub use controller::{DropOutcome, RoundController, RoundEvent, RoundPhase};
pub use error::{AuthorityError, RoundError};
pub use playback::{
    BallPosition, BoardGeometry, FrameKind, PathPlaybackEngine, PlaybackFrame, PlaybackFrames,
    PlaybackHandle, PlaybackState, PlaybackTiming,
};
pub use reconciler::{ReconciledVerification, VerificationReconciler, VerificationStatus};
pub use seed::generate_client_seed;
pub use verify_form::{VerificationReport, VerifyForm};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
