//! Verification form: holds the four verify inputs, validates them, asks the
//! authority to re-derive the round and renders its answer verbatim.

use std::fmt;

use shared::{
    domain::{VerificationField, VerificationInput},
    protocol::{VerifyQuery, VerifyResponse},
};
use tracing::{info, warn};

use crate::{
    authority::RoundAuthority,
    error::RoundError,
    reconciler::ReconciledVerification,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyForm {
    input: VerificationInput,
    autofilled: bool,
    notice: Option<String>,
}

impl VerifyForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the form contents with a reconciled record.
    pub fn prefill(&mut self, reconciled: &ReconciledVerification) {
        self.input = reconciled.input.clone();
        self.autofilled = true;
        self.notice = reconciled.notice();
    }

    pub fn set_field(&mut self, field: VerificationField, value: impl Into<String>) {
        self.input.set_field(field, value);
        self.autofilled = false;
        if field == VerificationField::ServerSeed && !self.input.server_seed.trim().is_empty() {
            self.notice = None;
        }
    }

    pub fn input(&self) -> &VerificationInput {
        &self.input
    }

    pub fn is_autofilled(&self) -> bool {
        self.autofilled
    }

    /// Warning shown while the server seed still has to be entered by hand.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn validate(&self) -> Result<VerifyQuery, RoundError> {
        let missing = self.input.missing_fields();
        if !missing.is_empty() {
            return Err(RoundError::IncompleteInput(missing));
        }
        Ok(VerifyQuery::from(&self.input))
    }

    pub async fn submit(
        &self,
        authority: &dyn RoundAuthority,
    ) -> Result<VerificationReport, RoundError> {
        let query = self.validate()?;
        let response = authority.verify(&query).await.map_err(|err| {
            warn!(error = %err, "verify request failed");
            RoundError::VerifyFailed(err)
        })?;
        let report = VerificationReport { response };
        info!(verified = report.is_success(), "verification answered");
        Ok(report)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub response: VerifyResponse,
}

impl VerificationReport {
    pub fn is_success(&self) -> bool {
        self.response.bin_index.is_some()
    }

    pub fn replay_lines(&self) -> Vec<String> {
        self.response
            .path
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".into());
        let response = &self.response;
        writeln!(f, "Commit Hash: {}", text(&response.commit_hex))?;
        writeln!(f, "Combined Seed: {}", text(&response.combined_seed))?;
        writeln!(f, "Peg Map Hash: {}", text(&response.peg_map_hash))?;
        match response.bin_index {
            Some(bin) => writeln!(f, "Final Bin: {bin}")?,
            None => writeln!(f, "Final Bin: -")?,
        }
        match response.payout_multiplier {
            Some(multiplier) => writeln!(f, "Payout Multiplier: {multiplier}x")?,
            None => writeln!(f, "Payout Multiplier: -")?,
        }
        let replay = self.replay_lines();
        if !replay.is_empty() {
            writeln!(f, "Ball Path Replay:")?;
            for line in replay {
                writeln!(f, "  {line}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/verify_form_tests.rs"]
mod tests;
