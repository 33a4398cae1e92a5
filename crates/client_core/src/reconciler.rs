//! Builds verification input for a finished round, with or without the revealed
//! server seed.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use shared::{
    domain::{GameResult, RoundId, VerificationInput},
    protocol::RevealResponse,
};
use tracing::{info, warn};

use crate::{
    authority::RoundAuthority,
    error::{AuthorityError, RoundError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    /// The server seed came from a successful reveal.
    Authoritative,
    /// The reveal failed; the server seed is empty and must be entered by hand.
    Degraded { failure: AuthorityError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledVerification {
    pub round_id: RoundId,
    pub input: VerificationInput,
    pub status: VerificationStatus,
}

impl ReconciledVerification {
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, VerificationStatus::Degraded { .. })
    }

    /// User-facing warning for degraded records.
    pub fn notice(&self) -> Option<String> {
        let VerificationStatus::Degraded { failure } = &self.status else {
            return None;
        };
        let reason = match failure {
            AuthorityError::Status { status, body } if body.is_empty() => format!("({status})"),
            AuthorityError::Status { status, body } => format!("({status}): {body}"),
            other => format!(": {other}"),
        };
        Some(format!(
            "Server seed reveal failed {reason}. Please try again or enter the server seed manually."
        ))
    }
}

pub struct VerificationReconciler {
    authority: Arc<dyn RoundAuthority>,
    revealed: Mutex<HashMap<RoundId, RevealResponse>>,
}

impl VerificationReconciler {
    pub fn new(authority: Arc<dyn RoundAuthority>) -> Self {
        Self {
            authority,
            revealed: Mutex::new(HashMap::new()),
        }
    }

    /// Only fails when the result has no round id; reveal failures produce a
    /// degraded record instead.
    pub async fn reconcile(
        &self,
        result: &GameResult,
    ) -> Result<ReconciledVerification, RoundError> {
        let round_id = result
            .round_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(RoundError::NoRoundId)?;

        let reconciled = match self.reveal(&round_id).await {
            Ok(reveal) => {
                info!(%round_id, "server seed revealed for verification");
                ReconciledVerification {
                    input: VerificationInput {
                        server_seed: reveal.server_seed.unwrap_or_default(),
                        client_seed: reveal
                            .client_seed
                            .filter(|seed| !seed.is_empty())
                            .unwrap_or_else(|| result.client_seed.clone()),
                        nonce: reveal
                            .nonce
                            .filter(|nonce| !nonce.is_empty())
                            .or_else(|| result.nonce.clone())
                            .unwrap_or_default(),
                        drop_column: drop_column_text(result),
                    },
                    round_id,
                    status: VerificationStatus::Authoritative,
                }
            }
            Err(failure) => {
                warn!(%round_id, error = %failure, "reveal failed, verification input is degraded");
                ReconciledVerification {
                    input: VerificationInput {
                        server_seed: String::new(),
                        client_seed: result.client_seed.clone(),
                        nonce: result.nonce.clone().unwrap_or_default(),
                        drop_column: drop_column_text(result),
                    },
                    round_id,
                    status: VerificationStatus::Degraded { failure },
                }
            }
        };
        Ok(reconciled)
    }

    /// Reveals through the authority, reusing the first successful answer per round.
    async fn reveal(&self, round_id: &RoundId) -> Result<RevealResponse, AuthorityError> {
        let cached = self
            .revealed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(round_id)
            .cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let reveal = self.authority.reveal(round_id).await?;
        if reveal
            .server_seed
            .as_deref()
            .is_some_and(|seed| !seed.is_empty())
        {
            self.revealed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(round_id.clone())
                .or_insert_with(|| reveal.clone());
        }
        Ok(reveal)
    }
}

fn drop_column_text(result: &GameResult) -> String {
    result
        .drop_column
        .map(|column| column.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod tests;
