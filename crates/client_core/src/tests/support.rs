//! In-memory round authority for unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shared::{
    domain::{Direction, GameResult, PathStep, RoundId, BOARD_ROWS},
    protocol::{CommitResponse, RevealResponse, StartRoundRequest, VerifyQuery, VerifyResponse},
};
use tokio::sync::Notify;

use crate::{authority::RoundAuthority, error::AuthorityError};

pub(crate) fn sample_path(column: u32) -> Vec<PathStep> {
    (0..BOARD_ROWS as u32)
        .map(|row| PathStep {
            row,
            column,
            direction: if row % 2 == 0 {
                Direction::Left
            } else {
                Direction::Right
            },
        })
        .collect()
}

pub(crate) fn sample_result(round_id: &str) -> GameResult {
    GameResult {
        round_id: Some(RoundId::new(round_id)),
        peg_map: vec![vec![0.5; 13]; BOARD_ROWS],
        path: sample_path(6),
        bin_index: 6,
        payout_multiplier: 2.5,
        bet_cents: 100,
        win_amount: 250,
        client_seed: "abc".into(),
        nonce: Some("1".into()),
        drop_column: None,
    }
}

pub(crate) fn server_error(status: u16) -> AuthorityError {
    AuthorityError::Status {
        status,
        body: "internal error".into(),
    }
}

pub(crate) struct FakeAuthority {
    pub commit: Mutex<Result<CommitResponse, AuthorityError>>,
    pub start: Mutex<Result<GameResult, AuthorityError>>,
    pub reveal: Mutex<Result<RevealResponse, AuthorityError>>,
    pub verify: Mutex<Result<VerifyResponse, AuthorityError>>,
    pub calls: Mutex<Vec<String>>,
    pub start_requests: Mutex<Vec<StartRoundRequest>>,
    pub verify_queries: Mutex<Vec<VerifyQuery>>,
    /// When set, `start` parks until the notify fires.
    pub start_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeAuthority {
    pub(crate) fn ok(round_id: &str) -> Self {
        Self {
            commit: Mutex::new(Ok(CommitResponse {
                round_id: RoundId::new(round_id),
            })),
            start: Mutex::new(Ok(sample_result(round_id))),
            reveal: Mutex::new(Ok(RevealResponse {
                server_seed: Some("server-seed-1".into()),
                client_seed: Some("abc".into()),
                nonce: Some("1".into()),
            })),
            verify: Mutex::new(Ok(VerifyResponse {
                commit_hex: Some("c0ffee".into()),
                combined_seed: Some("combined".into()),
                peg_map_hash: Some("pegs".into()),
                bin_index: Some(6),
                payout_multiplier: Some(2.5),
                path: Some(sample_path(6)),
            })),
            calls: Mutex::new(Vec::new()),
            start_requests: Mutex::new(Vec::new()),
            verify_queries: Mutex::new(Vec::new()),
            start_gate: Mutex::new(None),
        }
    }

    pub(crate) fn set_commit(&self, value: Result<CommitResponse, AuthorityError>) {
        *self.commit.lock().expect("commit lock") = value;
    }

    pub(crate) fn set_start(&self, value: Result<GameResult, AuthorityError>) {
        *self.start.lock().expect("start lock") = value;
    }

    pub(crate) fn set_reveal(&self, value: Result<RevealResponse, AuthorityError>) {
        *self.reveal.lock().expect("reveal lock") = value;
    }

    pub(crate) fn set_verify(&self, value: Result<VerifyResponse, AuthorityError>) {
        *self.verify.lock().expect("verify lock") = value;
    }

    pub(crate) fn gate_start(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.start_gate.lock().expect("gate lock") = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl RoundAuthority for FakeAuthority {
    async fn commit(&self) -> Result<CommitResponse, AuthorityError> {
        self.record("commit".into());
        self.commit.lock().expect("commit lock").clone()
    }

    async fn start(
        &self,
        round_id: &RoundId,
        request: &StartRoundRequest,
    ) -> Result<GameResult, AuthorityError> {
        self.record(format!("start {round_id}"));
        self.start_requests
            .lock()
            .expect("start requests lock")
            .push(request.clone());
        let gate = self.start_gate.lock().expect("gate lock").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.start.lock().expect("start lock").clone()
    }

    async fn reveal(&self, round_id: &RoundId) -> Result<RevealResponse, AuthorityError> {
        self.record(format!("reveal {round_id}"));
        self.reveal.lock().expect("reveal lock").clone()
    }

    async fn verify(&self, query: &VerifyQuery) -> Result<VerifyResponse, AuthorityError> {
        self.record("verify".into());
        self.verify_queries
            .lock()
            .expect("verify queries lock")
            .push(query.clone());
        self.verify.lock().expect("verify lock").clone()
    }
}
