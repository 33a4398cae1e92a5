//! Round lifecycle: commit, start, animate, show result, reveal.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use shared::{
    domain::{DropColumn, GameResult, Round},
    error::ErrorReport,
    money::parse_bet_cents,
    protocol::StartRoundRequest,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    authority::RoundAuthority,
    error::{AuthorityError, RoundError},
    playback::{PathPlaybackEngine, PlaybackHandle},
    reconciler::{ReconciledVerification, VerificationReconciler},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundPhase {
    Idle,
    Committing,
    Starting,
    Animating,
    ResultShown,
}

impl RoundPhase {
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            RoundPhase::Committing | RoundPhase::Starting | RoundPhase::Animating
        )
    }
}

#[derive(Debug, Clone)]
pub enum RoundEvent {
    PhaseChanged {
        from: RoundPhase,
        to: RoundPhase,
    },
    RoundStarted(Arc<GameResult>),
    RoundCompleted {
        result: Arc<GameResult>,
        completed_at: DateTime<Utc>,
    },
    RoundFailed(ErrorReport),
    VerificationPrepared(ReconciledVerification),
}

#[derive(Debug, Clone)]
pub enum DropOutcome {
    Started(Arc<GameResult>),
    /// Another round was still in flight; nothing was sent.
    Rejected(RoundPhase),
}

struct ControllerState {
    phase: RoundPhase,
    epoch: u64,
    round: Option<Round>,
    result: Option<Arc<GameResult>>,
    playback: Option<PlaybackHandle>,
    disposed: bool,
}

pub struct RoundController {
    authority: Arc<dyn RoundAuthority>,
    engine: PathPlaybackEngine,
    reconciler: VerificationReconciler,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<RoundEvent>,
}

impl RoundController {
    pub fn new(authority: Arc<dyn RoundAuthority>) -> Arc<Self> {
        Self::with_engine(authority, PathPlaybackEngine::default())
    }

    pub fn with_engine(authority: Arc<dyn RoundAuthority>, engine: PathPlaybackEngine) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            reconciler: VerificationReconciler::new(Arc::clone(&authority)),
            authority,
            engine,
            inner: Mutex::new(ControllerState {
                phase: RoundPhase::Idle,
                epoch: 0,
                round: None,
                result: None,
                playback: None,
                disposed: false,
            }),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.events.subscribe()
    }

    pub fn engine(&self) -> &PathPlaybackEngine {
        &self.engine
    }

    pub fn authority(&self) -> Arc<dyn RoundAuthority> {
        Arc::clone(&self.authority)
    }

    pub fn phase(&self) -> RoundPhase {
        self.state().phase
    }

    pub fn current_round(&self) -> Option<Round> {
        self.state().round.clone()
    }

    pub fn current_result(&self) -> Option<Arc<GameResult>> {
        self.state().result.clone()
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, state: &mut ControllerState, to: RoundPhase) {
        let from = state.phase;
        if from == to {
            return;
        }
        state.phase = to;
        debug!(?from, ?to, "round phase changed");
        let _ = self.events.send(RoundEvent::PhaseChanged { from, to });
    }

    fn check_not_disposed(state: &ControllerState) -> Result<(), RoundError> {
        if state.disposed {
            return Err(RoundError::Disposed(state.phase));
        }
        Ok(())
    }

    /// Fails with `Disposed` when the controller was shut down after `epoch` began.
    fn check_live(state: &ControllerState, epoch: u64) -> Result<(), RoundError> {
        if state.disposed || state.epoch != epoch {
            return Err(RoundError::Disposed(state.phase));
        }
        Ok(())
    }

    fn fail_round(&self, epoch: u64, err: RoundError) -> RoundError {
        let mut state = self.state();
        if let Err(disposed) = Self::check_live(&state, epoch) {
            debug!(error = %err, "discarding failure for a disposed round");
            return disposed;
        }
        warn!(error = %err, phase = ?state.phase, "round failed");
        state.round = None;
        state.result = None;
        self.set_phase(&mut state, RoundPhase::Idle);
        let _ = self.events.send(RoundEvent::RoundFailed(ErrorReport::from(&err)));
        err
    }

    /// Commits and starts a round, then hands the path to the playback engine.
    ///
    /// Does nothing while another round is committing, starting or animating. The
    /// bet is validated before any network call. No retries happen here; a failed
    /// commit or start leaves the controller idle with no round retained.
    pub async fn request_drop(
        self: &Arc<Self>,
        drop_column: u8,
        bet_amount: &str,
        client_seed: &str,
    ) -> Result<DropOutcome, RoundError> {
        let (epoch, drop_column, bet_cents) = {
            let mut state = self.state();
            Self::check_not_disposed(&state)?;
            if state.phase.is_busy() {
                debug!(phase = ?state.phase, "drop ignored while a round is in flight");
                return Ok(DropOutcome::Rejected(state.phase));
            }
            let drop_column =
                DropColumn::new(drop_column).ok_or(RoundError::InvalidColumn(drop_column))?;
            let bet_cents = parse_bet_cents(bet_amount)?;

            if let Some(previous) = state.playback.take() {
                previous.cancel();
            }
            state.epoch += 1;
            state.round = None;
            state.result = None;
            self.set_phase(&mut state, RoundPhase::Committing);
            (state.epoch, drop_column, bet_cents)
        };
        let mut pending = PendingDrop {
            controller: self.as_ref(),
            epoch,
            armed: true,
        };

        let round_id = match self.authority.commit().await {
            Ok(commit) if commit.round_id.is_empty() => {
                let err = AuthorityError::Decode("commit response has an empty roundId".into());
                return Err(self.fail_round(epoch, RoundError::CommitFailed(err)));
            }
            Ok(commit) => commit.round_id,
            Err(err) => return Err(self.fail_round(epoch, RoundError::CommitFailed(err))),
        };

        let round = Round {
            round_id,
            client_seed: client_seed.to_string(),
            bet_cents,
            drop_column,
        };
        {
            let mut state = self.state();
            Self::check_live(&state, epoch)?;
            state.round = Some(round.clone());
            self.set_phase(&mut state, RoundPhase::Starting);
        }
        debug!(round_id = %round.round_id, "round committed");

        let request = StartRoundRequest {
            client_seed: round.client_seed.clone(),
            bet_cents: round.bet_cents,
            drop_column: round.drop_column,
        };
        let mut result = match self.authority.start(&round.round_id, &request).await {
            Ok(result) => result,
            Err(err) => return Err(self.fail_round(epoch, RoundError::StartFailed(err))),
        };
        if let Some(violation) = result.path_violation() {
            let err = RoundError::StartFailed(AuthorityError::Decode(violation));
            return Err(self.fail_round(epoch, err));
        }
        if result.round_id.as_ref().map_or(true, |id| id.is_empty()) {
            result.round_id = Some(round.round_id.clone());
        }
        if result.client_seed.is_empty() {
            result.client_seed = round.client_seed.clone();
        }
        result.drop_column.get_or_insert(round.drop_column);
        let result = Arc::new(result);

        let mut state = self.state();
        Self::check_live(&state, epoch)?;
        let controller = Arc::downgrade(self);
        let handle = self
            .engine
            .start(&result.path, round.drop_column, move || {
                if let Some(controller) = controller.upgrade() {
                    controller.complete_round(epoch);
                }
            });
        let handle = match handle {
            Ok(handle) => handle,
            Err(err) => {
                drop(state);
                return Err(self.fail_round(epoch, err));
            }
        };
        state.playback = Some(handle);
        state.result = Some(Arc::clone(&result));
        self.set_phase(&mut state, RoundPhase::Animating);
        pending.armed = false;
        let _ = self.events.send(RoundEvent::RoundStarted(Arc::clone(&result)));
        info!(
            round_id = %round.round_id,
            bet_cents = round.bet_cents,
            drop_column = %round.drop_column,
            bin_index = result.bin_index,
            "round started"
        );

        Ok(DropOutcome::Started(result))
    }

    /// Marks the current animation finished. The engine calls this on its own; it
    /// is public so hosts that render frames themselves can end playback early.
    pub fn on_playback_complete(&self) {
        let epoch = self.state().epoch;
        self.complete_round(epoch);
    }

    fn complete_round(&self, epoch: u64) {
        let (result, round_id) = {
            let mut state = self.state();
            if Self::check_live(&state, epoch).is_err() || state.phase != RoundPhase::Animating {
                debug!(phase = ?state.phase, "ignoring stale playback completion");
                return;
            }
            let Some(result) = state.result.clone() else {
                return;
            };
            let Some(round_id) = result.round_id.clone() else {
                return;
            };
            if let Some(handle) = state.playback.take() {
                handle.cancel();
            }
            self.set_phase(&mut state, RoundPhase::ResultShown);
            (result, round_id)
        };

        info!(
            %round_id,
            bin_index = result.bin_index,
            win_amount = result.win_amount,
            "round complete"
        );
        let _ = self.events.send(RoundEvent::RoundCompleted {
            result,
            completed_at: Utc::now(),
        });

        // Detached, best-effort reveal. Its outcome never touches controller state;
        // verification performs its own reveal.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%round_id, "no runtime available for background reveal");
            return;
        };
        let authority = Arc::clone(&self.authority);
        runtime.spawn(async move {
            match authority.reveal(&round_id).await {
                Ok(_) => debug!(%round_id, "background reveal succeeded"),
                Err(err) => warn!(%round_id, error = %err, "background reveal failed"),
            }
        });
    }

    /// Builds verification input for the current result. Reveal failures come back
    /// as a degraded record, not an error.
    pub async fn request_verification(&self) -> Result<ReconciledVerification, RoundError> {
        let result = {
            let state = self.state();
            Self::check_not_disposed(&state)?;
            let result = state.result.clone();
            result.ok_or(RoundError::NoResultAvailable)?
        };
        let reconciled = self.reconciler.reconcile(&result).await?;
        Self::check_not_disposed(&self.state())?;
        if reconciled.is_degraded() {
            warn!(round_id = %reconciled.round_id, "verification input is missing the server seed");
        }
        let _ = self
            .events
            .send(RoundEvent::VerificationPrepared(reconciled.clone()));
        Ok(reconciled)
    }

    /// Tears the controller down: clears the live playback and discards any network
    /// response that arrives afterwards.
    pub fn shutdown(&self) {
        let mut state = self.state();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.epoch += 1;
        if let Some(handle) = state.playback.take() {
            handle.cancel();
        }
        self.engine.cancel_all();
        debug!(phase = ?state.phase, "round controller shut down");
    }
}

/// Returns the controller to `Idle` when a `request_drop` future is dropped
/// between commit and the start of playback.
struct PendingDrop<'a> {
    controller: &'a RoundController,
    epoch: u64,
    armed: bool,
}

impl Drop for PendingDrop<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.controller.state();
        if RoundController::check_live(&state, self.epoch).is_err() || !state.phase.is_busy() {
            return;
        }
        debug!(phase = ?state.phase, "drop request abandoned, returning to idle");
        state.round = None;
        state.result = None;
        self.controller.set_phase(&mut state, RoundPhase::Idle);
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
