//! Timed ball-path playback.
//!
//! The authority has already fixed the path and the bin; playback only turns the
//! ordered steps into positions on a fixed board and paces them. Frame generation
//! is a pure iterator ([`PlaybackFrames`]) so the same path always yields the same
//! frames, and [`PathPlaybackEngine`] drives that iterator on the tokio timer.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use shared::domain::{DropColumn, PathStep, BOARD_ROWS};
use tokio::{sync::broadcast, task::AbortHandle};
use tracing::debug;

use crate::error::RoundError;

pub const DEFAULT_LEAD_IN: Duration = Duration::from_millis(500);
pub const DEFAULT_TICK: Duration = Duration::from_millis(300);
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardGeometry {
    pub rows: u32,
    pub width: f64,
    pub height: f64,
    /// Distance between the resting bin position and the bottom edge.
    pub bin_inset: f64,
}

impl Default for BoardGeometry {
    fn default() -> Self {
        Self {
            rows: BOARD_ROWS as u32,
            width: 600.0,
            height: 500.0,
            bin_inset: 20.0,
        }
    }
}

impl BoardGeometry {
    pub fn row_height(&self) -> f64 {
        self.height / f64::from(self.rows + 2)
    }

    pub fn column_x(&self, column: u32) -> f64 {
        f64::from(column) / f64::from(self.rows) * self.width
    }

    pub fn drop_position(&self, drop_column: DropColumn) -> BallPosition {
        BallPosition {
            x: self.column_x(u32::from(drop_column.get())),
            y: 0.0,
        }
    }

    pub fn step_position(&self, step: &PathStep) -> BallPosition {
        BallPosition {
            x: self.column_x(step.column),
            y: (f64::from(step.row) + 1.0) * self.row_height(),
        }
    }

    pub fn bin_position(&self, last_step: &PathStep) -> BallPosition {
        BallPosition {
            x: self.column_x(last_step.column),
            y: self.height - self.bin_inset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTiming {
    pub lead_in: Duration,
    pub tick: Duration,
    pub settle: Duration,
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self {
            lead_in: DEFAULT_LEAD_IN,
            tick: DEFAULT_TICK,
            settle: DEFAULT_SETTLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Step { row: u32 },
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackFrame {
    pub run_id: u64,
    pub index: usize,
    pub kind: FrameKind,
    pub position: BallPosition,
    /// Wait before this frame is shown.
    pub delay: Duration,
}

/// Lazy, restartable frame sequence: one frame per path step followed by a single
/// terminal frame at the bin.
#[derive(Debug, Clone)]
pub struct PlaybackFrames {
    run_id: u64,
    path: Arc<[PathStep]>,
    geometry: BoardGeometry,
    timing: PlaybackTiming,
    next: usize,
}

impl PlaybackFrames {
    pub fn new(
        path: Arc<[PathStep]>,
        geometry: BoardGeometry,
        timing: PlaybackTiming,
    ) -> Result<Self, RoundError> {
        if path.is_empty() {
            return Err(RoundError::EmptyPath);
        }
        Ok(Self {
            run_id: 0,
            path,
            geometry,
            timing,
            next: 0,
        })
    }

    fn for_run(mut self, run_id: u64) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn restart(&mut self) {
        self.next = 0;
    }
}

impl Iterator for PlaybackFrames {
    type Item = PlaybackFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next;
        let frame = if let Some(step) = self.path.get(index) {
            PlaybackFrame {
                run_id: self.run_id,
                index,
                kind: FrameKind::Step { row: step.row },
                position: self.geometry.step_position(step),
                delay: if index == 0 {
                    self.timing.lead_in
                } else {
                    self.timing.tick
                },
            }
        } else if index == self.path.len() {
            let last = self.path.last()?;
            PlaybackFrame {
                run_id: self.run_id,
                index,
                kind: FrameKind::Terminal,
                position: self.geometry.bin_position(last),
                delay: self.timing.tick,
            }
        } else {
            return None;
        };
        self.next += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.path.len() + 1).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PlaybackFrames {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub current_step_index: Option<usize>,
    pub ball_position: BallPosition,
    pub animating: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_step_index: None,
            ball_position: BallPosition { x: 0.0, y: 0.0 },
            animating: false,
        }
    }
}

struct ActiveRun {
    run_id: u64,
    abort: AbortHandle,
}

#[derive(Default)]
struct EngineRuns {
    next_run_id: u64,
    active: Option<ActiveRun>,
}

struct EngineShared {
    state: Mutex<PlaybackState>,
    runs: Mutex<EngineRuns>,
    frames: broadcast::Sender<PlaybackFrame>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl EngineShared {
    fn cancel_run(&self, runs: &mut EngineRuns, run_id: Option<u64>) -> bool {
        let matches = match (&runs.active, run_id) {
            (Some(_), None) => true,
            (Some(active), Some(run_id)) => active.run_id == run_id,
            (None, _) => false,
        };
        if !matches {
            return false;
        }
        if let Some(active) = runs.active.take() {
            active.abort.abort();
            lock(&self.state).animating = false;
            debug!(run_id = active.run_id, "playback cancelled");
        }
        true
    }

    fn emit(&self, frame: PlaybackFrame) -> bool {
        let runs = lock(&self.runs);
        if !is_current(&runs, frame.run_id) {
            return false;
        }
        {
            let mut state = lock(&self.state);
            state.ball_position = frame.position;
            if let FrameKind::Step { .. } = frame.kind {
                state.current_step_index = Some(frame.index);
            }
        }
        let _ = self.frames.send(frame);
        true
    }

    fn finish(&self, run_id: u64) -> bool {
        let mut runs = lock(&self.runs);
        if !is_current(&runs, run_id) {
            return false;
        }
        runs.active = None;
        lock(&self.state).animating = false;
        true
    }
}

fn is_current(runs: &EngineRuns, run_id: u64) -> bool {
    runs.active
        .as_ref()
        .is_some_and(|active| active.run_id == run_id)
}

/// Handle to one playback run. Cancelling a run that already finished, or that a
/// newer run replaced, does nothing.
pub struct PlaybackHandle {
    run_id: u64,
    shared: Arc<EngineShared>,
}

impl PlaybackHandle {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn cancel(&self) -> bool {
        let mut runs = lock(&self.shared.runs);
        self.shared.cancel_run(&mut runs, Some(self.run_id))
    }

    pub fn is_active(&self) -> bool {
        is_current(&lock(&self.shared.runs), self.run_id)
    }
}

/// Paces [`PlaybackFrames`] on the tokio timer and broadcasts each frame. At most
/// one run is live; starting a new one cancels the previous run, whose remaining
/// frames and completion callback are dropped.
pub struct PathPlaybackEngine {
    geometry: BoardGeometry,
    timing: PlaybackTiming,
    shared: Arc<EngineShared>,
}

impl Default for PathPlaybackEngine {
    fn default() -> Self {
        Self::new(BoardGeometry::default(), PlaybackTiming::default())
    }
}

impl PathPlaybackEngine {
    pub fn new(geometry: BoardGeometry, timing: PlaybackTiming) -> Self {
        let (frames, _) = broadcast::channel(256);
        Self {
            geometry,
            timing,
            shared: Arc::new(EngineShared {
                state: Mutex::new(PlaybackState::default()),
                runs: Mutex::new(EngineRuns::default()),
                frames,
            }),
        }
    }

    pub fn geometry(&self) -> BoardGeometry {
        self.geometry
    }

    pub fn timing(&self) -> PlaybackTiming {
        self.timing
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackFrame> {
        self.shared.frames.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        *lock(&self.shared.state)
    }

    /// Frames `path` would produce, without scheduling anything.
    pub fn frames(&self, path: &[PathStep]) -> Result<PlaybackFrames, RoundError> {
        PlaybackFrames::new(Arc::from(path), self.geometry, self.timing)
    }

    /// Must be called from within a tokio runtime.
    pub fn start<F>(
        &self,
        path: &[PathStep],
        drop_column: DropColumn,
        on_complete: F,
    ) -> Result<PlaybackHandle, RoundError>
    where
        F: FnOnce() + Send + 'static,
    {
        let frames = self.frames(path)?;
        let settle = self.timing.settle;

        let mut runs = lock(&self.shared.runs);
        self.shared.cancel_run(&mut runs, None);
        runs.next_run_id += 1;
        let run_id = runs.next_run_id;
        let frames = frames.for_run(run_id);

        *lock(&self.shared.state) = PlaybackState {
            current_step_index: None,
            ball_position: self.geometry.drop_position(drop_column),
            animating: true,
        };

        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move {
            for frame in frames {
                tokio::time::sleep(frame.delay).await;
                if !shared.emit(frame) {
                    return;
                }
            }
            tokio::time::sleep(settle).await;
            if shared.finish(run_id) {
                debug!(run_id, "playback complete");
                on_complete();
            }
        });
        runs.active = Some(ActiveRun {
            run_id,
            abort: task.abort_handle(),
        });
        debug!(run_id, steps = path.len(), "playback started");

        Ok(PlaybackHandle {
            run_id,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Cancels whatever run is live.
    pub fn cancel_all(&self) -> bool {
        let mut runs = lock(&self.shared.runs);
        self.shared.cancel_run(&mut runs, None)
    }
}

#[cfg(test)]
#[path = "tests/playback_tests.rs"]
mod tests;
