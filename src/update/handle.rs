//! Per-operation state shared between a search worker and its consumer.
//!
//! Status only moves forward: `Created -> Running -> Complete -> Closed`.
//! The worker side calls the `set_*` methods, the consumer polls or waits and
//! then drains candidates. Completion is broadcast on a watch channel so
//! waiters never hold the state lock.

use crate::error::LyricError;
use crate::lyrics::LyricData;
use crate::track::{Track, TrackInfo};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    #[allow(dead_code)]
    Unknown,
    AutoSearch,
    ManualSearch,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    #[allow(dead_code)]
    Unknown,
    Created,
    Running,
    Complete,
    Closed,
}

#[derive(Debug)]
struct State {
    status: Status,
    candidates: Vec<LyricData>,
    /// Candidates before this index have been handed to the consumer.
    drained: usize,
    progress: String,
    searched_remote: bool,
}

#[derive(Debug)]
pub struct LyricUpdateHandle {
    kind: UpdateKind,
    track: Arc<Track>,
    track_info: TrackInfo,
    abort: CancellationToken,
    state: Mutex<State>,
    complete: watch::Sender<bool>,
}

impl LyricUpdateHandle {
    pub fn new(kind: UpdateKind, track: Arc<Track>, abort: CancellationToken) -> Self {
        let track_info = track.info();
        let (complete, _) = watch::channel(false);
        Self {
            kind,
            track,
            track_info,
            abort,
            state: Mutex::new(State {
                status: Status::Created,
                candidates: Vec::new(),
                drained: 0,
                progress: String::new(),
                searched_remote: false,
            }),
            complete,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock for a producer-side change. `None` once the handle is closed.
    fn lock_for_update(&self, operation: &str) -> Option<MutexGuard<'_, State>> {
        let state = self.lock();
        if state.status == Status::Closed {
            tracing::error!(
                "{operation} on closed lyric update for {}",
                self.track.location
            );
        }
        debug_assert_ne!(
            state.status,
            Status::Closed,
            "{operation} on a closed lyric update handle"
        );
        (state.status != Status::Closed).then_some(state)
    }

    fn mark_complete(&self, state: &mut State) {
        state.status = Status::Complete;
        self.complete.send_replace(true);
    }

    // Producer side

    pub fn set_started(&self) {
        let Some(mut state) = self.lock_for_update("set_started") else {
            return;
        };
        if state.status == Status::Created {
            state.status = Status::Running;
        }
    }

    pub fn set_progress(&self, value: impl Into<String>) {
        if let Some(mut state) = self.lock_for_update("set_progress") {
            state.progress = value.into();
        }
    }

    /// Latches: once a remote source was queried this stays true.
    pub fn set_remote_source_searched(&self) {
        if let Some(mut state) = self.lock_for_update("set_remote_source_searched") {
            state.searched_remote = true;
        }
    }

    /// Append a candidate. A final result also completes the handle.
    pub fn set_result(&self, data: LyricData, final_result: bool) {
        let Some(mut state) = self.lock_for_update("set_result") else {
            return;
        };
        if state.status == Status::Complete {
            tracing::warn!(
                "Ignoring lyric result for {} after completion",
                self.track.location
            );
            return;
        }
        state.candidates.push(data);
        if final_result {
            self.mark_complete(&mut state);
        }
    }

    /// Complete without committing another candidate.
    pub fn set_complete(&self) {
        let Some(mut state) = self.lock_for_update("set_complete") else {
            return;
        };
        if state.status != Status::Complete {
            self.mark_complete(&mut state);
        }
    }

    // Consumer side

    pub fn status(&self) -> Status {
        self.lock().status
    }

    pub fn is_complete(&self) -> bool {
        self.status() >= Status::Complete
    }

    /// Wait until the handle completes, `timeout` elapses or the search is
    /// aborted. Returns whether the handle is complete.
    pub async fn wait_for_complete(&self, timeout: Duration) -> bool {
        let mut rx = self.complete.subscribe();
        let completed = async move { rx.wait_for(|done| *done).await.is_ok() };
        tokio::select! {
            result = tokio::time::timeout(timeout, completed) => result.unwrap_or(false),
            _ = self.abort.cancelled() => self.is_complete(),
        }
    }

    /// Whether a candidate exists that the consumer has not seen yet.
    pub fn has_result(&self) -> bool {
        let state = self.lock();
        state.drained < state.candidates.len()
    }

    /// The most recent candidate. Marks every candidate as seen and closes
    /// the handle if the search is complete.
    pub fn get_result(&self) -> Option<LyricData> {
        let mut state = self.lock();
        state.drained = state.candidates.len();
        if state.status == Status::Complete {
            state.status = Status::Closed;
        }
        state.candidates.last().cloned()
    }

    /// The oldest unseen candidate. Closes the handle once it is complete and
    /// nothing is left to hand out.
    pub fn next_result(&self) -> Option<LyricData> {
        let mut state = self.lock();
        let next = state.candidates.get(state.drained).cloned()?;
        state.drained += 1;
        if state.status == Status::Complete && state.drained == state.candidates.len() {
            state.status = Status::Closed;
        }
        Some(next)
    }

    /// Every unseen candidate in commit order.
    pub fn drain_results(&self) -> Vec<LyricData> {
        let mut state = self.lock();
        let start = state.drained;
        state.drained = state.candidates.len();
        state.candidates[start..].to_vec()
    }

    /// Close a completed handle. Returns false if it is still running.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        match state.status {
            Status::Complete | Status::Closed => {
                state.status = Status::Closed;
                true
            }
            status => {
                tracing::warn!(
                    "Refusing to close lyric update for {} while {status:?}",
                    self.track.location
                );
                false
            }
        }
    }

    pub fn abort(&self) {
        self.abort.cancel();
    }

    pub fn progress(&self) -> String {
        self.lock().progress.clone()
    }

    pub fn has_searched_remote_sources(&self) -> bool {
        self.lock().searched_remote
    }

    pub fn kind(&self) -> UpdateKind {
        self.kind
    }

    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }

    pub fn track_info(&self) -> &TrackInfo {
        &self.track_info
    }

    /// The abort token, or `Cancelled` if it has already fired.
    pub fn get_checked_abort(&self) -> Result<&CancellationToken, LyricError> {
        if self.abort.is_cancelled() {
            return Err(LyricError::Cancelled);
        }
        Ok(&self.abort)
    }
}
