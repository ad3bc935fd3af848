use crate::data::RunResults;
use crate::notify::{Notification, Notifier};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ready,
    Running,
    Stepping,
    Paused,
    Completed,
    Resetting,
}

impl Status {
    /// A worker exists and has not finished.
    pub fn is_active(&self) -> bool {
        matches!(self, Status::Running | Status::Stepping | Status::Paused)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Status::Ready => "ready",
            Status::Running => "running",
            Status::Stepping => "stepping",
            Status::Paused => "paused",
            Status::Completed => "completed",
            Status::Resetting => "resetting",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the worker must do after a suspension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Abort,
}

#[derive(Debug)]
pub(crate) struct ControlState {
    pub status: Status,
    /// One more tick may run while stepping.
    pub step_granted: bool,
    pub trial: usize,
    pub tick: u32,
    pub started: Option<Instant>,
    pub elapsed: Duration,
    pub delay: Duration,
    pub results: RunResults,
}

#[derive(Debug)]
pub struct Control {
    state: Mutex<ControlState>,
    wake: Condvar,
    pub(crate) notifier: Notifier,
}

impl Control {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: Mutex::new(ControlState {
                status: Status::Ready,
                step_granted: false,
                trial: 0,
                tick: 0,
                started: None,
                elapsed: Duration::ZERO,
                delay,
                results: RunResults::default(),
            }),
            wake: Condvar::new(),
            notifier: Notifier::new(),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wake_worker(&self) {
        self.wake.notify_all();
    }

    pub fn emit(&self, notification: Notification) {
        self.notifier.emit(notification);
    }

    pub fn status(&self) -> Status {
        self.lock().status
    }

    pub(crate) fn set_progress(&self, trial: usize, tick: u32) {
        let mut state = self.lock();
        state.trial = trial;
        state.tick = tick;
    }

    pub(crate) fn with_results<T>(&self, f: impl FnOnce(&mut RunResults) -> T) -> T {
        f(&mut self.lock().results)
    }

    /// Block or sleep as the current status requires.
    ///
    /// Running sleeps for the playback delay, stepping consumes one step
    /// grant, and paused or stepping without a grant wait until a command
    /// arrives. A pending reset always aborts.
    pub fn checkpoint(&self) -> Flow {
        let mut state = self.lock();
        loop {
            match state.status {
                Status::Resetting => return Flow::Abort,
                Status::Running => {
                    if state.delay.is_zero() {
                        return Flow::Continue;
                    }
                    let delay = state.delay;
                    let (guard, _) = self
                        .wake
                        .wait_timeout(state, delay)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                    if state.status == Status::Running {
                        return Flow::Continue;
                    }
                }
                Status::Stepping if state.step_granted => {
                    state.step_granted = false;
                    return Flow::Continue;
                }
                Status::Stepping | Status::Paused => {
                    self.notifier.emit(Notification::Stopped);
                    while is_suspended(&state) {
                        state = self
                            .wake
                            .wait(state)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    if state.status != Status::Resetting {
                        self.notifier.emit(Notification::Continued);
                    }
                }
                Status::Ready | Status::Completed => return Flow::Continue,
            }
        }
    }
}

fn is_suspended(state: &ControlState) -> bool {
    match state.status {
        Status::Paused => true,
        Status::Stepping => !state.step_granted,
        _ => false,
    }
}
