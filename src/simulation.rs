use crate::config::Scenario;
use crate::control::{Control, ControlState, Status};
use crate::data::{EndReason, RunResults};
use crate::engine::Engine;
use crate::error::SimError;
use crate::notify::Notification;
use anyhow::{Context, Result, anyhow};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct Simulation {
    scenario: Arc<Scenario>,
    control: Arc<Control>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Simulation {
    pub fn new(scenario: Scenario) -> Result<Self> {
        scenario.validate().context("invalid scenario")?;
        let delay = Duration::from_millis(scenario.delay_ms);
        Ok(Self {
            scenario: Arc::new(scenario),
            control: Arc::new(Control::new(delay)),
            worker: Mutex::new(None),
        })
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn subscribe(&self) -> Receiver<Notification> {
        self.control.notifier.subscribe()
    }

    /// Start a run from ready or completed, or resume a suspended one.
    pub fn run(&self) {
        let mut state = self.control.lock();
        let status = state.status;
        match status {
            Status::Ready | Status::Completed => {
                start(&mut state, Status::Running);
                drop(state);
                self.spawn();
            }
            Status::Stepping | Status::Paused => {
                state.status = Status::Running;
                self.control.wake_worker();
            }
            _ => self.reject("run", status),
        }
    }

    /// Run exactly one more tick, then suspend.
    pub fn step(&self) {
        let mut state = self.control.lock();
        let status = state.status;
        match status {
            Status::Ready | Status::Completed => {
                start(&mut state, Status::Stepping);
                drop(state);
                self.spawn();
            }
            Status::Stepping | Status::Paused => {
                state.status = Status::Stepping;
                state.step_granted = true;
                self.control.wake_worker();
            }
            _ => self.reject("step", status),
        }
    }

    /// Suspend a running simulation, or resume a paused one.
    pub fn pause(&self) {
        let mut state = self.control.lock();
        let status = state.status;
        match status {
            Status::Running => state.status = Status::Paused,
            Status::Paused => {
                state.status = Status::Running;
                self.control.wake_worker();
            }
            _ => self.reject("pause", status),
        }
    }

    /// Discard the run and return to ready.
    ///
    /// An active run is only torn down at its next suspension point; a
    /// completed one is cleared at once.
    pub fn reset(&self) {
        let mut state = self.control.lock();
        let status = state.status;
        match status {
            Status::Completed => {
                self.control.emit(Notification::PreReset);
                clear(&mut state);
                state.status = Status::Ready;
                self.control.emit(Notification::ResetComplete);
            }
            Status::Running | Status::Stepping | Status::Paused => {
                self.control.emit(Notification::PreReset);
                state.status = Status::Resetting;
                self.control.wake_worker();
            }
            _ => self.reject("reset", status),
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        self.control.lock().delay = delay;
        self.control.wake_worker();
    }

    pub fn status(&self) -> Status {
        self.control.status()
    }

    pub fn trial(&self) -> usize {
        self.control.lock().trial
    }

    pub fn tick(&self) -> u32 {
        self.control.lock().tick
    }

    /// Wall time of the current or last run.
    pub fn elapsed(&self) -> Duration {
        let state = self.control.lock();
        match state.started {
            Some(started) if state.status != Status::Completed => started.elapsed(),
            _ => state.elapsed,
        }
    }

    /// Copy of the results gathered so far.
    pub fn results(&self) -> RunResults {
        self.control.lock().results.clone()
    }

    /// Block until the worker thread exits.
    pub fn wait(&self) -> Result<()> {
        let handle = self.lock_worker().take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| anyhow!("simulation worker panicked"))?;
        }
        Ok(())
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report a command that is invalid in `status`, leaving it unchanged.
    fn reject(&self, command: &'static str, status: Status) {
        let error = SimError::InvalidCommand {
            command,
            status: status.name(),
        };
        log::warn!("{error}");
        self.control.emit(Notification::Error {
            message: error.to_string(),
        });
    }

    /// Spawn the worker of a run whose status was already set.
    fn spawn(&self) {
        let mut worker = self.lock_worker();
        // A previous worker has already reported completion and is exiting.
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                log::error!("previous simulation worker panicked");
            }
        }

        let scenario = Arc::clone(&self.scenario);
        let control = Arc::clone(&self.control);
        let spawned = thread::Builder::new()
            .name("stisim-worker".into())
            .spawn(move || run_worker(scenario, control));
        match spawned {
            Ok(handle) => *worker = Some(handle),
            Err(error) => {
                let message = format!("failed to spawn simulation worker: {error}");
                log::error!("{message}");
                self.control.lock().status = Status::Completed;
                self.control.emit(Notification::Error { message });
            }
        }
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        {
            let mut state = self.control.lock();
            if state.status.is_active() {
                state.status = Status::Resetting;
            }
        }
        self.control.wake_worker();
        if let Err(error) = self.wait() {
            log::error!("{error:#}");
        }
    }
}

fn start(state: &mut ControlState, status: Status) {
    clear(state);
    state.status = status;
    state.step_granted = status == Status::Stepping;
    state.started = Some(Instant::now());
}

fn clear(state: &mut ControlState) {
    state.results.clear();
    state.trial = 0;
    state.tick = 0;
    state.step_granted = false;
    state.started = None;
    state.elapsed = Duration::ZERO;
}

fn run_worker(scenario: Arc<Scenario>, control: Arc<Control>) {
    control.emit(Notification::RunStart);
    log::info!("starting run of {:?}", scenario.name);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        Engine::new(scenario, Arc::clone(&control))
            .context("failed to construct engine")
            .and_then(|mut engine| engine.run())
    }))
    .unwrap_or_else(|payload| {
        Err(anyhow!("simulation worker panicked: {}", panic_message(&*payload)))
    });
    let reason = match outcome {
        Ok(reason) => reason,
        Err(error) => {
            log::error!("{error:#}");
            control.emit(Notification::Error {
                message: format!("{error:#}"),
            });
            EndReason::Error
        }
    };

    let mut state = control.lock();
    if reason == EndReason::Aborted || state.status == Status::Resetting {
        clear(&mut state);
        state.status = Status::Ready;
        drop(state);
        log::info!("run reset");
        control.emit(Notification::RunEnd {
            reason: EndReason::Aborted,
        });
        control.emit(Notification::ResetComplete);
        return;
    }

    if let Some(started) = state.started {
        state.elapsed = started.elapsed();
    }
    state.status = Status::Completed;
    drop(state);
    log::info!("run ended ({reason})");
    control.emit(Notification::RunEnd { reason });
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown cause"
    }
}
