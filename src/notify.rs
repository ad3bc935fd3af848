use crate::data::EndReason;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

/// Milestones of a run, delivered synchronously from the worker thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    RunStart,
    RunEnd { reason: EndReason },
    TrialStart { trial: usize },
    TrialEnd { trial: usize, reason: EndReason },
    WarmUpStart { trial: usize },
    /// `completed` is false when the warm-up was aborted by a reset.
    WarmUpEnd { trial: usize, completed: bool },
    TickStart { trial: usize, tick: u32, label: String },
    TickEnd { trial: usize, tick: u32 },
    /// Good moment for a consumer to redraw.
    Animate,
    /// The worker blocked at a suspension point.
    Stopped,
    /// The worker resumed after [`Notification::Stopped`].
    Continued,
    PreReset,
    ResetComplete,
    /// Recoverable error, such as a command invalid for the current status.
    Error { message: String },
}

/// Observer list of notification channels.
///
/// Receivers that were dropped are pruned on the next emission.
#[derive(Debug, Default)]
pub struct Notifier {
    senders: Mutex<Vec<Sender<Notification>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<Notification> {
        let (sender, receiver) = mpsc::channel();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    pub fn emit(&self, notification: Notification) {
        log::trace!("{notification:?}");
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|sender| sender.send(notification.clone()).is_ok());
    }
}
