use thiserror::Error;

/// Errors caused by invalid arguments to samplers, containers and
/// probability helpers, or by commands issued in the wrong state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid sample size {requested} for a universe of {universe} items (max {max})")]
    InvalidSampleSize {
        requested: usize,
        universe: usize,
        max: usize,
    },

    #[error("invalid probability {0}")]
    InvalidProbability(f64),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("command {command} is not valid while {status}")]
    InvalidCommand {
        command: &'static str,
        status: &'static str,
    },
}

pub type SimResult<T> = Result<T, SimError>;
