use thiserror::Error;

/// Error surfaced by a task body.
///
/// The run wrapper converts this into the task's terminal state; it never
/// propagates into the worker or the scheduler.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The body observed the cancel token and unwound early.
    #[error("task cancelled")]
    Cancelled,

    /// Recoverable work failure (network error, parse error, missing id, ...).
    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
