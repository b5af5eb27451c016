//! Task state machine.

use serde::{Deserialize, Serialize};

/// Task state.
///
/// State transitions:
/// - Created -> Queued -> Running -> Done
/// - Created -> Queued -> Running -> Failed (body returned an error or panicked)
/// - Created -> Queued -> Running -> Cancelled (body honoured the cancel token)
/// - Created -> Queued -> Cancelled (cancelled before a worker picked it up)
///
/// Terminal states are mutually exclusive and final: a terminal task never
/// re-enters `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Constructed but not yet submitted.
    Created,

    /// Submitted, waiting for a worker slot in its context.
    Queued,

    /// Currently executing on a worker.
    Running,

    /// Completed normally.
    Done,

    /// Cancel was requested and the task exited early (or never started).
    Cancelled,

    /// Body returned an error or panicked.
    Failed,
}

impl TaskState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Done | TaskState::Cancelled | TaskState::Failed
        )
    }

    /// Is this task still owned by the scheduler (waiting or executing)?
    pub fn is_active(self) -> bool {
        matches!(self, TaskState::Queued | TaskState::Running)
    }
}
