//! Serializable display views over live task state.
//!
//! These are the shapes handed to the UI layer (active-tasks panel, status
//! bar). They carry no control methods; `TaskHandle` is the live object.

use serde::{Deserialize, Serialize};

use super::{TaskCategory, TaskId, TaskState};

/// Point-in-time view of one task, safe to serialize and ship to a view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub category: TaskCategory,
    pub state: TaskState,

    /// Work units finished so far.
    pub completed: usize,

    /// Total work units; 0 means indeterminate progress.
    pub total: usize,

    /// Populated only when `state == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Milliseconds since the task was constructed.
    pub age_ms: u64,
}

impl TaskSnapshot {
    /// Fraction in `[0.0, 1.0]`, or `None` for indeterminate tasks.
    pub fn fraction(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.completed as f64 / self.total as f64)
        }
    }
}

/// Registry-wide counts by state, for a one-line status readout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerCounts {
    pub queued: usize,
    pub running: usize,
    pub done: usize,
    pub cancelled: usize,
    pub failed: usize,
}

impl SchedulerCounts {
    pub fn record(&mut self, state: TaskState) {
        match state {
            TaskState::Created | TaskState::Queued => self.queued += 1,
            TaskState::Running => self.running += 1,
            TaskState::Done => self.done += 1,
            TaskState::Cancelled => self.cancelled += 1,
            TaskState::Failed => self.failed += 1,
        }
    }

    /// Tasks that have not yet reached a terminal state.
    pub fn active(&self) -> usize {
        self.queued + self.running
    }
}
