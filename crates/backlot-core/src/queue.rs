//! FIFO dispatch queue feeding one execution context.
//!
//! Unbounded on purpose: submissions come from UI actions that must never
//! block or fail visibly, so work queues instead of being rejected.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};

use crate::task::Task;

struct QueueState {
    ready: VecDeque<Task>,
    closed: bool,
}

/// Mutex + Notify hand-off between submitters and workers.
///
/// Design:
/// - `push` never waits on a worker; it appends and notifies.
/// - `pop` waits until a task is ready, or returns None once the queue is
///   closed and drained. That None is the workers' drain signal, an
///   explicit completion event rather than a timing assumption.
pub(crate) struct DispatchQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl DispatchQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                ready: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Append a task. After `close`, late submissions are dropped; their
    /// handles settle as Cancelled so observers are not left hanging.
    pub(crate) async fn push(&self, task: Task) {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                drop(state);
                task.discard();
                return;
            }
            state.ready.push_back(task);
        }
        self.notify.notify_one();
    }

    /// Take the next task in FIFO order; None means closed and drained.
    pub(crate) async fn pop(&self) -> Option<Task> {
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(task) = state.ready.pop_front() {
                    return Some(task);
                }
                if state.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Stop accepting work and wake every idle worker so it can observe
    /// the drain.
    pub(crate) async fn close(&self) {
        {
            let mut state = self.state.lock().await;
            state.closed = true;
        }
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskCategory, TaskState};
    use crate::task::Task;

    fn named_task(name: &str) -> Task {
        Task::new(name, TaskCategory::Main, 0, |_ctx| async { Ok(()) })
    }

    #[tokio::test]
    async fn pop_returns_fifo_order() {
        let queue = DispatchQueue::new();
        for name in ["a", "b", "c"] {
            queue.push(named_task(name)).await;
        }

        assert_eq!(queue.pop().await.unwrap().name(), "a");
        assert_eq!(queue.pop().await.unwrap().name(), "b");
        assert_eq!(queue.pop().await.unwrap().name(), "c");
    }

    #[tokio::test]
    async fn pop_drains_then_signals_close() {
        let queue = DispatchQueue::new();
        queue.push(named_task("last")).await;
        queue.close().await;

        assert!(queue.pop().await.is_some());
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn pop_wakes_on_push() {
        let queue = std::sync::Arc::new(DispatchQueue::new());
        let waiter = {
            let queue = std::sync::Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await.map(|t| t.name().to_string()) })
        };

        queue.push(named_task("woken")).await;

        assert_eq!(waiter.await.unwrap().as_deref(), Some("woken"));
    }

    #[tokio::test]
    async fn push_after_close_settles_task_cancelled() {
        let queue = DispatchQueue::new();
        queue.close().await;

        let task = named_task("late");
        task.mark_queued();
        let handle = task.handle();
        queue.push(task).await;

        assert_eq!(handle.state(), TaskState::Cancelled);
        // The dropped task never reached the queue.
        assert!(queue.pop().await.is_none());
    }
}
