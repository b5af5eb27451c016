//! Task: the atomic, cancellable, progress-reporting unit of work.
//!
//! A `Task` pairs immutable identity (id, name, category, total work) with
//! a collaborator-supplied async body. The body receives a [`TaskContext`]
//! for progress publishing and cooperative cancellation; the run wrapper
//! owns every state transition and converts body errors and panics into a
//! terminal state, so a buggy task can never poison its worker.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{TaskCategory, TaskId, TaskSnapshot, TaskState};
use crate::error::TaskError;
use crate::notify::Notifier;

/// Boxed future returned by a task body.
pub type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'static>>;

type TaskBody = Box<dyn FnOnce(TaskContext) -> BoxTaskFuture + Send + 'static>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Lifecycle transitions never panic while holding the lock, so a
    // poisoned mutex still carries a consistent value.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mutable lifecycle fields, guarded by one lock.
#[derive(Debug)]
struct Lifecycle {
    state: TaskState,
    error: Option<String>,
    updated_at: Instant,
}

/// State shared between the task, its handles, and its context.
#[derive(Debug)]
struct TaskShared {
    id: TaskId,
    name: String,
    category: TaskCategory,
    total: usize,
    lifecycle: Mutex<Lifecycle>,
    completed: AtomicUsize,
    cancel: CancellationToken,
    created_at: Instant,
}

impl TaskShared {
    fn new(name: String, category: TaskCategory, total: usize) -> Self {
        let now = Instant::now();
        Self {
            id: TaskId::generate(),
            name,
            category,
            total,
            lifecycle: Mutex::new(Lifecycle {
                state: TaskState::Created,
                error: None,
                updated_at: now,
            }),
            completed: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
            created_at: now,
        }
    }

    fn state(&self) -> TaskState {
        lock(&self.lifecycle).state
    }

    /// Created -> Queued, on submission.
    fn mark_queued(&self) {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.state == TaskState::Created {
            lifecycle.state = TaskState::Queued;
            lifecycle.updated_at = Instant::now();
        }
    }

    /// Queued -> Running, unless cancel was requested first.
    ///
    /// Returns false when the task must not run; the caller marks it
    /// Cancelled instead. This is what lets queued tasks be cancelled
    /// without side effects.
    fn try_start(&self) -> bool {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.state != TaskState::Queued || self.cancel.is_cancelled() {
            return false;
        }
        lifecycle.state = TaskState::Running;
        lifecycle.updated_at = Instant::now();
        true
    }

    fn finish(&self, state: TaskState, error: Option<String>) {
        debug_assert!(state.is_terminal());
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.state.is_terminal() {
            return;
        }
        lifecycle.state = state;
        lifecycle.error = error;
        lifecycle.updated_at = Instant::now();
    }

    /// Monotonic progress update; decreases are a no-op, and values are
    /// clamped to `total` when total is known.
    fn publish(&self, completed: usize) {
        if lock(&self.lifecycle).state != TaskState::Running {
            return;
        }
        let value = if self.total > 0 {
            completed.min(self.total)
        } else {
            completed
        };
        self.completed.fetch_max(value, Ordering::Relaxed);
    }

    fn progress(&self) -> (usize, usize) {
        (self.completed.load(Ordering::Relaxed), self.total)
    }

    fn snapshot(&self) -> TaskSnapshot {
        let (state, error) = {
            let lifecycle = lock(&self.lifecycle);
            (lifecycle.state, lifecycle.error.clone())
        };
        let (completed, total) = self.progress();
        TaskSnapshot {
            id: self.id,
            name: self.name.clone(),
            category: self.category,
            state,
            completed,
            total,
            error,
            age_ms: self.created_at.elapsed().as_millis() as u64,
        }
    }
}

/// Handed to the body: progress publishing plus the cancel token.
///
/// Cheap to clone; clones share the owning task's state.
#[derive(Clone)]
pub struct TaskContext {
    shared: Arc<TaskShared>,
}

impl TaskContext {
    /// Publish the number of completed work units. Only effective while
    /// the task is `Running`; decreases are ignored.
    pub fn publish_progress(&self, completed: usize) {
        self.shared.publish(completed);
    }

    /// Poll the cooperative cancel flag. Bodies should check this at
    /// iteration boundaries (e.g. once per library item).
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Completes when cancellation is requested; for use in `select!`
    /// around blocking awaits.
    pub async fn cancelled(&self) {
        self.shared.cancel.cancelled().await;
    }

    /// The task's cancel token, for handing to nested operations.
    pub fn cancel_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Total work units declared at construction (0 = indeterminate).
    pub fn total(&self) -> usize {
        self.shared.total
    }
}

/// Live, observe-only view of a task. The only mutation it allows is
/// `request_cancel`.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    shared: Arc<TaskShared>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn category(&self) -> TaskCategory {
        self.shared.category
    }

    pub fn state(&self) -> TaskState {
        self.shared.state()
    }

    /// `(completed, total)`; total 0 means indeterminate.
    pub fn progress(&self) -> (usize, usize) {
        self.shared.progress()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Flip the cooperative cancel flag. Idempotent; never interrupts a
    /// blocked call.
    pub fn request_cancel(&self) {
        self.shared.cancel.cancel();
    }

    /// Whether cancellation has been requested. The state only moves to
    /// `Cancelled` once the body honours the request.
    pub fn is_cancel_requested(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Serializable point-in-time view for display.
    pub fn snapshot(&self) -> TaskSnapshot {
        self.shared.snapshot()
    }
}

/// A unit of background work: identity plus a one-shot async body.
pub struct Task {
    shared: Arc<TaskShared>,
    body: TaskBody,
}

impl Task {
    /// Construct a task in state `Created`. `total` of 0 means the task
    /// cannot estimate its work up front (indeterminate progress).
    pub fn new<F, Fut>(
        name: impl Into<String>,
        category: TaskCategory,
        total: usize,
        body: F,
    ) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            shared: Arc::new(TaskShared::new(name.into(), category, total)),
            body: Box::new(move |ctx| Box::pin(body(ctx)) as BoxTaskFuture),
        }
    }

    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn category(&self) -> TaskCategory {
        self.shared.category
    }

    /// A live handle observers can hold after the task itself is consumed.
    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Transition to `Queued`. Called by the scheduler on submission.
    pub(crate) fn mark_queued(&self) {
        self.shared.mark_queued();
    }

    /// Settle a task that will never run (late submission after the
    /// scheduler closed its queues). The handle reads Cancelled so an
    /// observer is not left polling forever.
    pub(crate) fn discard(self) {
        self.shared.cancel.cancel();
        self.shared.finish(TaskState::Cancelled, None);
    }

    /// Template method invoked by a worker. Runs the body and settles the
    /// task into exactly one terminal state. Errors and panics stop here;
    /// the worker slot stays usable for the next task.
    pub(crate) async fn run(self, notifier: &Arc<dyn Notifier>) {
        let shared = self.shared;

        if !shared.try_start() {
            // Cancelled while queued: the body never runs.
            shared.finish(TaskState::Cancelled, None);
            debug!(task = %shared.id, name = %shared.name, "cancelled before start");
            return;
        }

        let ctx = TaskContext {
            shared: Arc::clone(&shared),
        };
        let body = self.body;

        // The body runs as its own tokio task so a panic is contained in
        // its JoinHandle instead of unwinding through the worker loop.
        let result = match tokio::spawn((body)(ctx)).await {
            Ok(result) => result,
            Err(join_error) => Err(TaskError::failed(format!("task body panicked: {join_error}"))),
        };

        match result {
            Ok(()) if shared.cancel.is_cancelled() => {
                // The body saw the flag and returned early; that is a
                // cancellation, not a completion.
                shared.finish(TaskState::Cancelled, None);
                debug!(task = %shared.id, name = %shared.name, "cancelled");
            }
            Ok(()) => {
                shared.finish(TaskState::Done, None);
            }
            Err(TaskError::Cancelled) => {
                shared.finish(TaskState::Cancelled, None);
                debug!(task = %shared.id, name = %shared.name, "cancelled");
            }
            Err(error) => {
                let message = error.to_string();
                shared.finish(TaskState::Failed, Some(message.clone()));
                warn!(task = %shared.id, name = %shared.name, error = %message, "task failed");
                notifier.task_failed(&shared.snapshot()).await;
            }
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("category", &self.shared.category)
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use std::sync::atomic::AtomicBool;

    fn notifier() -> Arc<dyn Notifier> {
        Arc::new(LogNotifier)
    }

    fn submit(task: &Task) {
        task.mark_queued();
    }

    #[tokio::test]
    async fn body_returning_ok_ends_done() {
        let task = Task::new("noop", TaskCategory::Background, 0, |_ctx| async { Ok(()) });
        let handle = task.handle();
        submit(&task);

        task.run(&notifier()).await;

        assert_eq!(handle.state(), TaskState::Done);
        assert!(handle.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn body_error_ends_failed_with_message() {
        let task = Task::new("scrape", TaskCategory::Background, 0, |_ctx| async {
            Err(TaskError::failed("movie not found"))
        });
        let handle = task.handle();
        submit(&task);

        task.run(&notifier()).await;

        assert_eq!(handle.state(), TaskState::Failed);
        assert_eq!(handle.snapshot().error.as_deref(), Some("movie not found"));
    }

    #[tokio::test]
    async fn body_panic_ends_failed() {
        let task = Task::new("buggy", TaskCategory::Background, 0, |_ctx| async {
            panic!("boom");
        });
        let handle = task.handle();
        submit(&task);

        task.run(&notifier()).await;

        assert_eq!(handle.state(), TaskState::Failed);
        assert!(handle.snapshot().error.unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn cancel_observed_then_normal_return_is_cancelled() {
        let task = Task::new("loop", TaskCategory::Background, 10, |ctx| async move {
            for done in 0..10 {
                if ctx.is_cancelled() {
                    return Ok(()); // cooperative early exit
                }
                if done == 3 {
                    ctx.cancel_token().cancel();
                }
                ctx.publish_progress(done + 1);
            }
            Ok(())
        });
        let handle = task.handle();
        submit(&task);

        task.run(&notifier()).await;

        assert_eq!(handle.state(), TaskState::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_error_is_not_a_failure() {
        let task = Task::new("early-out", TaskCategory::Download, 0, |_ctx| async {
            Err(TaskError::Cancelled)
        });
        let handle = task.handle();
        submit(&task);

        task.run(&notifier()).await;

        assert_eq!(handle.state(), TaskState::Cancelled);
        assert!(handle.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn cancel_while_queued_skips_body() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_flag = Arc::clone(&ran);
        let task = Task::new("queued", TaskCategory::Main, 0, move |_ctx| async move {
            ran_flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        let handle = task.handle();
        submit(&task);

        handle.request_cancel();
        task.run(&notifier()).await;

        assert_eq!(handle.state(), TaskState::Cancelled);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_clamped() {
        let task = Task::new("progress", TaskCategory::Background, 5, |ctx| async move {
            ctx.publish_progress(3);
            ctx.publish_progress(1); // decrease: ignored
            assert_eq!(ctx.total(), 5);
            ctx.publish_progress(99); // clamped to total
            Ok(())
        });
        let handle = task.handle();
        submit(&task);

        task.run(&notifier()).await;

        assert_eq!(handle.progress(), (5, 5));
    }

    #[test]
    fn new_task_starts_created() {
        let task = Task::new("idle", TaskCategory::Background, 4, |_ctx| async { Ok(()) });
        let handle = task.handle();

        assert_eq!(handle.state(), TaskState::Created);
        assert_eq!(handle.progress(), (0, 4));
    }

    #[test]
    fn request_cancel_is_idempotent() {
        let task = Task::new("twice", TaskCategory::Main, 0, |_ctx| async { Ok(()) });
        let handle = task.handle();

        handle.request_cancel();
        handle.request_cancel();

        assert!(task.shared.cancel.is_cancelled());
    }
}
