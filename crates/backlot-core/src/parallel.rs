//! ParallelTask: many same-shaped work items inside one task.
//!
//! This is the batch pattern behind "do X for each selected movie": fan
//! the items across a small internal pool, keep going past per-item
//! errors, honour cancellation between items, and present one aggregate
//! progress value and one terminal state to the scheduler.
//!
//! Composition, not inheritance: a `ParallelTask` builds an ordinary
//! [`Task`] whose body owns the fan-out.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::TaskCategory;
use crate::error::TaskError;
use crate::task::{BoxTaskFuture, Task, TaskContext};

/// Terminal outcome of one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Succeeded,
    Failed(String),
    /// The task was cancelled before this item started, or the item
    /// honoured the cancel token mid-flight.
    Skipped,
}

type PerItemFn<I> = Arc<dyn Fn(I, TaskContext) -> BoxTaskFuture + Send + Sync>;

/// Builder for a bounded fan-out over a fixed item collection.
///
/// Item order is the default assignment order, not a correctness
/// guarantee. The item count is fixed at construction and becomes the
/// outer task's progress total.
pub struct ParallelTask<I> {
    name: String,
    category: TaskCategory,
    items: Vec<I>,
    pool_size: usize,
    per_item: PerItemFn<I>,
}

impl<I: Send + 'static> ParallelTask<I> {
    /// `pool_size` bounds how many items run at once, independently of
    /// the scheduler's own pools; it is clamped to `1..=items.len()`.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        category: TaskCategory,
        items: Vec<I>,
        pool_size: usize,
        per_item: F,
    ) -> Self
    where
        F: Fn(I, TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            category,
            items,
            pool_size,
            per_item: Arc::new(move |item, ctx| Box::pin(per_item(item, ctx)) as BoxTaskFuture),
        }
    }

    /// Like [`new`](Self::new) with the pool sized from the machine's
    /// available parallelism.
    pub fn with_auto_pool<F, Fut>(
        name: impl Into<String>,
        category: TaskCategory,
        items: Vec<I>,
        per_item: F,
    ) -> Self
    where
        F: Fn(I, TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let pool_size = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self::new(name, category, items, pool_size, per_item)
    }

    /// Build the submittable task. The body joins every dispatched item
    /// before settling, so the outer task is terminal only once all item
    /// outcomes are in.
    pub fn into_task(self) -> Task {
        let Self {
            name,
            category,
            items,
            pool_size,
            per_item,
        } = self;
        let total = items.len();
        Task::new(name, category, total, move |ctx| async move {
            fan_out(items, pool_size, per_item, ctx).await
        })
    }
}

async fn fan_out<I: Send + 'static>(
    items: Vec<I>,
    pool_size: usize,
    per_item: PerItemFn<I>,
    ctx: TaskContext,
) -> Result<(), TaskError> {
    let total = items.len();
    if total == 0 {
        return Ok(());
    }
    let pool_size = pool_size.clamp(1, total);

    let work = Arc::new(Mutex::new(VecDeque::from(items)));
    let outcomes = Arc::new(Mutex::new(Vec::with_capacity(total)));

    let mut joins = Vec::with_capacity(pool_size);
    for _ in 0..pool_size {
        let work = Arc::clone(&work);
        let outcomes = Arc::clone(&outcomes);
        let per_item = Arc::clone(&per_item);
        let ctx = ctx.clone();

        joins.push(tokio::spawn(async move {
            loop {
                // Checked before each dispatch: once cancel is requested
                // no further items start. In-flight items finish
                // cooperatively; nothing is forcibly stopped.
                if ctx.is_cancelled() {
                    break;
                }
                let item = { work.lock().await.pop_front() };
                let Some(item) = item else {
                    break;
                };

                // Each item gets its own tokio task so a panicking item
                // is recorded as Failed instead of taking the fan-out
                // worker down with it.
                let outcome = match tokio::spawn(per_item(item, ctx.clone())).await {
                    Ok(Ok(())) => ItemOutcome::Succeeded,
                    Ok(Err(TaskError::Cancelled)) => ItemOutcome::Skipped,
                    Ok(Err(error)) => ItemOutcome::Failed(error.to_string()),
                    Err(join_error) => ItemOutcome::Failed(format!("item panicked: {join_error}")),
                };

                let done = {
                    let mut outcomes = outcomes.lock().await;
                    outcomes.push(outcome);
                    outcomes.len()
                };
                ctx.publish_progress(done);
            }
        }));
    }

    for join in joins {
        let _ = join.await;
    }

    // Items never dispatched reach their terminal outcome here.
    let leftovers = work.lock().await.len();
    let mut outcomes = outcomes.lock().await;
    for _ in 0..leftovers {
        outcomes.push(ItemOutcome::Skipped);
    }
    ctx.publish_progress(outcomes.len());

    summarize(&outcomes, total)
}

/// Map the per-item outcomes onto the outer task's terminal state:
/// any Skipped -> Cancelled, else any Failed -> Failed with an aggregate
/// summary, else Done.
fn summarize(outcomes: &[ItemOutcome], total: usize) -> Result<(), TaskError> {
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, ItemOutcome::Skipped))
        .count();
    if skipped > 0 {
        return Err(TaskError::Cancelled);
    }

    let failures: Vec<&str> = outcomes
        .iter()
        .filter_map(|o| match o {
            ItemOutcome::Failed(message) => Some(message.as_str()),
            _ => None,
        })
        .collect();
    if failures.is_empty() {
        return Ok(());
    }
    Err(TaskError::failed(format!(
        "{} of {} items failed: {}",
        failures.len(),
        total,
        failures.join("; ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskState;
    use crate::notify::{LogNotifier, Notifier};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn notifier() -> Arc<dyn Notifier> {
        Arc::new(LogNotifier)
    }

    async fn run_to_end(task: Task) -> crate::task::TaskHandle {
        let handle = task.handle();
        task.mark_queued();
        task.run(&notifier()).await;
        handle
    }

    #[tokio::test]
    async fn all_items_succeeding_ends_done() {
        let processed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&processed);

        let task = ParallelTask::new(
            "refresh ratings",
            TaskCategory::Background,
            (0..12).collect::<Vec<u32>>(),
            4,
            move |_item, _ctx| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        )
        .into_task();

        let handle = run_to_end(task).await;

        assert_eq!(handle.state(), TaskState::Done);
        assert_eq!(handle.progress(), (12, 12));
        assert_eq!(processed.load(Ordering::SeqCst), 12);
    }

    #[tokio::test]
    async fn item_failures_are_collected_not_short_circuited() {
        let attempted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempted);

        let task = ParallelTask::new(
            "rewrite nfo",
            TaskCategory::Background,
            (0..6).collect::<Vec<u32>>(),
            2,
            move |item, _ctx| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if item % 3 == 2 {
                        Err(TaskError::failed(format!("item {item}: parse error")))
                    } else {
                        Ok(())
                    }
                }
            },
        )
        .into_task();

        let handle = run_to_end(task).await;

        // Every item was attempted despite the failures.
        assert_eq!(attempted.load(Ordering::SeqCst), 6);
        assert_eq!(handle.state(), TaskState::Failed);
        let error = handle.snapshot().error.unwrap();
        assert!(error.contains("2 of 6 items failed"));
        assert!(error.contains("parse error"));
    }

    #[tokio::test]
    async fn cancellation_skips_undispatched_items() {
        let succeeded = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&succeeded);

        let task = ParallelTask::new(
            "scrape library",
            TaskCategory::Background,
            (0..100).collect::<Vec<u32>>(),
            4,
            move |_item, ctx| {
                let counter = Arc::clone(&counter);
                async move {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    let done = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if done == 10 {
                        ctx.cancel_token().cancel();
                    }
                    Ok(())
                }
            },
        )
        .into_task();

        let handle = run_to_end(task).await;

        assert_eq!(handle.state(), TaskState::Cancelled);
        // Every item reached a terminal outcome, most of them Skipped.
        assert_eq!(handle.progress(), (100, 100));
        let ran = succeeded.load(Ordering::SeqCst);
        assert!(ran >= 10);
        assert!(ran <= 30, "cancel should stop dispatch quickly, ran {ran}");
    }

    #[tokio::test]
    async fn panicking_item_is_recorded_as_failure() {
        let task = ParallelTask::new(
            "thumbnails",
            TaskCategory::Background,
            vec![1u32, 2, 3],
            1,
            |item, _ctx| async move {
                if item == 2 {
                    panic!("decoder bug");
                }
                Ok(())
            },
        )
        .into_task();

        let handle = run_to_end(task).await;

        assert_eq!(handle.state(), TaskState::Failed);
        let error = handle.snapshot().error.unwrap();
        assert!(error.contains("1 of 3 items failed"));
        assert!(error.contains("panicked"));
    }

    #[tokio::test]
    async fn pool_size_bounds_item_concurrency() {
        let gauge = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (gauge_ref, peak_ref) = (Arc::clone(&gauge), Arc::clone(&peak));

        let task = ParallelTask::new(
            "artwork",
            TaskCategory::Download,
            (0..8).collect::<Vec<u32>>(),
            2,
            move |_item, _ctx| {
                let gauge = Arc::clone(&gauge_ref);
                let peak = Arc::clone(&peak_ref);
                async move {
                    let now = gauge.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    gauge.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        )
        .into_task();

        let handle = run_to_end(task).await;

        assert_eq!(handle.state(), TaskState::Done);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn empty_batch_completes_immediately() {
        let task = ParallelTask::new(
            "nothing selected",
            TaskCategory::Main,
            Vec::<u32>::new(),
            4,
            |_item, _ctx| async { Ok(()) },
        )
        .into_task();

        let handle = run_to_end(task).await;

        assert_eq!(handle.state(), TaskState::Done);
    }
}
