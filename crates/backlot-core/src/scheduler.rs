//! The task manager: one submission entry point, three execution contexts.
//!
//! - **main**: one worker, FIFO. Operations that structurally mutate the
//!   library (add/remove entities, batch rewrites) funnel through here;
//!   serialization replaces fine-grained locking.
//! - **background**: bounded pool for independent metadata work.
//! - **download**: separate bounded pool for network downloads, isolated
//!   so downloads and background work cannot starve each other.
//!
//! Submissions are non-blocking and never rejected; work queues instead.
//! One `Scheduler` is constructed at process start and passed to every
//! collaborator that submits work.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{SchedulerCounts, TaskCategory};
use crate::notify::{LogNotifier, Notifier};
use crate::queue::DispatchQueue;
use crate::registry::TaskRegistry;
use crate::task::{Task, TaskHandle};
use crate::worker::WorkerGroup;

/// Pool sizing, fixed at startup. The main context is always exactly one
/// worker; that is the whole point of it.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub background_workers: usize,
    pub download_workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            background_workers: 4,
            download_workers: 2,
        }
    }
}

/// One queue plus the workers pulling from it.
struct ExecutionContext {
    queue: Arc<DispatchQueue>,
    workers: WorkerGroup,
}

impl ExecutionContext {
    fn start(n: usize, label: &'static str, notifier: Arc<dyn Notifier>) -> Self {
        let queue = Arc::new(DispatchQueue::new());
        let workers = WorkerGroup::spawn(n, label, Arc::clone(&queue), notifier);
        Self { queue, workers }
    }

    async fn drain(self, grace: Duration) -> bool {
        self.queue.close().await;
        self.workers.drain(grace).await
    }
}

/// Process-wide background task scheduler.
pub struct Scheduler {
    registry: Arc<TaskRegistry>,
    main: ExecutionContext,
    background: ExecutionContext,
    download: ExecutionContext,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_notifier(config, Arc::new(LogNotifier))
    }

    /// Wire a custom failure sink (the application's message bus).
    pub fn with_notifier(config: SchedulerConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            registry: Arc::new(TaskRegistry::new()),
            main: ExecutionContext::start(1, "main", Arc::clone(&notifier)),
            background: ExecutionContext::start(
                config.background_workers.max(1),
                "background",
                Arc::clone(&notifier),
            ),
            download: ExecutionContext::start(
                config.download_workers.max(1),
                "download",
                notifier,
            ),
        }
    }

    /// Enqueue into the serial main context. Start order is submission
    /// order, and no two main tasks ever run concurrently.
    pub async fn add_main_task(&self, task: Task) -> TaskHandle {
        self.enqueue(&self.main, TaskCategory::Main, task).await
    }

    /// Enqueue into the bounded background pool. No ordering guarantee;
    /// submission order only breaks ties while the pool is saturated.
    pub async fn add_unnamed_task(&self, task: Task) -> TaskHandle {
        self.enqueue(&self.background, TaskCategory::Background, task)
            .await
    }

    /// Enqueue into the download pool.
    pub async fn add_download_task(&self, task: Task) -> TaskHandle {
        self.enqueue(&self.download, TaskCategory::Download, task)
            .await
    }

    /// Route on the task's declared category.
    pub async fn submit(&self, task: Task) -> TaskHandle {
        match task.category() {
            TaskCategory::Main => self.add_main_task(task).await,
            TaskCategory::Background => self.add_unnamed_task(task).await,
            TaskCategory::Download => self.add_download_task(task).await,
        }
    }

    async fn enqueue(
        &self,
        context: &ExecutionContext,
        expected: TaskCategory,
        task: Task,
    ) -> TaskHandle {
        debug_assert_eq!(task.category(), expected, "task routed to wrong context");
        task.mark_queued();
        let handle = task.handle();
        self.registry.insert(handle.clone());
        debug!(task = %handle.id(), name = %handle.name(), category = %handle.category(), "queued");
        context.queue.push(task).await;
        handle
    }

    /// Registry snapshot for the active-tasks view; safe for concurrent
    /// reads, submission order.
    pub fn list_tasks(&self) -> Vec<TaskHandle> {
        self.registry.list()
    }

    /// Counts by state for a one-line status readout.
    pub fn counts(&self) -> SchedulerCounts {
        self.registry.counts()
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Cancel every non-terminal task, then wait up to `grace` for the
    /// three contexts to drain. Used at application close.
    pub async fn shutdown(self, grace: Duration) {
        self.registry.cancel_all();
        let Self {
            main,
            background,
            download,
            ..
        } = self;
        let (main_ok, background_ok, download_ok) = tokio::join!(
            main.drain(grace),
            background.drain(grace),
            download.drain(grace),
        );
        if !(main_ok && background_ok && download_ok) {
            warn!("shutdown grace period elapsed with workers still busy");
        }
    }
}
