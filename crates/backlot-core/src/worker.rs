//! Worker group: the fixed set of pullers behind one execution context.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::notify::Notifier;
use crate::queue::DispatchQueue;

/// Handle to the workers of one execution context.
///
/// - Workers exit on their own once the queue closes and drains.
/// - The watch channel is the fallback stop signal for workers that are
///   still waiting past the drain grace period.
pub(crate) struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers pulling from `queue`. `label` names the context
    /// in logs.
    pub(crate) fn spawn(
        n: usize,
        label: &'static str,
        queue: Arc<DispatchQueue>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let queue = Arc::clone(&queue);
            let notifier = Arc::clone(&notifier);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, label, queue, notifier, &mut rx).await;
            });
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    /// Wait up to `grace` for all workers to drain and exit.
    ///
    /// In-flight bodies are never interrupted; past the grace period the
    /// stop signal is raised so lingering workers exit at their next
    /// checkpoint, and the handles are dropped (detached). Returns whether
    /// the drain completed in time.
    pub(crate) async fn drain(self, grace: Duration) -> bool {
        let Self { shutdown_tx, joins } = self;
        let join_all = async {
            for join in joins {
                let _ = join.await;
            }
        };
        match tokio::time::timeout(grace, join_all).await {
            Ok(()) => true,
            Err(_) => {
                let _ = shutdown_tx.send(true);
                false
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    label: &'static str,
    queue: Arc<DispatchQueue>,
    notifier: Arc<dyn Notifier>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // Waiting for work races against the stop signal; executing a
        // task does not (cancellation of the body is cooperative).
        let task = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            task = queue.pop() => task,
        };

        let Some(task) = task else {
            // Queue closed and drained.
            break;
        };

        debug!(context = label, worker = worker_id, task = %task.id(), "dispatching");
        task.run(&notifier).await;
    }
}
