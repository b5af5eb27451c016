//! Failure notification port.
//!
//! The scheduler reports each failed task exactly once through this seam.
//! The application wires its message bus here; the default implementation
//! just writes through `tracing`.

use async_trait::async_trait;
use tracing::warn;

use crate::domain::TaskSnapshot;

/// One-way sink for user-facing task failure messages.
///
/// Design:
/// - Called from worker threads, so implementations must be `Send + Sync`.
/// - Called at most once per task, after the state reached `Failed`.
/// - Not called for `Cancelled` tasks; cancellation is not an error.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn task_failed(&self, snapshot: &TaskSnapshot);
}

/// Default sink: logs the failure and nothing else.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn task_failed(&self, snapshot: &TaskSnapshot) {
        warn!(
            task = %snapshot.id,
            name = %snapshot.name,
            error = snapshot.error.as_deref().unwrap_or("unknown"),
            "task failed"
        );
    }
}
