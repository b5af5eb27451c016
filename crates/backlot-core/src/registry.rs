//! Registry of live task handles.
//!
//! One instance per scheduler; the UI reads it to render the active-tasks
//! view. Entries are added on submission and evicted once their terminal
//! state has been handed to a consumer at least once, so an observer never
//! misses a completion but the map does not grow without bound.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{SchedulerCounts, TaskId, TaskSnapshot};
use crate::task::TaskHandle;

struct RegistryEntry {
    handle: TaskHandle,
    /// Set once a `list`/`snapshots` call returned this entry in a
    /// terminal state; the next call evicts it.
    reported_terminal: bool,
}

#[derive(Default)]
struct RegistryInner {
    /// Submission order; holds ids only, entries are the source of truth.
    order: Vec<TaskId>,
    entries: HashMap<TaskId, RegistryEntry>,
}

/// Process-wide collection of handles for all non-terminal tasks.
#[derive(Default)]
pub struct TaskRegistry {
    inner: Mutex<RegistryInner>,
}

fn lock(mutex: &Mutex<RegistryInner>) -> MutexGuard<'_, RegistryInner> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, handle: TaskHandle) {
        let mut inner = lock(&self.inner);
        let id = handle.id();
        inner.order.push(id);
        inner.entries.insert(
            id,
            RegistryEntry {
                handle,
                reported_terminal: false,
            },
        );
    }

    /// Handles in submission order.
    ///
    /// Terminal tasks are returned one last time and evicted on the call
    /// after that, so every consumer poll sees each completion at least
    /// once.
    pub fn list(&self) -> Vec<TaskHandle> {
        let mut inner = lock(&self.inner);
        let RegistryInner { order, entries } = &mut *inner;

        let mut handles = Vec::with_capacity(order.len());
        order.retain(|id| {
            let evict = match entries.get_mut(id) {
                Some(entry) => {
                    let terminal = entry.handle.is_terminal();
                    if terminal && entry.reported_terminal {
                        true
                    } else {
                        if terminal {
                            entry.reported_terminal = true;
                        }
                        handles.push(entry.handle.clone());
                        false
                    }
                }
                None => true,
            };
            if evict {
                entries.remove(id);
            }
            !evict
        });
        handles
    }

    /// Serializable snapshots in submission order, same eviction policy
    /// as [`list`](Self::list).
    pub fn snapshots(&self) -> Vec<TaskSnapshot> {
        self.list().iter().map(TaskHandle::snapshot).collect()
    }

    /// Counts by state over everything currently registered. Read-only;
    /// does not advance eviction.
    pub fn counts(&self) -> SchedulerCounts {
        let inner = lock(&self.inner);
        let mut counts = SchedulerCounts::default();
        for entry in inner.entries.values() {
            counts.record(entry.handle.state());
        }
        counts
    }

    /// Request cancellation of every registered task. Used at shutdown.
    pub fn cancel_all(&self) {
        let inner = lock(&self.inner);
        for entry in inner.entries.values() {
            if !entry.handle.is_terminal() {
                entry.handle.request_cancel();
            }
        }
    }

    /// Number of registered tasks, terminal-but-unobserved included.
    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
