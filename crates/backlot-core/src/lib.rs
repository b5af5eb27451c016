//! backlot-core
//!
//! Background task scheduler for the Backlot media-library manager.
//! Every long-running operation — scraping, renaming, NFO rewriting,
//! artwork/trailer/subtitle downloads, sync — is wrapped in a [`Task`]
//! and submitted here instead of running on the UI thread.
//!
//! Building blocks:
//! - **task**: the cancellable, progress-reporting unit of work, plus the
//!   live [`TaskHandle`] observers hold
//! - **parallel**: bounded fan-out of many same-shaped items in one task
//! - **registry**: the handle collection behind the active-tasks view
//! - **scheduler**: the three execution contexts (main / background /
//!   download) and the submission API
//! - **notify**: failure notification port
//! - **domain**: ids, categories, states, serializable display views
//!
//! Guarantees, in one place:
//! - main-context tasks start in submission order and never overlap
//! - background and download parallelism are independently bounded
//! - a body error or panic becomes that task's `Failed` state and nothing
//!   else; workers and sibling tasks are unaffected
//! - cancellation is cooperative; nothing is ever forcibly stopped

pub mod domain;
pub mod error;
pub mod notify;
pub mod parallel;
pub mod registry;
pub mod scheduler;
pub mod task;

mod queue;
mod worker;

pub use domain::{SchedulerCounts, TaskCategory, TaskId, TaskSnapshot, TaskState};
pub use error::TaskError;
pub use notify::{LogNotifier, Notifier};
pub use parallel::{ItemOutcome, ParallelTask};
pub use registry::TaskRegistry;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use task::{BoxTaskFuture, Task, TaskContext, TaskHandle};
