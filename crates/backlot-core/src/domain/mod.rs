//! Domain model (IDs, categories, states, display views).

mod category;
mod ids;
mod snapshot;
mod state;

pub use category::TaskCategory;
pub use ids::TaskId;
pub use snapshot::{SchedulerCounts, TaskSnapshot};
pub use state::TaskState;
