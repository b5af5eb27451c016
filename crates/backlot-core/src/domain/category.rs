//! Task categories: which execution context owns a task.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution context a task is routed to. Set at construction, immutable.
///
/// The split exists for resource isolation:
/// - `Main` serializes operations that structurally mutate the library.
/// - `Background` runs independent metadata work with bounded parallelism.
/// - `Download` is a separate bounded pool so a burst of downloads cannot
///   starve background work, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Main,
    Background,
    Download,
}

impl TaskCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskCategory::Main => "main",
            TaskCategory::Background => "background",
            TaskCategory::Download => "download",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
