//! Task data model and the `tasks.json` store.

pub mod model;
pub mod store;

pub use model::{Priority, Subtask, Task, TaskFile, TaskFileMeta, TaskStatus, validate_dependencies};
pub use store::TaskStore;
