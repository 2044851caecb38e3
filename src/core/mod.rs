//! Core types shared by the queue and its callers.
//!
//! - [`Task`]: one unit of work plus its outcome callbacks
//! - [`ProcessingStatus`]: active/waiting snapshot of a queue
//! - [`Progress`]: batch-level completion accounting

mod task;
mod progress;

pub use task::Task;
pub(crate) use task::TaskCallbacks;
pub use progress::{ProcessingStatus, Progress, ProgressType};
