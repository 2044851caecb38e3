// Module declarations in dependency order
pub mod utils;
pub mod core;
pub mod batch;
pub mod queue;

// Public exports for external consumers
pub use crate::core::{ProcessingStatus, Progress, ProgressType, Task};
pub use batch::{BatchTracker, QueueConfig, ToolKind};
pub use queue::{ProcessQueue, TaskHandle};
pub use utils::{QueueError, QueueResult, TaskError};

/// Creates an image processing queue that admits at most `max_concurrent` tasks at once.
pub fn create_image_processing_queue<R: Send + 'static>(max_concurrent: usize) -> QueueResult<ProcessQueue<R>> {
    ProcessQueue::new(max_concurrent)
}
