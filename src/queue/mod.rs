//! Concurrency-bounded task queue.

mod handle;
mod process_queue;

pub use handle::TaskHandle;
pub use process_queue::ProcessQueue;
