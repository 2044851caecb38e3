pub mod error;

pub use error::{QueueError, QueueResult, TaskError};
