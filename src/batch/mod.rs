mod config;
mod tracker;

pub use config::{QueueConfig, ToolKind};
pub use tracker::BatchTracker;
