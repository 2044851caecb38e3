//! Error types for the process queue.
//!
//! Provides a hierarchy of error types using `thiserror` for ergonomic error handling.

use std::any::Any;
use thiserror::Error;

/// Failure of a single queued task.
///
/// The queue never inspects or retries these. Each one is forwarded to the
/// `on_error` callback of the task that produced it.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The task's future resolved to an error
    #[error("Task failed: {0:#}")]
    Failed(anyhow::Error),

    /// The task panicked while starting or while running
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The task was dropped by `clear()` before it started
    #[error("Task cancelled before it started")]
    Cancelled,
}

impl TaskError {
    /// Builds a `Panicked` error from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::Panicked(panic_message(payload.as_ref()))
    }

    pub fn failed<T: Into<String>>(msg: T) -> Self {
        Self::Failed(anyhow::anyhow!(msg.into()))
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

/// Main error type for queue construction and configuration.
#[derive(Error, Debug)]
pub enum QueueError {
    /// Concurrency cap must be a positive integer
    #[error("Invalid concurrency limit: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    /// No tokio runtime was available to run tasks on
    #[error("No tokio runtime available: queues must be created inside a runtime")]
    NoRuntime,

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("IO error: {0}")]
    IO(String),

    /// Configuration could not be parsed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

impl QueueError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(err)
    }
}

impl From<std::io::Error> for QueueError {
    fn from(err: std::io::Error) -> Self {
        Self::IO(err.to_string())
    }
}

impl From<tokio::runtime::TryCurrentError> for QueueError {
    fn from(_: tokio::runtime::TryCurrentError) -> Self {
        Self::NoRuntime
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
