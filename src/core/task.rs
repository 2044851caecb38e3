//! Queued task definition.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use futures::future::{BoxFuture, FutureExt};
use tracing::warn;
use crate::utils::TaskError;
use crate::utils::error::panic_message;

pub(crate) type ExecuteFn<R> = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<R>> + Send>;
type CompleteFn<R> = Box<dyn FnOnce(R) + Send>;
type ErrorFn = Box<dyn FnOnce(TaskError) + Send>;
type ProgressFn = Box<dyn FnMut(usize, usize) + Send>;

/// Log name for a task, falling back when no label was given.
fn display_label(label: &Option<String>) -> &str {
    label.as_deref().unwrap_or("<unnamed>")
}

/// A single unit of work for a [`ProcessQueue`](crate::queue::ProcessQueue).
///
/// Holds the deferred operation plus the three callbacks the queue reports
/// back through. Unset callbacks are no-ops.
pub struct Task<R> {
    pub(crate) label: Option<String>,
    pub(crate) execute: ExecuteFn<R>,
    pub(crate) callbacks: TaskCallbacks<R>,
}

impl<R: Send + 'static> Task<R> {
    /// Creates a task from a zero-argument operation.
    ///
    /// The operation is not called until the queue admits the task.
    pub fn new<F, Fut>(execute: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        Self {
            label: None,
            execute: Box::new(move || execute().boxed()),
            callbacks: TaskCallbacks::default(),
        }
    }

    /// Name used in log output, usually the file being processed.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Invoked once with the result if the task succeeds.
    pub fn on_complete(mut self, f: impl FnOnce(R) + Send + 'static) -> Self {
        self.callbacks.on_complete = Box::new(f);
        self
    }

    /// Invoked once with the failure if the task errors or panics.
    pub fn on_error(mut self, f: impl FnOnce(TaskError) + Send + 'static) -> Self {
        self.callbacks.on_error = Box::new(f);
        self
    }

    /// Invoked with `(active, waiting)` when this task starts and when it settles.
    pub fn on_progress(mut self, f: impl FnMut(usize, usize) + Send + 'static) -> Self {
        self.callbacks.on_progress = Box::new(f);
        self
    }

    pub fn label(&self) -> &str {
        display_label(&self.label)
    }

    pub(crate) fn into_parts(self) -> (ExecuteFn<R>, TaskCallbacks<R>) {
        let mut callbacks = self.callbacks;
        callbacks.label = self.label;
        (self.execute, callbacks)
    }
}

impl<R> std::fmt::Debug for Task<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("label", &self.label).finish_non_exhaustive()
    }
}

/// Outcome callbacks of an admitted task.
///
/// Callback panics are caught and logged here so a misbehaving caller can
/// never skip the queue's slot release.
pub(crate) struct TaskCallbacks<R> {
    pub(crate) label: Option<String>,
    pub(crate) on_complete: CompleteFn<R>,
    pub(crate) on_error: ErrorFn,
    pub(crate) on_progress: ProgressFn,
}

impl<R> Default for TaskCallbacks<R> {
    fn default() -> Self {
        Self {
            label: None,
            on_complete: Box::new(|_| {}),
            on_error: Box::new(|_| {}),
            on_progress: Box::new(|_, _| {}),
        }
    }
}

impl<R> TaskCallbacks<R> {
    pub(crate) fn label(&self) -> &str {
        display_label(&self.label)
    }

    pub(crate) fn progress(&mut self, active: usize, waiting: usize) {
        let on_progress = &mut self.on_progress;
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| on_progress(active, waiting))) {
            warn!(
                "on_progress callback panicked for task {}: {}",
                display_label(&self.label),
                panic_message(payload.as_ref())
            );
        }
    }

    /// Reports success. Consumes both outcome callbacks so neither can fire again.
    pub(crate) fn complete(&mut self, result: R) {
        let on_complete = std::mem::replace(&mut self.on_complete, Box::new(|_| {}));
        self.on_error = Box::new(|_| {});
        if let Err(payload) = catch_unwind(AssertUnwindSafe(move || on_complete(result))) {
            warn!(
                "on_complete callback panicked for task {}: {}",
                self.label(),
                panic_message(payload.as_ref())
            );
        }
    }

    /// Reports failure. Consumes both outcome callbacks so neither can fire again.
    pub(crate) fn fail(&mut self, error: TaskError) {
        let on_error = std::mem::replace(&mut self.on_error, Box::new(|_| {}));
        self.on_complete = Box::new(|_| {});
        if let Err(payload) = catch_unwind(AssertUnwindSafe(move || on_error(error))) {
            warn!(
                "on_error callback panicked for task {}: {}",
                self.label(),
                panic_message(payload.as_ref())
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_builder_wires_callbacks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c) = (seen.clone(), seen.clone(), seen.clone());
        let task = Task::new(|| async { Ok(7_u32) })
            .with_label("photo.jpg")
            .on_complete(move |r| a.lock().unwrap().push(format!("complete {r}")))
            .on_error(move |e| b.lock().unwrap().push(format!("error {e}")))
            .on_progress(move |active, waiting| c.lock().unwrap().push(format!("progress {active}/{waiting}")));

        assert_eq!(task.label(), "photo.jpg");
        let (_execute, mut callbacks) = task.into_parts();
        callbacks.progress(1, 0);
        callbacks.complete(7);
        callbacks.fail(TaskError::Cancelled);

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["progress 1/0".to_string(), "complete 7".to_string()]
        );
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let task = Task::new(|| async { Ok(()) })
            .on_error(|_| panic!("callback exploded"))
            .on_progress(|_, _| panic!("progress exploded"));
        let (_execute, mut callbacks) = task.into_parts();

        callbacks.progress(1, 0);
        callbacks.fail(TaskError::failed("decode error"));
    }

    #[test]
    fn test_unlabeled_task() {
        let task: Task<()> = Task::new(|| async { Ok(()) });
        assert_eq!(task.label(), "<unnamed>");
        assert!(format!("{task:?}").contains("Task"));

        let (_execute, callbacks) = task.into_parts();
        assert_eq!(callbacks.label(), "<unnamed>");
    }
}
