use std::collections::VecDeque;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::{Notify, oneshot};
use tracing::{debug, warn};
use crate::batch::{QueueConfig, ToolKind};
use crate::core::{ProcessingStatus, Task, TaskCallbacks};
use crate::queue::TaskHandle;
use crate::utils::{QueueError, QueueResult, TaskError};

struct QueueState<R> {
    waiting: VecDeque<Task<R>>,
    active: usize,
}

struct Shared<R> {
    state: Mutex<QueueState<R>>,
    max_concurrent: usize,
    runtime: Handle,
    idle: Notify,
}

impl<R> Shared<R> {
    // Never held across an await or while caller callbacks run.
    fn lock(&self) -> MutexGuard<'_, QueueState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Frees one concurrency slot and returns `(active, waiting)` afterwards.
    fn release_slot(&self) -> (usize, usize) {
        let mut state = self.lock();
        state.active = state.active.saturating_sub(1);
        (state.active, state.waiting.len())
    }

    fn notify_if_idle(&self, active: usize, waiting: usize) {
        if active == 0 && waiting == 0 {
            self.idle.notify_waiters();
        }
    }
}

/// Holds one admitted task's slot until it settles.
///
/// If the task future is dropped without settling (the runtime shut down),
/// the slot is still released so `active` and `wait_idle` stay truthful.
struct SlotGuard<R> {
    shared: Arc<Shared<R>>,
    released: bool,
}

impl<R> SlotGuard<R> {
    fn new(shared: Arc<Shared<R>>) -> Self {
        Self { shared, released: false }
    }

    fn release(mut self) -> (Arc<Shared<R>>, usize, usize) {
        self.released = true;
        let (active, waiting) = self.shared.release_slot();
        (Arc::clone(&self.shared), active, waiting)
    }
}

impl<R> Drop for SlotGuard<R> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let (active, waiting) = self.shared.release_slot();
        warn!(
            "Task dropped before settling, no callbacks will fire - Active: {}, Waiting: {}",
            active, waiting
        );
        self.shared.notify_if_idle(active, waiting);
    }
}

/// Runs submitted tasks with at most `max_concurrent` in flight.
///
/// Waiting tasks start in submission order. Each settlement frees a slot and
/// immediately admits the next waiting task, so the queue drains without a
/// poller. One queue is meant to be created per batch; clones share state.
///
/// Tasks run on the runtime the queue was created with. If that runtime shuts
/// down while tasks are in flight, those tasks are dropped without calling
/// `on_complete` or `on_error`; their slots are released and waiting tasks are
/// not admitted.
pub struct ProcessQueue<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for ProcessQueue<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: Send + 'static> ProcessQueue<R> {
    /// Creates a queue on the current tokio runtime.
    pub fn new(max_concurrent: usize) -> QueueResult<Self> {
        Self::with_handle(max_concurrent, Handle::try_current()?)
    }

    /// Creates a queue whose tasks are spawned on `runtime`.
    pub fn with_handle(max_concurrent: usize, runtime: Handle) -> QueueResult<Self> {
        if max_concurrent == 0 {
            return Err(QueueError::InvalidConcurrency(max_concurrent));
        }
        debug!("Creating process queue with concurrency limit {}", max_concurrent);

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    waiting: VecDeque::new(),
                    active: 0,
                }),
                max_concurrent,
                runtime,
                idle: Notify::new(),
            }),
        })
    }

    /// Creates a queue using the concurrency configured for `tool`.
    pub fn from_config(config: &QueueConfig, tool: ToolKind) -> QueueResult<Self> {
        let max_concurrent = config.concurrency_for(tool);
        debug!("Creating {} queue", tool);
        Self::new(max_concurrent)
    }

    /// Appends a task and admits it right away if a slot is free.
    ///
    /// Outcomes arrive later through the task's own callbacks.
    pub fn enqueue(&self, task: Task<R>) {
        let waiting = {
            let mut state = self.shared.lock();
            state.waiting.push_back(task);
            state.waiting.len()
        };
        debug!("Task enqueued - Waiting: {}", waiting);

        Self::process_next(&self.shared);
    }

    /// Enqueues an operation and returns a handle that resolves to its outcome.
    ///
    /// If the task is dropped by [`clear`](Self::clear) before it starts, the
    /// handle resolves to [`TaskError::Cancelled`].
    pub fn submit<F, Fut>(&self, execute: F) -> TaskHandle<R>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let tx_err = Arc::clone(&tx);

        let task = Task::new(execute)
            .on_complete(move |result| {
                if let Some(tx) = tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
                    let _ = tx.send(Ok(result));
                }
            })
            .on_error(move |error| {
                if let Some(tx) = tx_err.lock().unwrap_or_else(PoisonError::into_inner).take() {
                    let _ = tx.send(Err(error));
                }
            });

        self.enqueue(task);
        TaskHandle::new(rx)
    }

    /// Admits waiting tasks while slots are free. Safe to call at any time.
    ///
    /// `execute` is called right here, in admission order, so tasks admitted
    /// together start in the order they were enqueued. Only the returned future
    /// is spawned; its settlement calls back in here, so no call stack grows
    /// with the length of the queue.
    fn process_next(shared: &Arc<Shared<R>>) {
        loop {
            let (task, active, waiting) = {
                let mut state = shared.lock();
                if state.active >= shared.max_concurrent {
                    return;
                }
                let Some(task) = state.waiting.pop_front() else {
                    return;
                };
                state.active += 1;
                (task, state.active, state.waiting.len())
            };

            let (execute, mut callbacks) = task.into_parts();
            debug!(
                "Task started: {} - Active: {}/{}, Waiting: {}",
                callbacks.label(), active, shared.max_concurrent, waiting
            );
            callbacks.progress(active, waiting);

            let slot = SlotGuard::new(Arc::clone(shared));
            // A panic here is settled by the spawned task like any other failure.
            let started = catch_unwind(AssertUnwindSafe(execute));
            shared.runtime.spawn(Self::run_task(slot, started, callbacks));
        }
    }

    async fn run_task(
        slot: SlotGuard<R>,
        started: std::thread::Result<BoxFuture<'static, anyhow::Result<R>>>,
        mut callbacks: TaskCallbacks<R>,
    ) {
        let outcome = match started {
            Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
            Err(payload) => Err(payload),
        };

        match outcome {
            Ok(Ok(result)) => callbacks.complete(result),
            Ok(Err(err)) => {
                warn!("Task failed: {} - {:#}", callbacks.label(), err);
                callbacks.fail(TaskError::Failed(err));
            }
            Err(payload) => {
                let err = TaskError::from_panic(payload);
                warn!("Task panicked: {} - {}", callbacks.label(), err);
                callbacks.fail(err);
            }
        }

        let (shared, active, waiting) = slot.release();
        debug!(
            "Task settled: {} - Active: {}/{}, Waiting: {}",
            callbacks.label(), active, shared.max_concurrent, waiting
        );
        callbacks.progress(active, waiting);
        shared.notify_if_idle(active, waiting);

        Self::process_next(&shared);
    }
}

impl<R> ProcessQueue<R> {
    /// Number of tasks not yet started.
    pub fn waiting(&self) -> usize {
        self.shared.lock().waiting.len()
    }

    /// Number of tasks currently executing.
    pub fn active(&self) -> usize {
        self.shared.lock().active
    }

    pub fn max_concurrent(&self) -> usize {
        self.shared.max_concurrent
    }

    pub fn status(&self) -> ProcessingStatus {
        let state = self.shared.lock();
        ProcessingStatus::new(state.active, state.waiting.len())
    }

    pub fn is_idle(&self) -> bool {
        self.status().is_idle()
    }

    /// Drops every waiting task without invoking its callbacks.
    ///
    /// Active tasks keep running and still report their outcome. Returns the
    /// number of tasks dropped.
    pub fn clear(&self) -> usize {
        let (dropped, idle) = {
            let mut state = self.shared.lock();
            let dropped = std::mem::take(&mut state.waiting);
            (dropped, state.active == 0)
        };
        let count = dropped.len();
        // Dropped outside the lock: a task may own resources with their own Drop.
        drop(dropped);

        if count > 0 {
            debug!("Cleared {} waiting tasks", count);
        }
        if idle {
            self.shared.idle.notify_waiters();
        }
        count
    }

    /// Resolves once no task is waiting or active.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            let mut notified = std::pin::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl<R> std::fmt::Debug for ProcessQueue<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status();
        f.debug_struct("ProcessQueue")
            .field("max_concurrent", &self.shared.max_concurrent)
            .field("active", &status.processing)
            .field("waiting", &status.waiting)
            .finish()
    }
}
