use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};
use crate::core::{Progress, Task};

#[derive(Debug, Default)]
struct TrackerState {
    completed: usize,
    failed_tasks: Vec<(String, String)>, // (label, error_message)
}

/// Counts task outcomes against the number of files in a batch.
///
/// The queue itself has no completion event; callers count settlements
/// against the total they submitted. Clones share the same counters so the
/// tracker can be moved into task callbacks.
#[derive(Debug, Clone)]
pub struct BatchTracker {
    total: usize,
    state: Arc<Mutex<TrackerState>>,
}

impl BatchTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            state: Arc::new(Mutex::new(TrackerState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_complete(&self) -> Progress {
        let progress = {
            let mut state = self.lock();
            state.completed += 1;
            Progress::new(state.completed, state.failed_tasks.len(), self.total)
        };
        self.log_if_finished(&progress);
        progress
    }

    pub fn record_error(&self, label: impl Into<String>, error: impl Display) -> Progress {
        let label = label.into();
        let progress = {
            let mut state = self.lock();
            state.failed_tasks.push((label, error.to_string()));
            Progress::new(state.completed, state.failed_tasks.len(), self.total)
        };
        self.log_if_finished(&progress);
        progress
    }

    fn log_if_finished(&self, progress: &Progress) {
        if progress.settled_tasks() != self.total {
            return;
        }
        if progress.failed_tasks > 0 {
            warn!(
                "Batch completed with {} failed tasks out of {}",
                progress.failed_tasks, self.total
            );
        } else {
            info!("Batch completed successfully: {} files processed", progress.completed_tasks);
        }
    }

    /// Wraps a task so its outcome is recorded before the original callbacks run.
    pub fn track<R: Send + 'static>(&self, mut task: Task<R>) -> Task<R> {
        let label = task.label().to_string();

        let on_complete = std::mem::replace(&mut task.callbacks.on_complete, Box::new(|_| {}));
        let tracker = self.clone();
        task.callbacks.on_complete = Box::new(move |result| {
            tracker.record_complete();
            on_complete(result);
        });

        let on_error = std::mem::replace(&mut task.callbacks.on_error, Box::new(|_| {}));
        let tracker = self.clone();
        task.callbacks.on_error = Box::new(move |error| {
            tracker.record_error(label, &error);
            on_error(error);
        });

        task
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn progress(&self) -> Progress {
        let state = self.lock();
        Progress::new(state.completed, state.failed_tasks.len(), self.total)
    }

    pub fn is_finished(&self) -> bool {
        self.progress().settled_tasks() >= self.total
    }

    pub fn failed_tasks(&self) -> Vec<(String, String)> {
        self.lock().failed_tasks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProgressType;
    use crate::queue::ProcessQueue;

    #[test]
    fn test_counts_outcomes() {
        let tracker = BatchTracker::new(3);
        assert_eq!(tracker.progress().progress_type, ProgressType::Start);

        tracker.record_complete();
        let progress = tracker.record_error("scan.tiff", "unsupported format");
        assert_eq!(progress.progress_type, ProgressType::Progress);
        assert!(!tracker.is_finished());

        let progress = tracker.clone().record_complete();
        assert_eq!(progress.progress_type, ProgressType::Error);
        assert!(tracker.is_finished());
        assert_eq!(
            tracker.failed_tasks(),
            vec![("scan.tiff".to_string(), "unsupported format".to_string())]
        );
    }

    #[tokio::test]
    async fn test_track_records_and_forwards() {
        let queue = ProcessQueue::new(2).unwrap();
        let tracker = BatchTracker::new(3);
        let forwarded = Arc::new(Mutex::new(Vec::new()));

        for (i, fail) in [false, true, false].into_iter().enumerate() {
            let forwarded_ok = forwarded.clone();
            let forwarded_err = forwarded.clone();
            let task = Task::new(move || async move {
                if fail {
                    anyhow::bail!("model failed to load");
                }
                Ok(i)
            })
            .with_label(format!("image-{i}.png"))
            .on_complete(move |r| forwarded_ok.lock().unwrap().push(format!("ok {r}")))
            .on_error(move |_| forwarded_err.lock().unwrap().push("err".to_string()));

            queue.enqueue(tracker.track(task));
        }

        queue.wait_idle().await;

        let progress = tracker.progress();
        assert_eq!(progress.completed_tasks, 2);
        assert_eq!(progress.failed_tasks, 1);
        assert_eq!(tracker.failed_tasks()[0].0, "image-1.png");
        assert!(tracker.failed_tasks()[0].1.contains("model failed to load"));

        let mut forwarded = forwarded.lock().unwrap().clone();
        forwarded.sort();
        assert_eq!(forwarded, vec!["err", "ok 0", "ok 2"]);
    }
}
