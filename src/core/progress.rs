use serde::{Deserialize, Serialize};

/// Snapshot of a queue's admission state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatus {
    /// Tasks not yet started
    pub waiting: usize,
    /// Tasks currently executing
    pub processing: usize,
}

impl ProcessingStatus {
    pub fn new(processing: usize, waiting: usize) -> Self {
        Self { waiting, processing }
    }

    pub fn is_idle(&self) -> bool {
        self.waiting == 0 && self.processing == 0
    }
}

/// Progress message type
#[derive(Debug, Deserialize, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ProgressType {
    Start,
    Progress,
    Complete,
    Error,
}

/// Batch-level progress, counted from task outcomes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Progress type (start, progress, complete, error)
    pub progress_type: ProgressType,
    /// Number of tasks that completed successfully
    pub completed_tasks: usize,
    /// Number of tasks that failed
    pub failed_tasks: usize,
    /// Total number of tasks in the batch
    pub total_tasks: usize,
    /// Settled percentage (0-100)
    pub progress_percentage: usize,
    /// Current status message
    pub status: String,
}

impl Progress {
    /// Builds a progress value and derives its type and percentage from the counts.
    pub fn new(completed_tasks: usize, failed_tasks: usize, total_tasks: usize) -> Self {
        let settled = completed_tasks + failed_tasks;
        let progress_percentage = if total_tasks > 0 {
            (settled.min(total_tasks) * 100) / total_tasks
        } else {
            100
        };

        let progress_type = if settled == 0 && total_tasks > 0 {
            ProgressType::Start
        } else if settled < total_tasks {
            ProgressType::Progress
        } else if failed_tasks > 0 {
            ProgressType::Error
        } else {
            ProgressType::Complete
        };

        let status = match progress_type {
            ProgressType::Start => "queued".to_string(),
            ProgressType::Progress => format!("{}/{} processed", settled, total_tasks),
            ProgressType::Complete => "complete".to_string(),
            ProgressType::Error => format!("complete with {} failed", failed_tasks),
        };

        Self {
            progress_type,
            completed_tasks,
            failed_tasks,
            total_tasks,
            progress_percentage,
            status,
        }
    }

    pub fn settled_tasks(&self) -> usize {
        self.completed_tasks + self.failed_tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_types_follow_counts() {
        assert_eq!(Progress::new(0, 0, 4).progress_type, ProgressType::Start);

        let mid = Progress::new(1, 1, 4);
        assert_eq!(mid.progress_type, ProgressType::Progress);
        assert_eq!(mid.progress_percentage, 50);
        assert_eq!(mid.status, "2/4 processed");

        assert_eq!(Progress::new(4, 0, 4).progress_type, ProgressType::Complete);
        let failed = Progress::new(3, 1, 4);
        assert_eq!(failed.progress_type, ProgressType::Error);
        assert_eq!(failed.progress_percentage, 100);
    }

    #[test]
    fn test_empty_batch_is_complete() {
        let progress = Progress::new(0, 0, 0);
        assert_eq!(progress.progress_type, ProgressType::Complete);
        assert_eq!(progress.progress_percentage, 100);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(Progress::new(1, 0, 2)).unwrap();
        assert_eq!(json["completedTasks"], 1);
        assert_eq!(json["progressType"], "progress");

        let status = serde_json::to_value(ProcessingStatus::new(2, 3)).unwrap();
        assert_eq!(status, serde_json::json!({ "waiting": 3, "processing": 2 }));
    }
}
