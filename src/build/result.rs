//! Build result types.
//!
//! Contains types for representing the outcome of pipelines and task runs.

use std::path::PathBuf;
use std::time::Duration;

/// Outcome of a pipeline that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Task name
    pub task: String,
    /// Files written
    pub outputs: Vec<PathBuf>,
    /// Failures reported through the notifier instead of halting
    pub notifications: Vec<String>,
    /// Failures that were only logged (minification)
    pub warnings: Vec<String>,
    /// Time from first pull to exhaustion
    pub duration: Duration,
}

impl PipelineReport {
    pub fn new(task: impl Into<String>) -> Self {
        Self { task: task.into(), ..Default::default() }
    }

    /// No notifications and no warnings.
    pub fn is_clean(&self) -> bool {
        self.notifications.is_empty() && self.warnings.is_empty()
    }
}

/// Status of a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Pipeline completed
    Success,
    /// Pipeline halted on a fatal failure
    Failed(String),
}

impl TaskStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of running a single task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Task name
    pub task: String,
    /// Run status
    pub status: TaskStatus,
    /// Output files produced
    pub outputs: Vec<PathBuf>,
    /// Notifications raised while running
    pub notifications: Vec<String>,
    /// Warning messages (if any)
    pub warnings: Vec<String>,
    /// Run duration
    pub duration: Duration,
}

impl TaskResult {
    /// Create a successful result from a pipeline report.
    pub fn success(report: PipelineReport) -> Self {
        Self {
            task: report.task,
            status: TaskStatus::Success,
            outputs: report.outputs,
            notifications: report.notifications,
            warnings: report.warnings,
            duration: report.duration,
        }
    }

    /// Create a failed result.
    pub fn failed(task: String, error: String, duration: Duration) -> Self {
        Self {
            task,
            status: TaskStatus::Failed(error),
            outputs: vec![],
            notifications: vec![],
            warnings: vec![],
            duration,
        }
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete build run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each task
    pub tasks: Vec<TaskResult>,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task result.
    pub fn add_result(&mut self, result: TaskResult) {
        self.tasks.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Get the number of successful tasks.
    pub fn success_count(&self) -> usize {
        self.tasks.iter().filter(|r| r.status.is_success()).count()
    }

    /// Get the number of failed tasks.
    pub fn failed_count(&self) -> usize {
        self.tasks.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if the overall build succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.tasks.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    /// Get all notifications.
    pub fn all_notifications(&self) -> Vec<&String> {
        self.tasks.iter().flat_map(|r| r.notifications.iter()).collect()
    }

    /// Get all warnings.
    pub fn all_warnings(&self) -> Vec<&String> {
        self.tasks.iter().flat_map(|r| r.warnings.iter()).collect()
    }

    /// Get failed task results.
    pub fn failures(&self) -> Vec<&TaskResult> {
        self.tasks.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// Names of tasks that failed or raised notifications.
    pub fn troubled_tasks(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|r| r.status.is_failure() || !r.notifications.is_empty())
            .map(|r| r.task.as_str())
            .collect()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let failed = self.failed_count();
        let total = self.tasks.len();
        let files = self.all_outputs().len();

        if failed > 0 {
            lines.push(format!(
                "Build failed: {} succeeded, {} failed ({} total)",
                success, failed, total
            ));
            for task in self.failures() {
                lines.push(format!("  - {}: {}", task.task, task.status));
            }
        } else {
            lines.push(format!(
                "Build succeeded: {} tasks, {} files written in {:?}",
                total, files, self.total_duration
            ));
        }

        let notifications = self.all_notifications();
        if !notifications.is_empty() {
            lines.push(format!("Reported errors ({}):", notifications.len()));
            for message in notifications.iter().take(5) {
                let detail = message.lines().last().unwrap_or_default();
                lines.push(format!("  - {}", detail));
            }
        }

        let warnings = self.all_warnings();
        if !warnings.is_empty() {
            lines.push(format!("Warnings ({}):", warnings.len()));
            for warning in warnings.iter().take(5) {
                lines.push(format!("  - {}", warning));
            }
            if warnings.len() > 5 {
                lines.push(format!("  ... and {} more", warnings.len() - 5));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(task: &str, outputs: &[&str]) -> PipelineReport {
        PipelineReport {
            task: task.to_string(),
            outputs: outputs.iter().map(PathBuf::from).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_task_status_display() {
        assert_eq!(TaskStatus::Success.to_string(), "success");
        assert_eq!(TaskStatus::Failed("error".to_string()).to_string(), "failed: error");
    }

    #[test]
    fn test_pipeline_report_is_clean() {
        let mut report = PipelineReport::new("scripts");
        assert!(report.is_clean());
        report.warnings.push("UglifyJS failed".to_string());
        assert!(!report.is_clean());
    }

    #[test]
    fn test_task_result_from_report() {
        let mut rep = report("scripts", &["dist/app.js"]);
        rep.notifications.push("An error occurred".to_string());
        let result = TaskResult::success(rep);

        assert!(result.is_success());
        assert_eq!(result.task, "scripts");
        assert_eq!(result.outputs.len(), 1);
        assert_eq!(result.notifications.len(), 1);
    }

    #[test]
    fn test_build_result_counts() {
        let mut result = BuildResult::new();
        result.add_result(TaskResult::success(report("a", &["a.js"])));
        result.add_result(TaskResult::failed("b".to_string(), "error".to_string(), Duration::ZERO));

        assert_eq!(result.success_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert!(!result.is_success());
        assert_eq!(result.troubled_tasks(), vec!["b"]);
    }

    #[test]
    fn test_build_result_all_outputs() {
        let mut result = BuildResult::new();
        result.add_result(TaskResult::success(report("a", &["a.js"])));
        result.add_result(TaskResult::success(report("b", &["b.css", "c.css"])));

        assert_eq!(result.all_outputs().len(), 3);
        assert!(result.is_success());
    }

    #[test]
    fn test_build_result_summary() {
        let mut result = BuildResult::new();
        result.add_result(TaskResult::success(report("a", &["a.js"])));
        assert!(result.summary().starts_with("Build succeeded: 1 tasks, 1 files"));

        result.add_result(TaskResult::failed(
            "styles".to_string(),
            "Less failed".to_string(),
            Duration::ZERO,
        ));
        let summary = result.summary();
        assert!(summary.contains("Build failed: 1 succeeded, 1 failed (2 total)"));
        assert!(summary.contains("styles: failed: Less failed"));
    }
}
