//! Concurrent task execution.
//!
//! Pipelines share nothing mutable, so independent tasks can be driven on a
//! worker pool. Results come back in the order the handles were given.
//!
//! # Example
//!
//! ```ignore
//! use frontpipe::build::{compile_scripts, compile_stylesheets, ParallelRun};
//!
//! let handles = vec![
//!     ("scripts".to_string(), compile_scripts(&ctx, &["app/**/*.ts"], "dist/js", None)?),
//!     ("styles".to_string(), compile_stylesheets(&ctx, &["styles/main.less"], "dist/css", None)?),
//! ];
//! let result = ParallelRun::new().with_jobs(2).run(handles);
//! println!("{}", result.summary());
//! ```

use crate::build::pipeline::PipelineHandle;
use crate::build::result::{BuildResult, TaskResult, TaskStatus};
use rayon::prelude::*;
use std::time::Instant;

/// Default number of parallel jobs (uses available parallelism).
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Drives several pipelines at once.
#[derive(Debug, Clone)]
pub struct ParallelRun {
    /// Number of worker threads
    jobs: usize,
}

impl Default for ParallelRun {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelRun {
    pub fn new() -> Self {
        Self { jobs: default_jobs() }
    }

    /// Set the number of parallel jobs.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Get the number of parallel jobs.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Run every handle to completion. A failing task does not stop the others.
    pub fn run(&self, handles: Vec<(String, PipelineHandle)>) -> BuildResult {
        let start = Instant::now();

        let tasks = if self.jobs == 1 || handles.len() <= 1 {
            handles.into_iter().map(|(name, handle)| run_task(name, handle)).collect()
        } else {
            match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
                Ok(pool) => pool.install(|| {
                    handles
                        .into_par_iter()
                        .map(|(name, handle)| run_task(name, handle))
                        .collect::<Vec<_>>()
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "could not start worker pool, running tasks in sequence");
                    handles.into_iter().map(|(name, handle)| run_task(name, handle)).collect()
                }
            }
        };

        BuildResult { tasks, total_duration: start.elapsed() }
    }
}

/// Run one handle to completion.
///
/// Outputs written before a fatal failure are still listed in the result.
pub fn run_task(name: String, mut handle: PipelineHandle) -> TaskResult {
    let start = Instant::now();
    tracing::info!(task = %name, sources = handle.source_count(), "running task");

    let mut failure = None;
    for item in handle.by_ref() {
        if let Err(e) = item {
            failure = Some(e);
            break;
        }
    }

    let report = handle.report().clone();
    let status = match failure {
        Some(e) => {
            tracing::error!(task = %name, error = %e, "task failed");
            TaskStatus::Failed(e.to_string())
        }
        None => TaskStatus::Success,
    };

    TaskResult {
        task: name,
        status,
        outputs: report.outputs,
        notifications: report.notifications,
        warnings: report.warnings,
        duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::discovery::SourceFile;
    use crate::build::pipeline::{FailurePolicy, Pipeline};
    use crate::emit::EmitMode;
    use crate::notify::NullNotifier;
    use crate::stage::WriteStage;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, content: &str) -> SourceFile {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        SourceFile { base: dir.to_path_buf(), path }
    }

    fn copy_task(sources: Vec<SourceFile>, out: PathBuf) -> PipelineHandle {
        Pipeline::new("copy", EmitMode::Emitting)
            .stage(Box::new(WriteStage::new(out)), FailurePolicy::Fatal)
            .into_handle(sources, Arc::new(NullNotifier))
    }

    #[test]
    fn test_parallel_run_jobs_minimum() {
        assert_eq!(ParallelRun::new().with_jobs(0).jobs(), 1);
        assert_eq!(ParallelRun::new().with_jobs(4).jobs(), 4);
    }

    #[test]
    fn test_parallel_run_empty() {
        let result = ParallelRun::new().run(Vec::new());
        assert!(result.tasks.is_empty());
        assert!(result.is_success());
    }

    #[test]
    fn test_parallel_run_keeps_order() {
        let temp = TempDir::new().unwrap();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let source = create_test_file(temp.path(), &format!("f{}.txt", i), "x");
                (format!("task{}", i), copy_task(vec![source], temp.path().join(format!("out{}", i))))
            })
            .collect();

        let result = ParallelRun::new().with_jobs(3).run(handles);
        let names: Vec<_> = result.tasks.iter().map(|t| t.task.as_str()).collect();
        assert_eq!(names, vec!["task0", "task1", "task2", "task3"]);
        assert_eq!(result.success_count(), 4);
        assert!(temp.path().join("out2/f2.txt").exists());
    }

    #[test]
    fn test_run_task_failure_keeps_earlier_outputs() {
        let temp = TempDir::new().unwrap();
        let good = create_test_file(temp.path(), "good.txt", "ok");
        let missing = SourceFile { base: temp.path().to_path_buf(), path: temp.path().join("missing.txt") };

        let result = run_task("copy".to_string(), copy_task(vec![good, missing], temp.path().join("out")));

        assert!(result.status.is_failure());
        assert_eq!(result.outputs, vec![temp.path().join("out/good.txt")]);
    }

    #[test]
    fn test_failing_task_does_not_stop_others() {
        let temp = TempDir::new().unwrap();
        let missing = SourceFile { base: temp.path().to_path_buf(), path: temp.path().join("missing.txt") };
        let good = create_test_file(temp.path(), "good.txt", "ok");

        let result = ParallelRun::new().with_jobs(2).run(vec![
            ("broken".to_string(), copy_task(vec![missing], temp.path().join("a"))),
            ("fine".to_string(), copy_task(vec![good], temp.path().join("b"))),
        ]);

        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.success_count(), 1);
        assert!(temp.path().join("b/good.txt").exists());
    }

    #[test]
    fn test_default_jobs() {
        assert!(default_jobs() >= 1);
    }
}
