//! Watch mode for automatic rebuilds on file changes
//!
//! Provides file system watching with debouncing for the `fpipe watch` command.
//! Tasks run lenient: a broken file is reported and the watcher keeps going.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use thiserror::Error;

use crate::build::{BuildResult, ProjectBuild};
use crate::emit::EmitMode;

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch path: {0}")]
    WatchPath(#[source] notify::Error),
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    ChannelError(String),
    /// Source directory not found
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
}

/// Tracks tasks with errors across build iterations for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Tasks that failed or reported errors in the previous build
    tasks_with_errors: HashSet<String>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with new build result, returns tasks that recovered
    pub fn update(&mut self, result: &BuildResult) -> Vec<String> {
        let current: HashSet<String> = result.troubled_tasks().into_iter().map(String::from).collect();

        let mut fixed: Vec<String> = self.tasks_with_errors.difference(&current).cloned().collect();
        fixed.sort();

        self.tasks_with_errors = current;
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.tasks_with_errors.is_empty()
    }

    /// Get the number of tasks with errors
    pub fn error_count(&self) -> usize {
        self.tasks_with_errors.len()
    }
}

/// Clear the terminal screen
pub fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Current UTC time of day, for console prefixes
pub fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400; // seconds since midnight
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Run one build iteration, printing configuration errors instead of failing.
pub fn do_build(build: &ProjectBuild) -> Option<BuildResult> {
    match build.run() {
        Ok(result) => Some(result),
        Err(e) => {
            eprintln!("[{}] Error: {}", timestamp(), e);
            None
        }
    }
}

/// Watch the project's source directory and rebuild on change.
///
/// This function blocks and runs until interrupted (Ctrl+C). Gated stage
/// failures are reported through the build's notifier whatever mode `build`
/// was created with.
pub fn watch_and_rebuild(build: ProjectBuild) -> Result<(), WatchError> {
    let build = build.with_mode(EmitMode::Suppressed);
    let src_dir = build.root().join(&build.config().project.src);
    let out_dir = build.root().join(&build.config().project.out);
    let watch_config = build.config().watch.clone();

    if !src_dir.exists() {
        return Err(WatchError::SourceNotFound(src_dir));
    }
    let src_dir = canonical(&src_dir);

    let (tx, rx) = channel();

    let debounce_duration = Duration::from_millis(watch_config.debounce_ms as u64);
    let mut debouncer = new_debouncer(debounce_duration, tx).map_err(WatchError::WatcherInit)?;

    debouncer.watcher().watch(&src_dir, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;

    let mut error_tracker = ErrorTracker::new();

    // Initial build
    if watch_config.clear_screen {
        clear_screen();
    }
    println!("[{}] Building...", timestamp());
    if let Some(result) = do_build(&build) {
        error_tracker.update(&result);
        print_build_result(&result, &[]);
    }
    println!("[{}] Watching {} for changes...", timestamp(), src_dir.display());

    // The initial build creates the output directory, so resolve it now.
    let out_dir = canonical(&out_dir);

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant_changes: Vec<_> = events
                    .iter()
                    .filter(|e| {
                        matches!(e.kind, DebouncedEventKind::Any) && is_rebuild_trigger(&e.path, &out_dir)
                    })
                    .collect();

                if relevant_changes.is_empty() {
                    continue;
                }

                for event in &relevant_changes {
                    if let Some(name) = event.path.file_name() {
                        println!("[{}] Changed: {}", timestamp(), name.to_string_lossy());
                    }
                }

                if watch_config.clear_screen {
                    clear_screen();
                }

                println!("[{}] Building...", timestamp());
                if let Some(result) = do_build(&build) {
                    let fixed = error_tracker.update(&result);
                    print_build_result(&result, &fixed);
                }

                println!("[{}] Watching {} for changes...", timestamp(), src_dir.display());
            }
            Ok(Err(error)) => {
                // Watch error (non-fatal) - log but continue watching
                tracing::warn!(error = ?error, "watch error");
                eprintln!("[{}] Watch error: {:?}", timestamp(), error);
                eprintln!("[{}] Continuing to watch...", timestamp());
            }
            Err(e) => {
                return Err(WatchError::ChannelError(e.to_string()));
            }
        }
    }
}

/// Check if a file is relevant for rebuilding
/// Resolve symlinks and relative components, keeping `path` if it cannot be.
fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Whether a change at `path` should trigger a rebuild.
///
/// Writes into the output directory never do, even when it sits inside the
/// watched source tree.
pub fn is_rebuild_trigger(path: &Path, out_dir: &Path) -> bool {
    is_relevant_file(path) && !path.starts_with(out_dir)
}

pub fn is_relevant_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        matches!(ext.as_str(), "ts" | "js" | "html" | "htm" | "less" | "css" | "jade" | "pug")
    } else {
        false
    }
}

/// Print build result to console with recovered-task notices
fn print_build_result(result: &BuildResult, fixed_tasks: &[String]) {
    for task in fixed_tasks {
        println!("[{}] Fixed: {}", timestamp(), task);
    }

    let files = result.all_outputs().len();
    let notifications = result.all_notifications().len();
    if result.is_success() && notifications == 0 {
        println!(
            "[{}] Build complete ({}) - Tasks: {} | Files: {}",
            timestamp(),
            format_duration(result.total_duration),
            result.tasks.len(),
            files
        );
    } else {
        let error_count = result.failed_count() + notifications;
        println!(
            "[{}] Build finished with errors ({}) - {} error{}",
            timestamp(),
            format_duration(result.total_duration),
            error_count,
            if error_count == 1 { "" } else { "s" }
        );

        for task in result.failures() {
            eprintln!("[{}] Error in {}: {}", timestamp(), task.task, task.status);
        }
    }

    for warning in result.all_warnings() {
        eprintln!("[{}] Warning: {}", timestamp(), warning);
    }
}
