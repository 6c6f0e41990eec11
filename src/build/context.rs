//! Per-invocation context handed to every task factory.

use super::discovery::join_normalized;
use crate::emit::{current_mode, EmitMode};
use crate::notify::{ConsoleNotifier, Notifier};
use crate::toolchain::Toolchain;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a task needs besides its sources and options.
///
/// The emit mode lives here rather than in process-wide state, so two tasks
/// built with different contexts never influence each other.
#[derive(Clone)]
pub struct TaskContext {
    /// Failure policy for gated stages
    mode: EmitMode,
    /// Separate policy for the lint stage, if decoupled
    lint_mode: Option<EmitMode>,
    /// Directory relative source patterns and output paths resolve against
    base_dir: PathBuf,
    /// External tools
    toolchain: Arc<dyn Toolchain>,
    /// Where non-fatal failures are reported
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("mode", &self.mode)
            .field("lint_mode", &self.lint_mode)
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

impl TaskContext {
    /// Create a lenient context rooted at the current directory.
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            mode: EmitMode::Suppressed,
            lint_mode: None,
            base_dir: PathBuf::from("."),
            toolchain,
            notifier: Arc::new(ConsoleNotifier::new()),
        }
    }

    /// Create a context that snapshots the process-wide emit mode.
    pub fn from_current_mode(toolchain: Arc<dyn Toolchain>) -> Self {
        Self::new(toolchain).with_mode(current_mode())
    }

    /// Set the emit mode.
    pub fn with_mode(mut self, mode: EmitMode) -> Self {
        self.mode = mode;
        self
    }

    /// Give lint findings their own emit mode instead of following `mode`.
    pub fn with_lint_mode(mut self, mode: EmitMode) -> Self {
        self.lint_mode = Some(mode);
        self
    }

    /// Set the base directory.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Set the notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Emit mode for gated stages.
    pub fn mode(&self) -> EmitMode {
        self.mode
    }

    /// Emit mode for the lint stage.
    pub fn lint_mode(&self) -> EmitMode {
        self.lint_mode.unwrap_or(self.mode)
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn toolchain(&self) -> &dyn Toolchain {
        self.toolchain.as_ref()
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Resolve a path relative to the base directory.
    ///
    /// If the path is absolute, returns it unchanged. `.` components are
    /// dropped, matching the paths source discovery produces.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            join_normalized(&self.base_dir, path)
        }
    }
}
