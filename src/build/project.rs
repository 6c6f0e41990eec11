//! Building the tasks declared in `frontpipe.toml`.

use crate::build::context::TaskContext;
use crate::build::parallel::{default_jobs, ParallelRun};
use crate::build::pipeline::{BuildError, PipelineHandle};
use crate::build::result::BuildResult;
use crate::build::tasks::compile_task;
use crate::config::{ConfigError, FrontpipeConfig, TaskConfig, TaskKind};
use crate::emit::{current_mode, EmitMode};
use crate::notify::{ConsoleNotifier, Notifier};
use crate::stage::StageKind;
use crate::toolchain::{CommandToolchain, Toolchain};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a configured task would do, without running it.
#[derive(Debug, Clone)]
pub struct TaskPlan {
    /// Task name from the config
    pub name: String,
    /// Task factory
    pub kind: TaskKind,
    /// Stages in order
    pub stages: Vec<StageKind>,
    /// Number of matched sources
    pub source_count: usize,
    /// Absolute output directory
    pub out_dir: PathBuf,
}

impl std::fmt::Display for TaskPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stages: Vec<String> = self.stages.iter().map(ToString::to_string).collect();
        write!(
            f,
            "{} ({}): {} sources -> {} [{}]",
            self.name,
            self.kind,
            self.source_count,
            self.out_dir.display(),
            stages.join(" > ")
        )
    }
}

/// Builds some or all configured tasks.
///
/// # Example
///
/// ```ignore
/// let config = frontpipe::config::load_config(None)?;
/// let result = ProjectBuild::new(config, project_root)
///     .with_mode(EmitMode::Emitting)
///     .with_filter(vec!["styles".to_string()])
///     .run()?;
/// ```
pub struct ProjectBuild {
    config: FrontpipeConfig,
    root: PathBuf,
    mode: EmitMode,
    toolchain: Arc<dyn Toolchain>,
    notifier: Arc<dyn Notifier>,
    filter: Vec<String>,
}

impl ProjectBuild {
    /// Create a build for `config`, rooted at the directory holding the config file.
    ///
    /// The emit mode starts from the process-wide setting.
    pub fn new(config: FrontpipeConfig, root: impl Into<PathBuf>) -> Self {
        let toolchain = Arc::new(CommandToolchain::new(config.tools.clone()));
        Self {
            config,
            root: root.into(),
            mode: current_mode(),
            toolchain,
            notifier: Arc::new(ConsoleNotifier::new()),
            filter: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: EmitMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the external tools.
    pub fn with_toolchain(mut self, toolchain: Arc<dyn Toolchain>) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Only build the named tasks. Empty means all.
    pub fn with_filter(mut self, tasks: Vec<String>) -> Self {
        self.filter = tasks;
        self
    }

    pub fn config(&self) -> &FrontpipeConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Context shared by every task: sources resolve against `project.src`.
    pub fn context(&self) -> TaskContext {
        TaskContext::new(Arc::clone(&self.toolchain))
            .with_mode(self.mode)
            .with_base_dir(self.root.join(&self.config.project.src))
            .with_notifier(Arc::clone(&self.notifier))
    }

    /// Configured tasks selected by the filter, in name order.
    pub fn selected_tasks(&self) -> Result<Vec<(&str, &TaskConfig)>, ConfigError> {
        if let Some(unknown) = self.filter.iter().find(|name| !self.config.tasks.contains_key(*name)) {
            return Err(ConfigError::UnknownTask(unknown.clone()));
        }

        Ok(self
            .config
            .tasks
            .iter()
            .filter(|(name, _)| self.filter.is_empty() || self.filter.contains(name))
            .map(|(name, task)| (name.as_str(), task))
            .collect())
    }

    /// Absolute output directory of a task.
    pub fn out_dir(&self, task: &TaskConfig) -> PathBuf {
        self.root.join(self.config.task_out_dir(task))
    }

    /// Build a handle for every selected task.
    pub fn handles(&self) -> Result<Vec<(String, PipelineHandle)>, BuildError> {
        let ctx = self.context();
        self.selected_tasks()?
            .into_iter()
            .map(|(name, task)| {
                let handle =
                    compile_task(task.kind, &ctx, &task.sources, self.out_dir(task), Some(&task.options))?;
                Ok((name.to_string(), handle))
            })
            .collect()
    }

    /// Describe the selected tasks without reading any source.
    pub fn plan(&self) -> Result<Vec<TaskPlan>, BuildError> {
        let ctx = self.context();
        self.selected_tasks()?
            .into_iter()
            .map(|(name, task)| {
                let out_dir = self.out_dir(task);
                let handle = compile_task(task.kind, &ctx, &task.sources, &out_dir, Some(&task.options))?;
                Ok(TaskPlan {
                    name: name.to_string(),
                    kind: task.kind,
                    stages: handle.stage_kinds(),
                    source_count: handle.source_count(),
                    out_dir,
                })
            })
            .collect()
    }

    /// Build the selected tasks concurrently.
    ///
    /// Errors here are configuration problems found before anything runs;
    /// task failures are reported in the [`BuildResult`].
    pub fn run(&self) -> Result<BuildResult, BuildError> {
        let handles = self.handles()?;
        let jobs = self.config.build.jobs.unwrap_or_else(default_jobs);
        tracing::debug!(tasks = handles.len(), jobs, mode = %self.mode, "starting build");
        Ok(ParallelRun::new().with_jobs(jobs).run(handles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::notify::RecordingNotifier;
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[project]
name = "site"

[tasks.templates]
kind = "templates"
sources = ["views/**/*.html"]
out = "js"
options = { module = "app.templates" }

[tasks.styles]
kind = "stylesheets"
sources = ["styles/*.less"]
out = "css"
"#;

    fn create_test_project() -> (TempDir, ProjectBuild) {
        let temp = TempDir::new().unwrap();
        let views = temp.path().join("src/views");
        fs::create_dir_all(&views).unwrap();
        fs::write(views.join("home.html"), "<h1>Home</h1>\n").unwrap();
        fs::write(views.join("about.html"), "<p class='lead'>About</p>").unwrap();

        let config = parse_config(CONFIG).unwrap();
        let build = ProjectBuild::new(config, temp.path())
            .with_mode(EmitMode::Emitting)
            .with_notifier(Arc::new(RecordingNotifier::new()));
        (temp, build)
    }

    #[test]
    fn test_selected_tasks_all() {
        let (_temp, build) = create_test_project();
        let names: Vec<_> = build.selected_tasks().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["styles", "templates"]);
    }

    #[test]
    fn test_selected_tasks_filter() {
        let (_temp, build) = create_test_project();
        let build = build.with_filter(vec!["templates".to_string()]);
        let names: Vec<_> = build.selected_tasks().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["templates"]);
    }

    #[test]
    fn test_selected_tasks_unknown() {
        let (_temp, build) = create_test_project();
        let build = build.with_filter(vec!["scripts".to_string()]);
        assert!(matches!(build.selected_tasks(), Err(ConfigError::UnknownTask(name)) if name == "scripts"));
    }

    #[test]
    fn test_plan_describes_tasks() {
        let (temp, build) = create_test_project();
        let plan = build.plan().unwrap();

        let templates = plan.iter().find(|p| p.name == "templates").unwrap();
        assert_eq!(templates.source_count, 2);
        assert_eq!(templates.out_dir, temp.path().join("dist/js"));
        assert!(templates.to_string().contains("markup-minify > template-cache > write"));
        assert!(!temp.path().join("dist").exists());
    }

    #[test]
    fn test_run_templates_task() {
        let (temp, build) = create_test_project();
        let result = build.with_filter(vec!["templates".to_string()]).run().unwrap();

        assert!(result.is_success(), "{}", result.summary());
        let script = fs::read_to_string(temp.path().join("dist/js/templates.js")).unwrap();
        assert!(script.starts_with("angular.module(\"app.templates\")"));
        assert!(script.contains("\"about.html\""));
        assert!(script.contains("\"home.html\""));
    }
}
