//! Configuration schema types for `frontpipe.toml`
//!
//! Defines the structure and validation rules for a frontpipe project.
//!
//! ```toml
//! [project]
//! name = "storefront"
//! src = "client"
//! out = "public"
//!
//! [tasks.app]
//! kind = "angular-scripts"
//! sources = ["app/**/*.ts"]
//! out = "js"
//! options = { tslint = true, uglify = true, concat = "app.js" }
//!
//! [tasks.styles]
//! kind = "stylesheets"
//! sources = ["styles/main.less"]
//! out = "css"
//! ```

use crate::options::TaskOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Which task factory a configured task uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// Lint, compile and transpile scripts
    Scripts,
    /// Scripts with dependency-injection annotation forced on
    AngularScripts,
    /// Markup packaged into a template cache
    Templates,
    /// Stylesheet preprocessing
    Stylesheets,
    /// Markup-language compilation to HTML
    Markup,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskKind::Scripts => "scripts",
            TaskKind::AngularScripts => "angular-scripts",
            TaskKind::Templates => "templates",
            TaskKind::Stylesheets => "stylesheets",
            TaskKind::Markup => "markup",
        };
        write!(f, "{}", name)
    }
}

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required)
    pub name: String,
    /// Directory source patterns are resolved against
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Build output directory
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_out() -> PathBuf {
    PathBuf::from("dist")
}

/// One configured build task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task factory to use
    pub kind: TaskKind,
    /// Glob patterns, relative to `project.src`. A leading `!` excludes.
    pub sources: Vec<String>,
    /// Output directory, relative to `project.out`
    #[serde(default)]
    pub out: Option<PathBuf>,
    /// Caller options merged over the task kind's defaults
    #[serde(default)]
    pub options: TaskOptions,
}

/// Executables used for the external stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_tslint")]
    pub tslint: String,
    #[serde(default = "default_tsc")]
    pub tsc: String,
    #[serde(default = "default_babel")]
    pub babel: String,
    #[serde(default = "default_ng_annotate")]
    pub ng_annotate: String,
    #[serde(default = "default_uglifyjs")]
    pub uglifyjs: String,
    #[serde(default = "default_lessc")]
    pub lessc: String,
    #[serde(default = "default_pug")]
    pub pug: String,
}

fn default_tslint() -> String {
    "tslint".to_string()
}

fn default_tsc() -> String {
    "tsc".to_string()
}

fn default_babel() -> String {
    "babel".to_string()
}

fn default_ng_annotate() -> String {
    "ng-annotate".to_string()
}

fn default_uglifyjs() -> String {
    "uglifyjs".to_string()
}

fn default_lessc() -> String {
    "lessc".to_string()
}

fn default_pug() -> String {
    "pug".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tslint: default_tslint(),
            tsc: default_tsc(),
            babel: default_babel(),
            ng_annotate: default_ng_annotate(),
            uglifyjs: default_uglifyjs(),
            lessc: default_lessc(),
            pug: default_pug(),
        }
    }
}

/// Build execution settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Number of tasks run concurrently (defaults to available parallelism)
    #[serde(default)]
    pub jobs: Option<usize>,
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default = "default_true")]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: true }
    }
}

/// Complete frontpipe.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontpipeConfig {
    /// Project metadata (required)
    pub project: ProjectConfig,
    /// Task definitions, keyed by task name
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskConfig>,
    /// External tool executables
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Build execution settings
    #[serde(default)]
    pub build: BuildConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "tasks.app.sources")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frontpipe.toml: '{}' {}", self.field, self.message)
    }
}

impl FrontpipeConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        for (name, task) in &self.tasks {
            if task.sources.is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("tasks.{}.sources", name),
                    message: "must contain at least one glob pattern".to_string(),
                });
            }
            if task.sources.iter().all(|p| p.starts_with('!')) && !task.sources.is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("tasks.{}.sources", name),
                    message: "must contain at least one non-negated pattern".to_string(),
                });
            }
        }

        if self.build.jobs == Some(0) {
            errors.push(ConfigValidationError {
                field: "build.jobs".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Output directory for a task, relative to the project root.
    pub fn task_out_dir(&self, task: &TaskConfig) -> PathBuf {
        match &task.out {
            Some(out) => self.project.out.join(out),
            None => self.project.out.clone(),
        }
    }
}
