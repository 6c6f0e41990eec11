//! Configuration loading and discovery for `frontpipe.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{BuildConfig, FrontpipeConfig, ProjectConfig, ToolsConfig, WatchConfig};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "frontpipe.toml";

/// Configuration error.
///
/// Covers both the project file and task option values. Configuration errors
/// are always fatal, whatever the emit mode.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse frontpipe.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
    /// A task option has the wrong shape
    #[error("Invalid option '{key}': {message}")]
    InvalidOption {
        /// Option name
        key: String,
        /// What was wrong
        message: String,
    },
    /// A task filter names a task that is not configured
    #[error("Unknown task '{0}'")]
    UnknownTask(String),
}

impl ConfigError {
    /// Option `key` held `found` where `expected` was required.
    pub fn invalid_option(key: &str, expected: &str, found: &serde_json::Value) -> Self {
        ConfigError::InvalidOption {
            key: key.to_string(),
            message: format!("expected {}, found {}", expected, found),
        }
    }
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override output directory
    pub out: Option<PathBuf>,
    /// Override source directory
    pub src: Option<PathBuf>,
    /// Number of concurrent tasks
    pub jobs: Option<usize>,
    /// Override watch debounce
    pub debounce_ms: Option<u32>,
}

/// Find frontpipe.toml by walking up from the current working directory.
///
/// # Returns
/// - `Some(path)` if a frontpipe.toml file is found
/// - `None` if no config file is found
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find frontpipe.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a frontpipe.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns a default
/// configuration with no tasks.
///
/// # Example
/// ```ignore
/// let config = load_config(None)?;
/// let config = load_config(Some(Path::new("web/frontpipe.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<FrontpipeConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

/// Load configuration from a specific file path.
pub fn load_config_file(path: &Path) -> Result<FrontpipeConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration text.
pub fn parse_config(contents: &str) -> Result<FrontpipeConfig, ConfigError> {
    let config: FrontpipeConfig = toml::from_str(contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Create a default configuration when no frontpipe.toml is found.
///
/// The project name is the current directory name.
pub fn default_config() -> FrontpipeConfig {
    let project_name = env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unnamed".to_string());

    FrontpipeConfig {
        project: ProjectConfig {
            name: project_name,
            src: PathBuf::from("src"),
            out: PathBuf::from("dist"),
        },
        tasks: BTreeMap::new(),
        tools: ToolsConfig::default(),
        build: BuildConfig::default(),
        watch: WatchConfig::default(),
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut FrontpipeConfig, overrides: &CliOverrides) {
    if let Some(ref out) = overrides.out {
        config.project.out = out.clone();
    }

    if let Some(ref src) = overrides.src {
        config.project.src = src.clone();
    }

    if let Some(jobs) = overrides.jobs {
        config.build.jobs = Some(jobs.max(1));
    }

    if let Some(debounce_ms) = overrides.debounce_ms {
        config.watch.debounce_ms = debounce_ms;
    }
}

/// Get the project root directory from a config file path.
///
/// A relative config path is resolved against the current directory so the
/// root is always absolute.
pub fn project_root(config_path: &Path) -> std::io::Result<PathBuf> {
    match config_path.parent() {
        Some(parent) if parent.is_absolute() => Ok(parent.to_path_buf()),
        Some(parent) if !parent.as_os_str().is_empty() => Ok(env::current_dir()?.join(parent)),
        _ => env::current_dir(),
    }
}
