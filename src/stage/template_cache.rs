//! Packaging of markup fragments into one template-cache registration script.
//!
//! The generated script registers every template with the runtime template
//! cache, keyed by its relative source path:
//!
//! ```text
//! angular.module("templates").run(["$templateCache", function($templateCache) {
//! $templateCache.put("views/home.html","<h1>Home</h1>");
//! }]);
//! ```

use super::{Stage, StageError, StageKind};
use crate::artifact::Artifact;
use crate::config::ConfigError;
use crate::options::{check_output_name, merge, template_defaults, TaskOptions};
use std::path::PathBuf;

/// Naming options for the generated artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateCacheOptions {
    /// Output file name
    pub filename: String,
    /// Module the templates are registered on
    pub module: String,
    /// Prefix prepended to every template key
    pub root: String,
    /// Declare the module instead of extending an existing one
    pub standalone: bool,
}

impl Default for TemplateCacheOptions {
    fn default() -> Self {
        Self {
            filename: "templates.js".to_string(),
            module: "templates".to_string(),
            root: String::new(),
            standalone: false,
        }
    }
}

impl TemplateCacheOptions {
    /// Read naming options from caller overrides, over the defaults.
    pub fn from_options(overrides: Option<&TaskOptions>) -> Result<Self, ConfigError> {
        let options = merge(&template_defaults(), overrides);
        let filename = options.get_string_or("filename", "templates.js")?;
        if filename.is_empty() {
            return Err(ConfigError::InvalidOption {
                key: "filename".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        check_output_name("filename", &filename)?;
        Ok(Self {
            filename,
            module: options.get_string_or("module", "templates")?,
            root: options.get_string_or("root", "")?,
            standalone: options.get_bool_or("standalone", false)?,
        })
    }

    /// Cache key for a template at `relative_key`.
    pub fn key_for(&self, relative_key: &str) -> String {
        if self.root.is_empty() {
            relative_key.to_string()
        } else {
            format!("{}/{}", self.root.trim_end_matches('/'), relative_key)
        }
    }
}

/// Collects templates and emits one registration artifact at the end.
#[derive(Debug)]
pub struct TemplateCache {
    options: TemplateCacheOptions,
    base: Option<PathBuf>,
    entries: Vec<(String, String)>,
}

impl TemplateCache {
    pub fn new(options: TemplateCacheOptions) -> Self {
        Self { options, base: None, entries: Vec::new() }
    }

    fn render(&self) -> Result<String, StageError> {
        let module = quote(&self.options.module)?;
        let header = if self.options.standalone {
            format!("angular.module({}, [])", module)
        } else {
            format!("angular.module({})", module)
        };

        let mut out = format!(
            "{}.run([\"$templateCache\", function($templateCache) {{\n",
            header
        );
        for (key, markup) in &self.entries {
            out.push_str(&format!("$templateCache.put({},{});\n", quote(key)?, quote(markup)?));
        }
        out.push_str("}]);\n");
        Ok(out)
    }
}

fn quote(text: &str) -> Result<String, StageError> {
    serde_json::to_string(text).map_err(|e| StageError::aggregate("Template cache", e.to_string()))
}

impl Stage for TemplateCache {
    fn name(&self) -> &str {
        "Template cache"
    }

    fn kind(&self) -> StageKind {
        StageKind::TemplateCache
    }

    fn process(&mut self, artifact: Artifact) -> Result<Vec<Artifact>, StageError> {
        let key = self.options.key_for(&artifact.key());
        if self.entries.iter().any(|(existing, _)| *existing == key) {
            return Err(StageError::failed(
                self.name(),
                artifact.path(),
                format!("duplicate template key '{}'", key),
            ));
        }
        if self.base.is_none() {
            self.base = Some(artifact.base.clone());
        }
        self.entries.push((key, artifact.contents));
        Ok(Vec::new())
    }

    fn finish(&mut self) -> Result<Vec<Artifact>, StageError> {
        let Some(base) = self.base.take() else {
            return Ok(Vec::new());
        };
        let contents = self.render()?;
        self.entries.clear();
        Ok(vec![Artifact::new(base, &self.options.filename, contents)])
    }
}
