//! Task option maps and the merge rules shared by every task kind.
//!
//! Options come in two layers: per-kind defaults fixed at startup and the
//! overrides a caller passes to a single task invocation. Values are kept as
//! JSON values so they can be forwarded to external tools untouched.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Component, Path};

/// Option keys consumed by the task factory itself.
///
/// These never reach the compiler or linter configuration.
pub const RESERVED_KEYS: [&str; 5] = ["angular", "concat", "uglify", "tslint", "tslintOptions"];

/// A mapping from option name to value for one pipeline invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskOptions(Map<String, Value>);

impl TaskOptions {
    /// Create an empty option map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Read a control flag using JavaScript-style truthiness.
    ///
    /// Missing keys are false.
    pub fn flag(&self, key: &str) -> bool {
        self.0.get(key).map(is_truthy).unwrap_or(false)
    }

    /// Read a string option.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Read a nested option table.
    ///
    /// Returns an error if the key is present but is not a table. `null` is
    /// treated as absent.
    pub fn get_table(&self, key: &str) -> Result<Option<TaskOptions>, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(TaskOptions(map.clone()))),
            Some(other) => Err(ConfigError::invalid_option(key, "a table", other)),
        }
    }

    /// Read a boolean option, falling back to `default` when absent or `null`.
    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(ConfigError::invalid_option(key, "a boolean", other)),
        }
    }

    /// Read a string option, falling back to `default` when absent or `null`.
    pub fn get_string_or(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default.to_string()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(ConfigError::invalid_option(key, "a string", other)),
        }
    }

    /// Return a copy with every reserved control key removed.
    ///
    /// The receiver is left untouched.
    pub fn without_reserved(&self) -> TaskOptions {
        self.0
            .iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl FromIterator<(String, Value)> for TaskOptions {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        TaskOptions(iter.into_iter().collect())
    }
}

impl From<Map<String, Value>> for TaskOptions {
    fn from(map: Map<String, Value>) -> Self {
        TaskOptions(map)
    }
}

impl TryFrom<Value> for TaskOptions {
    type Error = ConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(TaskOptions(map)),
            Value::Null => Ok(TaskOptions::new()),
            other => Err(ConfigError::invalid_option("options", "a table", &other)),
        }
    }
}

/// Merge caller overrides onto defaults.
///
/// Keys present in `overrides` win; keys only in `defaults` keep their value;
/// keys only in `overrides` are added. Neither input is modified.
pub fn merge(defaults: &TaskOptions, overrides: Option<&TaskOptions>) -> TaskOptions {
    let mut merged = defaults.clone();
    if let Some(overrides) = overrides {
        for (key, value) in overrides.iter() {
            merged.0.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// JavaScript-style truthiness of a JSON value.
/// Reject an output file name that would land outside the output directory.
pub fn check_output_name(key: &str, name: &str) -> Result<(), ConfigError> {
    let escapes = Path::new(name)
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(ConfigError::InvalidOption {
            key: key.to_string(),
            message: format!("'{}' must stay inside the output directory", name),
        });
    }
    Ok(())
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Default compiler options for script tasks.
pub fn script_defaults() -> TaskOptions {
    TaskOptions::new()
        .with("target", "es6")
        .with("sourceMap", true)
        .with("removeComments", false)
        .with("declaration", true)
        .with("noImplicitAny", true)
        .with("module", "es2015")
        .with("suppressImplicitAnyIndexErrors", true)
}

/// Default options for markup compilation.
pub fn markup_defaults() -> TaskOptions {
    TaskOptions::new().with("pretty", true)
}

/// Default naming options for template-cache packaging.
pub fn template_defaults() -> TaskOptions {
    TaskOptions::new()
        .with("filename", "templates.js")
        .with("module", "templates")
        .with("root", "")
        .with("standalone", false)
}

/// Default markup minification applied before template packaging.
pub fn template_minify_defaults() -> TaskOptions {
    TaskOptions::new()
        .with("collapseWhitespace", true)
        .with("removeComments", true)
        .with("normalizeQuotes", true)
}
