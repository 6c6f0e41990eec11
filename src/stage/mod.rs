//! Pipeline stages.
//!
//! A stage takes artifacts one at a time and produces zero or more artifacts
//! for the next stage. Aggregating stages (concatenation, template packaging)
//! hold their input back and emit from [`Stage::finish`] once the source set
//! is exhausted.
//!
//! External tools (compilers, linters, minifiers) are stages too; see
//! [`crate::toolchain`]. The stages in this module are the plumbing that
//! frontpipe provides itself.

pub mod concat;
pub mod markup;
pub mod template_cache;
pub mod write;

pub use concat::Concat;
pub use markup::{MarkupMinifier, MinifyOptions};
pub use template_cache::{TemplateCache, TemplateCacheOptions};
pub use write::WriteStage;

use crate::artifact::Artifact;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// What a stage does, independent of which tool implements it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Lint,
    Compile,
    Transpile,
    Annotate,
    Concat,
    Minify,
    MarkupMinify,
    TemplateCache,
    Preprocess,
    MarkupCompile,
    Write,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageKind::Lint => "lint",
            StageKind::Compile => "compile",
            StageKind::Transpile => "transpile",
            StageKind::Annotate => "annotate",
            StageKind::Concat => "concat",
            StageKind::Minify => "minify",
            StageKind::MarkupMinify => "markup-minify",
            StageKind::TemplateCache => "template-cache",
            StageKind::Preprocess => "preprocess",
            StageKind::MarkupCompile => "markup-compile",
            StageKind::Write => "write",
        };
        write!(f, "{}", name)
    }
}

/// Failure raised by a stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// The tool rejected the content (type error, lint finding, syntax error).
    #[error("{stage} failed{}: {message}", describe_file(.file))]
    Failed {
        /// Stage name
        stage: String,
        /// File being processed, if the failure is tied to one
        file: Option<PathBuf>,
        /// Tool output or description
        message: String,
    },
    /// The environment is broken (unreadable input, unwritable output, missing tool).
    #[error("{stage} I/O error on {}: {source}", .path.display())]
    Io {
        /// Stage name
        stage: String,
        /// Path involved
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn describe_file(file: &Option<PathBuf>) -> String {
    match file {
        Some(path) => format!(" on {}", path.display()),
        None => String::new(),
    }
}

impl StageError {
    /// Content failure tied to a file.
    pub fn failed(stage: impl Into<String>, file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        StageError::Failed { stage: stage.into(), file: Some(file.into()), message: message.into() }
    }

    /// Content failure not tied to a single file.
    pub fn aggregate(stage: impl Into<String>, message: impl Into<String>) -> Self {
        StageError::Failed { stage: stage.into(), file: None, message: message.into() }
    }

    /// Environment failure.
    pub fn io(stage: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StageError::Io { stage: stage.into(), path: path.into(), source }
    }

    /// Whether this is an environment failure. These are always fatal.
    pub fn is_io(&self) -> bool {
        matches!(self, StageError::Io { .. })
    }

    /// The file the failure is tied to, if any.
    pub fn file(&self) -> Option<&Path> {
        match self {
            StageError::Failed { file, .. } => file.as_deref(),
            StageError::Io { path, .. } => Some(path),
        }
    }
}

/// One processing step.
pub trait Stage: Send {
    /// Human-readable name used in messages (e.g. "TypeScript", "Less").
    fn name(&self) -> &str;

    /// What the stage does.
    fn kind(&self) -> StageKind;

    /// Process one artifact.
    fn process(&mut self, artifact: Artifact) -> Result<Vec<Artifact>, StageError>;

    /// Called once after the last artifact.
    fn finish(&mut self) -> Result<Vec<Artifact>, StageError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_display_with_file() {
        let err = StageError::failed("TypeScript", "src/app.ts", "TS2322: Type 'string' is not assignable");
        assert_eq!(
            err.to_string(),
            "TypeScript failed on src/app.ts: TS2322: Type 'string' is not assignable"
        );
        assert!(!err.is_io());
        assert_eq!(err.file(), Some(Path::new("src/app.ts")));
    }

    #[test]
    fn test_stage_error_display_aggregate() {
        let err = StageError::aggregate("Concat", "nothing to join");
        assert_eq!(err.to_string(), "Concat failed: nothing to join");
        assert!(err.file().is_none());
    }

    #[test]
    fn test_stage_error_io() {
        let err = StageError::io(
            "Write",
            "/out/app.js",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.is_io());
        assert!(err.to_string().contains("/out/app.js"));
    }

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::TemplateCache.to_string(), "template-cache");
        assert_eq!(StageKind::Write.to_string(), "write");
    }
}
