//! Files flowing through a pipeline.

use std::path::{Path, PathBuf};

/// One file in flight.
///
/// `base` is the directory the file was matched from (or written to) and
/// `relative` its path below that directory. Output paths mirror `relative`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Base directory
    pub base: PathBuf,
    /// Path relative to `base`
    pub relative: PathBuf,
    /// Text contents
    pub contents: String,
}

impl Artifact {
    pub fn new(base: impl Into<PathBuf>, relative: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self { base: base.into(), relative: relative.into(), contents: contents.into() }
    }

    /// Full path (`base` joined with `relative`).
    pub fn path(&self) -> PathBuf {
        self.base.join(&self.relative)
    }

    /// Directory containing the file on disk.
    pub fn dir(&self) -> PathBuf {
        self.path().parent().map(Path::to_path_buf).unwrap_or_else(|| self.base.clone())
    }

    /// Replace the contents.
    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = contents.into();
        self
    }

    /// Change the file extension of the relative path.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.relative.set_extension(extension);
        self
    }

    /// Re-root the artifact under a new base.
    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = base.into();
        self
    }

    /// Relative path with forward slashes, for use as a lookup key.
    pub fn key(&self) -> String {
        self.relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}
