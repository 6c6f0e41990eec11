//! Concatenation of every artifact into one named file.

use super::{Stage, StageError, StageKind};
use crate::artifact::Artifact;
use std::path::PathBuf;

/// File name used when concatenation is enabled without a name.
pub const DEFAULT_BUNDLE_NAME: &str = "bundle.js";

/// Buffers every artifact and emits a single joined artifact at the end.
#[derive(Debug)]
pub struct Concat {
    file_name: PathBuf,
    parts: Vec<Artifact>,
}

impl Concat {
    pub fn new(file_name: impl Into<PathBuf>) -> Self {
        Self { file_name: file_name.into(), parts: Vec::new() }
    }
}

impl Stage for Concat {
    fn name(&self) -> &str {
        "Concat"
    }

    fn kind(&self) -> StageKind {
        StageKind::Concat
    }

    fn process(&mut self, artifact: Artifact) -> Result<Vec<Artifact>, StageError> {
        self.parts.push(artifact);
        Ok(Vec::new())
    }

    fn finish(&mut self) -> Result<Vec<Artifact>, StageError> {
        let parts = std::mem::take(&mut self.parts);
        let Some(first) = parts.first() else {
            return Ok(Vec::new());
        };

        let base = first.base.clone();
        let contents =
            parts.iter().map(|p| p.contents.as_str()).collect::<Vec<_>>().join("\n");

        Ok(vec![Artifact::new(base, self.file_name.clone(), contents)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_holds_until_finish() {
        let mut stage = Concat::new("app.js");
        assert!(stage.process(Artifact::new("/src", "a.js", "var a;")).unwrap().is_empty());
        assert!(stage.process(Artifact::new("/src", "b.js", "var b;")).unwrap().is_empty());

        let out = stage.finish().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].relative, PathBuf::from("app.js"));
        assert_eq!(out[0].contents, "var a;\nvar b;");
    }

    #[test]
    fn test_concat_empty_emits_nothing() {
        let mut stage = Concat::new(DEFAULT_BUNDLE_NAME);
        assert!(stage.finish().unwrap().is_empty());
    }
}
