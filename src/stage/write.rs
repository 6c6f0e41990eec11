//! Final stage: write artifacts under the output directory.

use super::{Stage, StageError, StageKind};
use crate::artifact::Artifact;
use std::fs;
use std::path::PathBuf;

/// Writes each artifact to `out_dir/<relative path>`.
///
/// The returned artifact is re-rooted at the output directory so callers see
/// where it landed.
#[derive(Debug)]
pub struct WriteStage {
    out_dir: PathBuf,
}

impl WriteStage {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into() }
    }
}

impl Stage for WriteStage {
    fn name(&self) -> &str {
        "Write"
    }

    fn kind(&self) -> StageKind {
        StageKind::Write
    }

    fn process(&mut self, artifact: Artifact) -> Result<Vec<Artifact>, StageError> {
        let target = self.out_dir.join(&artifact.relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| StageError::io(self.name(), parent, e))?;
        }
        fs::write(&target, artifact.contents.as_bytes())
            .map_err(|e| StageError::io(self.name(), &target, e))?;

        tracing::debug!(path = %target.display(), "wrote artifact");
        Ok(vec![artifact.with_base(self.out_dir.clone())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_mirrors_relative_structure() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("dist");
        let mut stage = WriteStage::new(&out);

        let written = stage.process(Artifact::new("/src", "app/main.js", "main();")).unwrap();
        assert_eq!(written[0].path(), out.join("app/main.js"));
        assert_eq!(fs::read_to_string(out.join("app/main.js")).unwrap(), "main();");
    }

    #[test]
    fn test_write_into_file_path_is_io_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let mut stage = WriteStage::new(&blocker);
        let err = stage.process(Artifact::new("/src", "a.js", "")).unwrap_err();
        assert!(err.is_io());
    }
}
