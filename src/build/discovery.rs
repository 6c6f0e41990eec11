//! Source file discovery for build tasks.
//!
//! Resolves caller glob patterns against a base directory. Each match keeps
//! the glob's static prefix as its base so outputs can mirror the directory
//! structure below it, e.g. `app/**/*.ts` matching `app/core/main.ts` is
//! written as `core/main.js`.

use glob::{glob, Pattern};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, #[source] glob::PatternError),
    /// IO error during file enumeration
    #[error("IO error during discovery: {0}")]
    Io(#[from] std::io::Error),
}

/// A matched source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    /// Static prefix of the pattern that matched
    pub base: PathBuf,
    /// Full path of the file
    pub path: PathBuf,
}

impl SourceFile {
    /// Path below `base`.
    pub fn relative(&self) -> PathBuf {
        match self.path.strip_prefix(&self.base) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => self.path.file_name().map(PathBuf::from).unwrap_or_default(),
        }
    }
}

fn has_magic(text: &str) -> bool {
    text.contains(['*', '?', '[', '{'])
}

/// The static directory prefix of a glob pattern.
///
/// For a pattern without wildcards this is the parent directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    if !has_magic(pattern) {
        return path.parent().map(Path::to_path_buf).unwrap_or_default();
    }

    let mut base = PathBuf::new();
    for component in path.components() {
        if let Component::Normal(part) = component {
            if has_magic(&part.to_string_lossy()) {
                break;
            }
        }
        base.push(component);
    }
    base
}

/// Join `path` onto `base_dir`, dropping `.` components.
///
/// Glob results never carry a leading `./`, so bases and exclusion patterns
/// must not either or prefix comparisons against them fail.
pub fn join_normalized(base_dir: &Path, path: impl AsRef<Path>) -> PathBuf {
    base_dir
        .join(path)
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

/// Discover files matching a glob pattern.
///
/// # Arguments
/// - `base_dir` - Base directory to resolve relative patterns from
/// - `pattern` - Glob pattern to match
///
/// # Returns
/// Sorted list of matching file paths. Directories are skipped. A directory
/// that cannot be read fails discovery.
pub fn discover_files(base_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let full_pattern = join_normalized(base_dir, pattern);
    let pattern_str = full_pattern.to_string_lossy();

    let paths =
        glob(&pattern_str).map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))?;

    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(glob::GlobError::into_error)?;
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Resolve a list of patterns into source files.
///
/// Patterns are processed in order and a file matched by several patterns is
/// kept once, with the base of the first pattern that matched it. Patterns
/// starting with `!` remove matches. Zero matches is not an error.
pub fn discover_sources<S: AsRef<str>>(
    base_dir: &Path,
    patterns: &[S],
) -> Result<Vec<SourceFile>, DiscoveryError> {
    let mut excludes = Vec::new();
    for pattern in patterns.iter().map(AsRef::as_ref) {
        if let Some(negated) = pattern.strip_prefix('!') {
            let full = join_normalized(base_dir, negated);
            let compiled = Pattern::new(&full.to_string_lossy())
                .map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))?;
            excludes.push(compiled);
        }
    }

    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for pattern in patterns.iter().map(AsRef::as_ref) {
        if pattern.starts_with('!') {
            continue;
        }

        let base = join_normalized(base_dir, glob_base(pattern));
        for path in discover_files(base_dir, pattern)? {
            if excludes.iter().any(|p| p.matches_path(&path)) {
                continue;
            }
            if seen.insert(path.clone()) {
                sources.push(SourceFile { base: base.clone(), path });
            }
        }
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use serial_test::serial;
    use tempfile::TempDir;

    /// Switch the working directory for the rest of a test.
    struct CwdGuard(PathBuf);

    impl CwdGuard {
        fn enter(dir: &Path) -> Self {
            let previous = std::env::current_dir().unwrap();
            std::env::set_current_dir(dir).unwrap();
            CwdGuard(previous)
        }
    }

    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    fn create_test_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(&path).unwrap().write_all(b"// source").unwrap();
        path
    }

    #[test]
    fn test_glob_base() {
        assert_eq!(glob_base("app/**/*.ts"), PathBuf::from("app"));
        assert_eq!(glob_base("*.ts"), PathBuf::from(""));
        assert_eq!(glob_base("styles/main.less"), PathBuf::from("styles"));
        assert_eq!(glob_base("a/b/{x,y}/*.html"), PathBuf::from("a/b"));
        assert_eq!(glob_base("/abs/src/**/*.ts"), PathBuf::from("/abs/src"));
    }

    #[test]
    fn test_discover_files_simple() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "main.ts");
        create_test_file(temp.path(), "other.txt");

        let files = discover_files(temp.path(), "*.ts").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("main.ts"));
    }

    #[test]
    fn test_discover_files_recursive() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "a.ts");
        create_test_file(temp.path(), "sub/b.ts");
        create_test_file(temp.path(), "sub/deep/c.ts");

        let files = discover_files(temp.path(), "**/*.ts").unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_discover_files_no_match() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "main.js");

        let files = discover_files(temp.path(), "*.ts").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_discover_files_invalid_pattern() {
        let temp = TempDir::new().unwrap();
        let result = discover_files(temp.path(), "app/[*.ts");
        assert!(matches!(result, Err(DiscoveryError::InvalidPattern(_, _))));
    }

    #[test]
    fn test_discover_sources_relative_paths() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "app/main.ts");
        create_test_file(temp.path(), "app/core/service.ts");

        let sources = discover_sources(temp.path(), &["app/**/*.ts"]).unwrap();
        let relative: Vec<_> = sources.iter().map(|s| s.relative()).collect();
        assert!(relative.contains(&PathBuf::from("main.ts")));
        assert!(relative.contains(&PathBuf::from("core/service.ts")));
    }

    #[test]
    fn test_discover_sources_dedups_across_patterns() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "app/main.ts");

        let sources = discover_sources(temp.path(), &["app/*.ts", "app/**/*.ts"]).unwrap();
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn test_discover_sources_negation() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "app/main.ts");
        create_test_file(temp.path(), "app/main.spec.ts");

        let sources = discover_sources(temp.path(), &["app/**/*.ts", "!app/**/*.spec.ts"]).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].path.ends_with("main.ts"));
    }

    #[test]
    fn test_discover_sources_literal_path() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "styles/main.less");

        let sources = discover_sources(temp.path(), &["styles/main.less"]).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].relative(), PathBuf::from("main.less"));
    }

    #[test]
    fn test_join_normalized() {
        assert_eq!(join_normalized(Path::new("."), "views"), PathBuf::from("views"));
        assert_eq!(join_normalized(Path::new("."), ""), PathBuf::from(""));
        assert_eq!(join_normalized(Path::new("/p/./src"), "./app"), PathBuf::from("/p/src/app"));
    }

    #[test]
    #[serial]
    fn test_discover_sources_from_current_dir() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "views/a/index.html");
        create_test_file(temp.path(), "views/b/index.html");
        create_test_file(temp.path(), "views/a/x.spec.html");
        let _cwd = CwdGuard::enter(temp.path());

        let sources =
            discover_sources(Path::new("."), &["views/**/*.html", "!views/**/*.spec.html"]).unwrap();
        let relative: Vec<_> = sources.iter().map(|s| s.relative()).collect();
        assert_eq!(relative, vec![PathBuf::from("a/index.html"), PathBuf::from("b/index.html")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_files_unreadable_dir_fails() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "app/main.ts");
        let locked = temp.path().join("app/locked");
        create_test_file(temp.path(), "app/locked/hidden.ts");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read the directory anyway.
        let readable = fs::read_dir(&locked).is_ok();
        let result = discover_files(temp.path(), "app/**/*.ts");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if !readable {
            assert!(matches!(result, Err(DiscoveryError::Io(_))));
        }
    }
}
