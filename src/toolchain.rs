//! External tools behind the pipeline stages.
//!
//! Compilation, linting, transpiling, annotation, minification, stylesheet
//! preprocessing and markup compilation are not implemented here. A
//! [`Toolchain`] hands out stages that delegate to them; the default
//! [`CommandToolchain`] spawns the configured executables.

use crate::artifact::Artifact;
use crate::config::{ConfigError, ToolsConfig};
use crate::options::TaskOptions;
use crate::stage::{Stage, StageError, StageKind};
use heck::ToKebabCase;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Factory for the stages backed by external tools.
pub trait Toolchain: Send + Sync {
    /// Lint stage configured from the `tslintOptions` table.
    fn linter(&self, options: &TaskOptions) -> Result<Box<dyn Stage>, ConfigError>;

    /// Type-checking compiler. `options` never contains reserved control keys.
    fn compiler(&self, options: &TaskOptions) -> Result<Box<dyn Stage>, ConfigError>;

    /// Modern syntax to broadly compatible syntax.
    fn transpiler(&self) -> Result<Box<dyn Stage>, ConfigError>;

    /// Rewrites implicit constructor dependencies into explicit annotations.
    fn annotator(&self) -> Result<Box<dyn Stage>, ConfigError>;

    /// Script minifier.
    fn minifier(&self) -> Result<Box<dyn Stage>, ConfigError>;

    /// Stylesheet preprocessor, configured with the caller's options verbatim.
    fn preprocessor(&self, options: &TaskOptions) -> Result<Box<dyn Stage>, ConfigError>;

    /// Markup-language compiler producing HTML.
    fn markup_compiler(&self, options: &TaskOptions) -> Result<Box<dyn Stage>, ConfigError>;
}

/// How option maps are rendered as command-line flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagStyle {
    /// `--key value`, camelCase keys kept (tsc)
    Separate,
    /// `--kebab-key=value` (lessc, pug)
    Kebab,
}

#[cfg(windows)]
const LIST_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const LIST_SEPARATOR: &str = ":";

/// Render an option map as command-line flags.
///
/// `null` values and nested tables are skipped. With [`FlagStyle::Kebab`],
/// `false` switches are omitted since those tools have no negated forms.
pub fn option_flags(options: &TaskOptions, style: FlagStyle) -> Vec<String> {
    let mut flags = Vec::new();

    for (key, value) in options.iter() {
        let name = match style {
            FlagStyle::Separate => format!("--{}", key),
            FlagStyle::Kebab => format!("--{}", key.to_kebab_case()),
        };

        let rendered = match value {
            Value::Null => continue,
            Value::Object(_) => {
                tracing::debug!(option = %key, "skipping nested option table");
                continue;
            }
            Value::Bool(true) => {
                flags.push(name);
                continue;
            }
            Value::Bool(false) => match style {
                FlagStyle::Separate => "false".to_string(),
                FlagStyle::Kebab => continue,
            },
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Array(items) => {
                let separator = match style {
                    FlagStyle::Separate => ",",
                    FlagStyle::Kebab => LIST_SEPARATOR,
                };
                items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(separator)
            }
        };

        match style {
            FlagStyle::Separate => {
                flags.push(name);
                flags.push(rendered);
            }
            FlagStyle::Kebab => flags.push(format!("{}={}", name, rendered)),
        }
    }

    flags
}

/// Extract a readable failure message from tool output.
fn tool_message(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.trim(), stderr.trim()) {
        ("", "") => format!("exited with {}", output.status),
        (out, "") => out.to_string(),
        ("", err) => err.to_string(),
        (out, err) => format!("{}\n{}", out, err),
    }
}

/// Run `command`, feeding `input` on stdin when given.
fn run_tool(stage: &str, program: &str, mut command: Command, input: Option<&str>) -> Result<Output, StageError> {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    command.stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() });

    let mut child = command.spawn().map_err(|e| StageError::io(stage, program, e))?;

    let writer = match (input, child.stdin.take()) {
        (Some(text), Some(mut stdin)) => {
            let text = text.to_string();
            Some(std::thread::spawn(move || stdin.write_all(text.as_bytes())))
        }
        _ => None,
    };

    let output = child.wait_with_output().map_err(|e| StageError::io(stage, program, e))?;

    if let Some(writer) = writer {
        if let Ok(Err(e)) = writer.join() {
            // Tools that fail early close stdin before reading it all.
            tracing::debug!(tool = program, error = %e, "stdin write interrupted");
        }
    }

    Ok(output)
}

/// A tool that reads the artifact on stdin and writes the result to stdout.
#[derive(Debug, Clone)]
pub struct FilterCommand {
    name: String,
    kind: StageKind,
    program: String,
    args: Vec<String>,
    path_flag: Option<String>,
    output_extension: Option<String>,
    in_source_dir: bool,
}

impl FilterCommand {
    pub fn new(name: impl Into<String>, kind: StageKind, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            program: program.into(),
            args: Vec::new(),
            path_flag: None,
            output_extension: None,
            in_source_dir: false,
        }
    }

    /// Append fixed arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Pass the artifact's source path after `flag` (e.g. `--filename`).
    pub fn with_path_flag(mut self, flag: impl Into<String>) -> Self {
        self.path_flag = Some(flag.into());
        self
    }

    /// Rename outputs to this extension.
    pub fn with_output_extension(mut self, extension: impl Into<String>) -> Self {
        self.output_extension = Some(extension.into());
        self
    }

    /// Run the tool from the artifact's directory so relative imports resolve.
    pub fn in_source_dir(mut self) -> Self {
        self.in_source_dir = true;
        self
    }

    /// The arguments the tool is invoked with for `artifact`.
    pub fn arguments_for(&self, artifact: &Artifact) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(flag) = &self.path_flag {
            args.push(flag.clone());
            args.push(artifact.path().to_string_lossy().into_owned());
        }
        args
    }
}

impl Stage for FilterCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        self.kind
    }

    fn process(&mut self, artifact: Artifact) -> Result<Vec<Artifact>, StageError> {
        let mut command = Command::new(&self.program);
        command.args(self.arguments_for(&artifact));
        if self.in_source_dir {
            command.current_dir(artifact.dir());
        }

        let output = run_tool(&self.name, &self.program, command, Some(artifact.contents.as_str()))?;
        if !output.status.success() {
            return Err(StageError::failed(&self.name, artifact.path(), tool_message(&output)));
        }

        let contents = String::from_utf8_lossy(&output.stdout).into_owned();
        let mut artifact = artifact.with_contents(contents);
        if let Some(extension) = &self.output_extension {
            artifact = artifact.with_extension(extension);
        }
        Ok(vec![artifact])
    }
}

/// A linter run against the source file on disk; content passes through.
#[derive(Debug, Clone)]
pub struct LintCommand {
    program: String,
    args: Vec<String>,
}

impl LintCommand {
    /// Build from a `tslintOptions` table (`formatter`, `configuration`, `rulesDirectory`).
    pub fn from_options(program: impl Into<String>, options: &TaskOptions) -> Result<Self, ConfigError> {
        let mut args = vec!["--format".to_string(), options.get_string_or("formatter", "verbose")?];
        if let Some(config) = options.get("configuration") {
            match config {
                Value::String(path) => {
                    args.push("--config".to_string());
                    args.push(path.clone());
                }
                Value::Null => {}
                other => return Err(ConfigError::invalid_option("configuration", "a path", other)),
            }
        }
        if let Some(dir) = options.get_str("rulesDirectory") {
            args.push("--rules-dir".to_string());
            args.push(dir.to_string());
        }
        Ok(Self { program: program.into(), args })
    }
}

impl Stage for LintCommand {
    fn name(&self) -> &str {
        "TSLint"
    }

    fn kind(&self) -> StageKind {
        StageKind::Lint
    }

    fn process(&mut self, artifact: Artifact) -> Result<Vec<Artifact>, StageError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(artifact.path());

        let output = run_tool(self.name(), &self.program, command, None)?;
        if !output.status.success() {
            return Err(StageError::failed(self.name(), artifact.path(), tool_message(&output)));
        }
        Ok(vec![artifact])
    }
}

/// The type-checking compiler, run per file into a scratch directory.
#[derive(Debug, Clone)]
pub struct CompileCommand {
    program: String,
    flags: Vec<String>,
}

impl CompileCommand {
    /// `sourceMap` is emitted inline so the map travels with the script.
    pub fn from_options(program: impl Into<String>, options: &TaskOptions) -> Self {
        let mut options = options.clone();
        if options.remove("sourceMap").as_ref().map(crate::options::is_truthy).unwrap_or(false) {
            options.insert("inlineSourceMap", true);
        }
        Self { program: program.into(), flags: option_flags(&options, FlagStyle::Separate) }
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }
}

impl Stage for CompileCommand {
    fn name(&self) -> &str {
        "TypeScript"
    }

    fn kind(&self) -> StageKind {
        StageKind::Compile
    }

    fn process(&mut self, artifact: Artifact) -> Result<Vec<Artifact>, StageError> {
        let source = artifact.path();
        let scratch = tempfile::tempdir().map_err(|e| StageError::io(self.name(), &source, e))?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.flags)
            .arg("--outDir")
            .arg(scratch.path())
            .arg("--rootDir")
            .arg(&artifact.base)
            .arg(&source);

        let output = run_tool(self.name(), &self.program, command, None)?;
        if !output.status.success() {
            return Err(StageError::failed(self.name(), &source, tool_message(&output)));
        }

        let compiled = artifact.with_extension("js");
        let emitted = scratch.path().join(&compiled.relative);
        read_emitted(self.name(), &source, &emitted).map(|contents| vec![compiled.with_contents(contents)])
    }
}

fn read_emitted(stage: &str, source: &Path, emitted: &Path) -> Result<String, StageError> {
    match std::fs::read_to_string(emitted) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StageError::failed(stage, source, "compiler produced no output"))
        }
        Err(e) => Err(StageError::io(stage, emitted, e)),
    }
}

/// Spawns the executables named in [`ToolsConfig`].
#[derive(Debug, Clone, Default)]
pub struct CommandToolchain {
    tools: ToolsConfig,
}

impl CommandToolchain {
    pub fn new(tools: ToolsConfig) -> Self {
        Self { tools }
    }
}

impl Toolchain for CommandToolchain {
    fn linter(&self, options: &TaskOptions) -> Result<Box<dyn Stage>, ConfigError> {
        Ok(Box::new(LintCommand::from_options(&self.tools.tslint, options)?))
    }

    fn compiler(&self, options: &TaskOptions) -> Result<Box<dyn Stage>, ConfigError> {
        Ok(Box::new(CompileCommand::from_options(&self.tools.tsc, options)))
    }

    fn transpiler(&self) -> Result<Box<dyn Stage>, ConfigError> {
        Ok(Box::new(
            FilterCommand::new("Babel", StageKind::Transpile, &self.tools.babel).with_path_flag("--filename"),
        ))
    }

    fn annotator(&self) -> Result<Box<dyn Stage>, ConfigError> {
        Ok(Box::new(
            FilterCommand::new("ngAnnotate", StageKind::Annotate, &self.tools.ng_annotate).with_args(["--add", "-"]),
        ))
    }

    fn minifier(&self) -> Result<Box<dyn Stage>, ConfigError> {
        Ok(Box::new(
            FilterCommand::new("UglifyJS", StageKind::Minify, &self.tools.uglifyjs)
                .with_args(["--compress", "--mangle"]),
        ))
    }

    fn preprocessor(&self, options: &TaskOptions) -> Result<Box<dyn Stage>, ConfigError> {
        let mut options = options.clone();
        // `paths` is the library spelling of lessc's include path.
        if let Some(paths) = options.remove("paths") {
            options.insert("includePath", paths);
        }
        let mut args = option_flags(&options, FlagStyle::Kebab);
        args.push("-".to_string());
        Ok(Box::new(
            FilterCommand::new("Less", StageKind::Preprocess, &self.tools.lessc)
                .with_args(args)
                .with_output_extension("css")
                .in_source_dir(),
        ))
    }

    fn markup_compiler(&self, options: &TaskOptions) -> Result<Box<dyn Stage>, ConfigError> {
        Ok(Box::new(
            FilterCommand::new("Pug", StageKind::MarkupCompile, &self.tools.pug)
                .with_args(option_flags(options, FlagStyle::Kebab))
                .with_path_flag("--path")
                .with_output_extension("html"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_option_flags_separate_style() {
        let options = TaskOptions::new()
            .with("target", "es6")
            .with("noImplicitAny", true)
            .with("removeComments", false)
            .with("lib", json!(["es2015", "dom"]))
            .with("maxNodeModuleJsDepth", 2)
            .with("paths", json!({"@app/*": ["app/*"]}))
            .with("outFile", json!(null));

        assert_eq!(
            option_flags(&options, FlagStyle::Separate),
            vec![
                "--target", "es6",
                "--noImplicitAny",
                "--removeComments", "false",
                "--lib", "es2015,dom",
                "--maxNodeModuleJsDepth", "2",
            ]
        );
    }

    #[test]
    fn test_option_flags_kebab_style() {
        let options = TaskOptions::new()
            .with("strictMath", true)
            .with("relativeUrls", false)
            .with("rootpath", "/static/")
            .with("includePath", json!(["styles", "vendor"]));

        let flags = option_flags(&options, FlagStyle::Kebab);
        assert_eq!(flags[0], "--strict-math");
        assert_eq!(flags[1], "--rootpath=/static/");
        assert_eq!(flags[2], format!("--include-path=styles{}vendor", LIST_SEPARATOR));
        assert_eq!(flags.len(), 3);
    }

    #[test]
    fn test_compile_command_inlines_source_maps() {
        let options = TaskOptions::new().with("sourceMap", true).with("target", "es6");
        let command = CompileCommand::from_options("tsc", &options);
        assert!(command.flags().contains(&"--inlineSourceMap".to_string()));
        assert!(!command.flags().contains(&"--sourceMap".to_string()));
    }

    #[test]
    fn test_lint_command_options() {
        let options = TaskOptions::new().with("formatter", "prose").with("configuration", "tslint.json");
        let lint = LintCommand::from_options("tslint", &options).unwrap();
        assert_eq!(lint.args, vec!["--format", "prose", "--config", "tslint.json"]);

        let bad = TaskOptions::new().with("configuration", 3);
        assert!(LintCommand::from_options("tslint", &bad).is_err());
    }

    #[test]
    fn test_filter_command_arguments() {
        let command = FilterCommand::new("Babel", StageKind::Transpile, "babel").with_path_flag("--filename");
        let artifact = Artifact::new("/src", "app/main.js", "");
        assert_eq!(command.arguments_for(&artifact), vec!["--filename", "/src/app/main.js"]);
    }

    #[test]
    fn test_command_toolchain_stage_kinds() {
        let toolchain = CommandToolchain::default();
        let empty = TaskOptions::new();
        assert_eq!(toolchain.linter(&empty).unwrap().kind(), StageKind::Lint);
        assert_eq!(toolchain.compiler(&empty).unwrap().kind(), StageKind::Compile);
        assert_eq!(toolchain.transpiler().unwrap().kind(), StageKind::Transpile);
        assert_eq!(toolchain.annotator().unwrap().kind(), StageKind::Annotate);
        assert_eq!(toolchain.minifier().unwrap().kind(), StageKind::Minify);
        assert_eq!(toolchain.preprocessor(&empty).unwrap().name(), "Less");
        assert_eq!(toolchain.markup_compiler(&empty).unwrap().kind(), StageKind::MarkupCompile);
    }

    #[cfg(unix)]
    #[test]
    fn test_filter_command_pipes_contents() {
        let mut stage = FilterCommand::new("Cat", StageKind::Transpile, "cat").with_output_extension("css");
        let out = stage.process(Artifact::new("/src", "main.less", "a { b: c; }")).unwrap();
        assert_eq!(out[0].contents, "a { b: c; }");
        assert_eq!(out[0].relative, std::path::PathBuf::from("main.css"));
    }

    #[cfg(unix)]
    #[test]
    fn test_filter_command_nonzero_exit_is_content_failure() {
        let mut stage = FilterCommand::new("False", StageKind::Minify, "false");
        let err = stage.process(Artifact::new("/src", "a.js", "x")).unwrap_err();
        assert!(!err.is_io());
    }

    #[test]
    fn test_filter_command_missing_tool_is_io_failure() {
        let mut stage = FilterCommand::new("Missing", StageKind::Minify, "frontpipe-no-such-tool");
        let err = stage.process(Artifact::new("/src", "a.js", "x")).unwrap_err();
        assert!(err.is_io());
    }
}
