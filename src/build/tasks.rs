//! Task factories.
//!
//! Each factory resolves its sources, merges caller options over the task
//! kind's defaults, assembles the stage list in a fixed order and returns a
//! [`PipelineHandle`]. Options only decide which stages are present, never
//! their order:
//!
//! | Task        | Stages                                                             |
//! |-------------|--------------------------------------------------------------------|
//! | scripts     | lint? → compile → transpile → annotate? → concat? → minify? → write |
//! | templates   | markup-minify → template-cache → write                             |
//! | stylesheets | preprocess → write                                                 |
//! | markup      | markup-compile → write                                             |

use crate::build::context::TaskContext;
use crate::build::discovery::discover_sources;
use crate::build::pipeline::{BuildError, FailurePolicy, Pipeline, PipelineHandle};
use crate::config::{ConfigError, TaskKind};
use crate::options::{check_output_name, markup_defaults, merge, script_defaults, template_defaults, TaskOptions};
use crate::stage::concat::DEFAULT_BUNDLE_NAME;
use crate::stage::{Concat, MarkupMinifier, MinifyOptions, TemplateCache, TemplateCacheOptions, WriteStage};
use serde_json::Value;
use std::path::Path;

/// Control flags of a script task, read from the reserved option keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptFlags {
    /// Insert the dependency-injection annotation stage
    pub angular: bool,
    /// Concatenate every output into this file
    pub concat: Option<String>,
    /// Insert the minification stage
    pub uglify: bool,
    /// Insert the lint stage
    pub tslint: bool,
    /// Linter configuration
    pub tslint_options: TaskOptions,
}

impl ScriptFlags {
    /// Extract the flags from a merged option map.
    ///
    /// Flags follow JavaScript truthiness; tables and lists where a flag is
    /// expected are rejected. `concat` also accepts a file name.
    pub fn from_options(options: &TaskOptions) -> Result<Self, ConfigError> {
        Ok(Self {
            angular: control_flag(options, "angular")?,
            concat: concat_target(options)?,
            uglify: control_flag(options, "uglify")?,
            tslint: control_flag(options, "tslint")?,
            tslint_options: options.get_table("tslintOptions")?.unwrap_or_default(),
        })
    }
}

fn control_flag(options: &TaskOptions, key: &str) -> Result<bool, ConfigError> {
    match options.get(key) {
        Some(value @ (Value::Array(_) | Value::Object(_))) => {
            Err(ConfigError::invalid_option(key, "a boolean", value))
        }
        _ => Ok(options.flag(key)),
    }
}

fn concat_target(options: &TaskOptions) -> Result<Option<String>, ConfigError> {
    match options.get("concat") {
        Some(Value::String(name)) if !name.is_empty() => {
            check_output_name("concat", name)?;
            Ok(Some(name.clone()))
        }
        Some(value @ (Value::Array(_) | Value::Object(_))) => {
            Err(ConfigError::invalid_option("concat", "a boolean or file name", value))
        }
        _ if options.flag("concat") => Ok(Some(DEFAULT_BUNDLE_NAME.to_string())),
        _ => Ok(None),
    }
}

/// Lint, compile and transpile scripts.
///
/// `options` is merged over [`script_defaults`]. The reserved keys
/// (`angular`, `concat`, `uglify`, `tslint`, `tslintOptions`) select stages and
/// are stripped before the rest reaches the compiler.
pub fn compile_scripts<S: AsRef<str>>(
    ctx: &TaskContext,
    sources: &[S],
    output_directory: impl AsRef<Path>,
    options: Option<&TaskOptions>,
) -> Result<PipelineHandle, BuildError> {
    let merged = merge(&script_defaults(), options);
    let flags = ScriptFlags::from_options(&merged)?;
    script_pipeline(ctx, "scripts", sources, output_directory.as_ref(), &merged, &flags)
}

/// [`compile_scripts`] with the annotation stage forced on.
///
/// The caller's options are not modified.
pub fn compile_angular_scripts<S: AsRef<str>>(
    ctx: &TaskContext,
    sources: &[S],
    output_directory: impl AsRef<Path>,
    options: Option<&TaskOptions>,
) -> Result<PipelineHandle, BuildError> {
    let merged = merge(&script_defaults(), options);
    let mut flags = ScriptFlags::from_options(&merged)?;
    flags.angular = true;
    script_pipeline(ctx, "angular-scripts", sources, output_directory.as_ref(), &merged, &flags)
}

fn script_pipeline<S: AsRef<str>>(
    ctx: &TaskContext,
    task: &str,
    sources: &[S],
    output_directory: &Path,
    merged: &TaskOptions,
    flags: &ScriptFlags,
) -> Result<PipelineHandle, BuildError> {
    let toolchain = ctx.toolchain();
    let mut pipeline = Pipeline::new(task, ctx.mode());

    if flags.tslint {
        pipeline = pipeline.stage_with_mode(
            toolchain.linter(&flags.tslint_options)?,
            FailurePolicy::Advisory,
            ctx.lint_mode(),
        );
    }

    pipeline = pipeline
        .stage(toolchain.compiler(&merged.without_reserved())?, FailurePolicy::Gated)
        .stage(toolchain.transpiler()?, FailurePolicy::Gated);

    if flags.angular {
        pipeline = pipeline.stage(toolchain.annotator()?, FailurePolicy::Gated);
    }
    if let Some(name) = &flags.concat {
        pipeline = pipeline.stage(Box::new(Concat::new(name)), FailurePolicy::Gated);
    }
    if flags.uglify {
        pipeline = pipeline.stage(toolchain.minifier()?, FailurePolicy::Lenient);
    }

    finish(ctx, pipeline, sources, output_directory)
}

/// Minify markup and package it into one template-cache script.
///
/// Naming options: `filename`, `module`, `root`, `standalone`. Minification
/// switches go in a `minify` table (`collapseWhitespace`, `removeComments`,
/// `normalizeQuotes`).
pub fn compile_templates<S: AsRef<str>>(
    ctx: &TaskContext,
    sources: &[S],
    output_directory: impl AsRef<Path>,
    options: Option<&TaskOptions>,
) -> Result<PipelineHandle, BuildError> {
    let merged = merge(&template_defaults(), options);
    let minify = MinifyOptions::from_options(merged.get_table("minify")?.as_ref())?;
    let naming = TemplateCacheOptions::from_options(Some(&merged))?;

    let pipeline = Pipeline::new("templates", ctx.mode())
        .stage(Box::new(MarkupMinifier::new(minify)), FailurePolicy::Gated)
        .stage(Box::new(TemplateCache::new(naming)), FailurePolicy::Gated);

    finish(ctx, pipeline, sources, output_directory.as_ref())
}

/// Run the stylesheet preprocessor with the caller's options as given.
pub fn compile_stylesheets<S: AsRef<str>>(
    ctx: &TaskContext,
    sources: &[S],
    output_directory: impl AsRef<Path>,
    options: Option<&TaskOptions>,
) -> Result<PipelineHandle, BuildError> {
    let options = options.cloned().unwrap_or_default();
    let pipeline = Pipeline::new("stylesheets", ctx.mode())
        .stage(ctx.toolchain().preprocessor(&options)?, FailurePolicy::Gated);

    finish(ctx, pipeline, sources, output_directory.as_ref())
}

/// Compile markup-language files to HTML. `options` is merged over `{pretty: true}`.
pub fn compile_markup<S: AsRef<str>>(
    ctx: &TaskContext,
    sources: &[S],
    output_directory: impl AsRef<Path>,
    options: Option<&TaskOptions>,
) -> Result<PipelineHandle, BuildError> {
    let merged = merge(&markup_defaults(), options);
    let pipeline = Pipeline::new("markup", ctx.mode())
        .stage(ctx.toolchain().markup_compiler(&merged)?, FailurePolicy::Gated);

    finish(ctx, pipeline, sources, output_directory.as_ref())
}

/// Dispatch to the factory for `kind`.
pub fn compile_task<S: AsRef<str>>(
    kind: TaskKind,
    ctx: &TaskContext,
    sources: &[S],
    output_directory: impl AsRef<Path>,
    options: Option<&TaskOptions>,
) -> Result<PipelineHandle, BuildError> {
    match kind {
        TaskKind::Scripts => compile_scripts(ctx, sources, output_directory, options),
        TaskKind::AngularScripts => compile_angular_scripts(ctx, sources, output_directory, options),
        TaskKind::Templates => compile_templates(ctx, sources, output_directory, options),
        TaskKind::Stylesheets => compile_stylesheets(ctx, sources, output_directory, options),
        TaskKind::Markup => compile_markup(ctx, sources, output_directory, options),
    }
}

fn finish<S: AsRef<str>>(
    ctx: &TaskContext,
    pipeline: Pipeline,
    sources: &[S],
    output_directory: &Path,
) -> Result<PipelineHandle, BuildError> {
    let out_dir = ctx.resolve_path(output_directory);
    let pipeline = pipeline.stage(Box::new(WriteStage::new(out_dir)), FailurePolicy::Fatal);
    let sources = discover_sources(ctx.base_dir(), sources)?;
    Ok(pipeline.into_handle(sources, ctx.notifier()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageKind;
    use crate::toolchain::CommandToolchain;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context(temp: &TempDir) -> TaskContext {
        TaskContext::new(Arc::new(CommandToolchain::default())).with_base_dir(temp.path())
    }

    #[test]
    fn test_script_flags_defaults() {
        let flags = ScriptFlags::from_options(&script_defaults()).unwrap();
        assert_eq!(flags, ScriptFlags::default());
    }

    #[test]
    fn test_script_flags_truthiness() {
        let options = TaskOptions::new()
            .with("angular", 1)
            .with("uglify", "yes")
            .with("tslint", 0)
            .with("tslintOptions", json!({"formatter": "prose"}));
        let flags = ScriptFlags::from_options(&options).unwrap();

        assert!(flags.angular);
        assert!(flags.uglify);
        assert!(!flags.tslint);
        assert_eq!(flags.tslint_options.get_str("formatter"), Some("prose"));
    }

    #[test]
    fn test_script_flags_concat_forms() {
        let named = ScriptFlags::from_options(&TaskOptions::new().with("concat", "app.js")).unwrap();
        assert_eq!(named.concat.as_deref(), Some("app.js"));

        let default = ScriptFlags::from_options(&TaskOptions::new().with("concat", true)).unwrap();
        assert_eq!(default.concat.as_deref(), Some(DEFAULT_BUNDLE_NAME));

        let off = ScriptFlags::from_options(&TaskOptions::new().with("concat", false)).unwrap();
        assert!(off.concat.is_none());

        let empty = ScriptFlags::from_options(&TaskOptions::new().with("concat", "")).unwrap();
        assert!(empty.concat.is_none());
    }

    #[test]
    fn test_script_flags_reject_escaping_bundle_name() {
        for name in ["../app.js", "/tmp/app.js"] {
            let result = ScriptFlags::from_options(&TaskOptions::new().with("concat", name));
            assert!(matches!(result, Err(ConfigError::InvalidOption { .. })), "{name}");
        }
    }

    #[test]
    fn test_script_flags_reject_tables() {
        let result = ScriptFlags::from_options(&TaskOptions::new().with("uglify", json!({"mangle": true})));
        assert!(matches!(result, Err(ConfigError::InvalidOption { .. })));

        let result = ScriptFlags::from_options(&TaskOptions::new().with("tslintOptions", true));
        assert!(matches!(result, Err(ConfigError::InvalidOption { .. })));
    }

    #[test]
    fn test_compile_scripts_stage_order() {
        let temp = TempDir::new().unwrap();
        let options = TaskOptions::new()
            .with("tslint", true)
            .with("angular", true)
            .with("concat", true)
            .with("uglify", true);

        let handle = compile_scripts(&context(&temp), &["**/*.ts"], "dist", Some(&options)).unwrap();
        assert_eq!(
            handle.stage_kinds(),
            vec![
                StageKind::Lint,
                StageKind::Compile,
                StageKind::Transpile,
                StageKind::Annotate,
                StageKind::Concat,
                StageKind::Minify,
                StageKind::Write,
            ]
        );
    }

    #[test]
    fn test_compile_angular_scripts_leaves_options_alone() {
        let temp = TempDir::new().unwrap();
        let options = TaskOptions::new().with("angular", false);

        let handle = compile_angular_scripts(&context(&temp), &["**/*.ts"], "dist", Some(&options)).unwrap();
        assert!(handle.has_stage(StageKind::Annotate));
        assert_eq!(options.get("angular"), Some(&json!(false)));
    }

    #[test]
    fn test_compile_templates_rejects_bad_minify_table() {
        let temp = TempDir::new().unwrap();
        let options = TaskOptions::new().with("minify", "aggressive");

        let result = compile_templates(&context(&temp), &["**/*.html"], "dist", Some(&options));
        assert!(matches!(result, Err(BuildError::Config(ConfigError::InvalidOption { .. }))));
    }

    #[test]
    fn test_compile_task_dispatch() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);

        let handle = compile_task(TaskKind::Stylesheets, &ctx, &["*.less"], "css", None).unwrap();
        assert_eq!(handle.stage_kinds(), vec![StageKind::Preprocess, StageKind::Write]);

        let handle = compile_task(TaskKind::Markup, &ctx, &["*.pug"], "html", None).unwrap();
        assert_eq!(handle.stage_kinds(), vec![StageKind::MarkupCompile, StageKind::Write]);

        let handle = compile_task(TaskKind::Templates, &ctx, &["*.html"], "js", None).unwrap();
        assert_eq!(
            handle.stage_kinds(),
            vec![StageKind::MarkupMinify, StageKind::TemplateCache, StageKind::Write]
        );
    }

    #[test]
    fn test_invalid_pattern_is_discovery_error() {
        let temp = TempDir::new().unwrap();
        let result = compile_stylesheets(&context(&temp), &["styles/[*.less"], "css", None);
        assert!(matches!(result, Err(BuildError::Discovery(_))));
    }
}
