//! frontpipe - Shared build tasks for front-end projects
//!
//! This library wires external compilers, linters and minifiers into
//! reusable build tasks:
//! - Scripts: lint, type-checked compile, transpile, annotate, concat, minify
//! - Templates: minify markup and package it into a template-cache script
//! - Stylesheets and markup: run the preprocessor or markup compiler
//!
//! Every task returns a lazily driven [`build::PipelineHandle`]. Whether a
//! compile error halts the pipeline or is only reported depends on the
//! [`emit::EmitMode`] the task was built with.

pub mod artifact;
pub mod build;
pub mod cli;
pub mod config;
pub mod emit;
pub mod logging;
pub mod notify;
pub mod options;
pub mod stage;
pub mod toolchain;
pub mod watch;

pub use build::{
    compile_angular_scripts, compile_markup, compile_scripts, compile_stylesheets, compile_templates,
    BuildError, PipelineHandle, TaskContext,
};
pub use emit::{current_mode, disable_fail_fast, enable_fail_fast, EmitMode};
pub use options::{merge, TaskOptions};
