//! Build tasks for frontpipe
//!
//! Turns source patterns and options into streaming pipelines of stages.
//!
//! # Overview
//!
//! - **Discovery**: Resolve glob patterns into source files
//! - **Tasks**: Assemble the stage list for a task kind ([`compile_scripts`], ...)
//! - **Pipeline**: Drive sources through the stages, applying failure policies
//! - **Project**: Build the tasks declared in `frontpipe.toml`, concurrently
//!
//! # Example
//!
//! ```ignore
//! use frontpipe::build::{compile_stylesheets, TaskContext};
//! use frontpipe::toolchain::CommandToolchain;
//! use std::sync::Arc;
//!
//! let ctx = TaskContext::from_current_mode(Arc::new(CommandToolchain::default()));
//! let report = compile_stylesheets(&ctx, &["styles/main.less"], "dist/css", None)?.run()?;
//! println!("Wrote {} files", report.outputs.len());
//! ```

pub mod context;
pub mod discovery;
pub mod parallel;
pub mod pipeline;
pub mod project;
pub mod result;
pub mod tasks;

pub use context::*;
pub use discovery::*;
pub use parallel::*;
pub use pipeline::*;
pub use project::*;
pub use result::*;
pub use tasks::*;
