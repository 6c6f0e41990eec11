//! Configuration module for frontpipe
//!
//! Provides types and parsing for `frontpipe.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
