//! Configuration module for the shader build
//!
//! Provides types, loading and CLI merging for `shaderbuild.toml`.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
