//! shaderbuild - Incremental engine shader build tool
//!
//! This library provides functionality to:
//! - Discover GLSL stage sources and group them into rendering pipelines
//! - Compile only the stages that changed since the last run
//! - Combine compiled stages into pipeline shaders with reflection metadata

pub mod build;
pub mod cli;
pub mod config;
pub mod paths;
pub mod process;
