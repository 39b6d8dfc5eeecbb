//! Incremental shader build pipeline
//!
//! Turns engine GLSL sources into compiled SPIR-V stage binaries and
//! per-pipeline reflection data, recompiling only what changed.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Discovery**: Find `<name>.<stage>.glsl` sources and group them into pipelines
//! - **Compilation**: Compile stale stages with the external compiler
//! - **Reflection**: Combine each recompiled pipeline's stages with the reflection tool
//!
//! Staleness is decided by a persisted change manifest (see [`manifest`]).
//!
//! # Example
//!
//! ```ignore
//! use shaderbuild::build::{compile_shaders, CompileOptions};
//!
//! let options = CompileOptions::new(source_root, intermediate_root, target_root, tools_root);
//! let result = compile_shaders(&options);
//! println!("{}", result.summary());
//! ```

pub mod compile;
pub mod context;
pub mod discovery;
pub mod manifest;
pub mod parallel;
pub mod pipeline;
pub mod reflect;
pub mod result;
pub mod stage;
pub mod target;
pub mod toolchain;

pub use compile::*;
pub use context::*;
pub use discovery::*;
pub use manifest::*;
pub use parallel::*;
pub use pipeline::*;
pub use reflect::*;
pub use result::*;
pub use stage::*;
pub use target::*;
pub use toolchain::*;
