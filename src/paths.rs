//! Engine install layout.
//!
//! Resolves the engine root and the directories the shader build reads from
//! and writes to. Relative configured paths are taken relative to the engine
//! root.

use crate::build::CompileOptions;
use crate::config::{resolve_path, ShaderBuildConfig};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the engine root.
pub const ENGINE_ROOT_ENV: &str = "ENGINE_ROOT";

/// Resolved engine directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLayout {
    root: PathBuf,
    tools_root: PathBuf,
    shader_src: PathBuf,
    intermediate: PathBuf,
    target: PathBuf,
}

impl EngineLayout {
    /// Resolve the layout for a configuration.
    ///
    /// The engine root is `engine.root` if set, else `$ENGINE_ROOT`, else the
    /// current directory.
    pub fn resolve(config: &ShaderBuildConfig) -> io::Result<Self> {
        let root = match &config.engine.root {
            Some(root) => root.clone(),
            None => match env::var_os(ENGINE_ROOT_ENV).filter(|v| !v.is_empty()) {
                Some(root) => PathBuf::from(root),
                None => env::current_dir()?,
            },
        };
        let root = if root.is_absolute() { root } else { env::current_dir()?.join(root) };
        Ok(Self::from_root(root, config))
    }

    /// Layout below an explicit engine root.
    pub fn from_root(root: PathBuf, config: &ShaderBuildConfig) -> Self {
        Self {
            tools_root: resolve_path(&root, &config.engine.tools_dir),
            shader_src: resolve_path(&root, &config.engine.shader_src),
            intermediate: resolve_path(&root, &config.output.intermediate),
            target: resolve_path(&root, &config.output.target),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Tool binaries root; home of the reflection tool and working directory of every tool.
    pub fn tools_root(&self) -> &Path {
        &self.tools_root
    }

    pub fn shader_src(&self) -> &Path {
        &self.shader_src
    }

    pub fn intermediate(&self) -> &Path {
        &self.intermediate
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Compile options for this layout and configuration.
    pub fn compile_options(&self, config: &ShaderBuildConfig) -> CompileOptions {
        let toolchain = &config.toolchain;
        let mut options = CompileOptions::new(
            self.shader_src.clone(),
            self.intermediate.clone(),
            self.target.clone(),
            self.tools_root.clone(),
        );
        options.api = toolchain.api.clone();
        options.compiler_dir = toolchain.compiler_dir.as_ref().map(|dir| resolve_path(&self.root, dir));
        options.glsl_version = toolchain.glsl_version.clone();
        options.target_env = toolchain.target_env.clone();
        options.disassemble = toolchain.disassemble;
        options.jobs = config.build.jobs;
        options.timeout = match config.build.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        options.manifest_name = Some(config.build.manifest_name.clone());
        options
    }
}
