//! Configuration schema types for `shaderbuild.toml`
//!
//! Defines the structure and validation rules for the shader build configuration.
//! Every section and field is optional; missing values fall back to the
//! engine's standard install layout.

use crate::build::{RenderApi, DEFAULT_TOOL_TIMEOUT, SHADER_MANIFEST_NAME};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File name searched for when no config path is given.
pub const CONFIG_FILE_NAME: &str = "shaderbuild.toml";

/// Engine layout section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine root; defaults to `ENGINE_ROOT` or the current directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    /// Tool binaries root, relative to the engine root
    #[serde(default = "default_tools_dir")]
    pub tools_dir: PathBuf,
    /// Shader source root, relative to the engine root
    #[serde(default = "default_shader_src")]
    pub shader_src: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { root: None, tools_dir: default_tools_dir(), shader_src: default_shader_src() }
    }
}

fn default_tools_dir() -> PathBuf {
    PathBuf::from("Binaries/Tools")
}

fn default_shader_src() -> PathBuf {
    PathBuf::from("Source/Runtime/EngineShaders")
}

/// Output directories section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Intermediate root for stage binaries, logs and the change manifest
    #[serde(default = "default_intermediate")]
    pub intermediate: PathBuf,
    /// Target root for combined pipeline shaders and reflection data
    #[serde(default = "default_target")]
    pub target: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { intermediate: default_intermediate(), target: default_target() }
    }
}

fn default_intermediate() -> PathBuf {
    PathBuf::from("Intermediate")
}

fn default_target() -> PathBuf {
    PathBuf::from("Binaries")
}

/// Shader toolchain section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Render API to compile for
    #[serde(default = "default_api")]
    pub api: String,
    /// Directory holding the compiler and disassembler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler_dir: Option<PathBuf>,
    /// GLSL version passed to the compiler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glsl_version: Option<String>,
    /// Explicit target environment, e.g. `vulkan1.3`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_env: Option<String>,
    /// Write SPIR-V disassembly of each stage
    #[serde(default)]
    pub disassemble: bool,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            api: default_api(),
            compiler_dir: None,
            glsl_version: None,
            target_env: None,
            disassemble: false,
        }
    }
}

fn default_api() -> String {
    "vulkan".to_string()
}

/// Build behaviour section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Parallel tool invocations; defaults to available parallelism
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
    /// Per tool invocation timeout in seconds, 0 disables
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Change manifest name
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            jobs: None,
            timeout_secs: default_timeout_secs(),
            manifest_name: default_manifest_name(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TOOL_TIMEOUT.as_secs()
}

fn default_manifest_name() -> String {
    SHADER_MANIFEST_NAME.to_string()
}

/// Complete shaderbuild.toml configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderBuildConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub build: BuildSettings,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "toolchain.glsl_version")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: '{}' {}", CONFIG_FILE_NAME, self.field, self.message)
    }
}

impl ShaderBuildConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.toolchain.api.parse::<RenderApi>().is_err() {
            errors.push(ConfigValidationError {
                field: "toolchain.api".to_string(),
                message: format!("unsupported render API '{}' (supported: vulkan)", self.toolchain.api),
            });
        }

        if let Some(version) = &self.toolchain.glsl_version {
            if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit()) {
                errors.push(ConfigValidationError {
                    field: "toolchain.glsl_version".to_string(),
                    message: "must be a numeric GLSL version such as 460".to_string(),
                });
            }
        }

        if let Some(env) = &self.toolchain.target_env {
            if env.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: "toolchain.target_env".to_string(),
                    message: "must not be empty".to_string(),
                });
            }
        }

        if self.build.jobs == Some(0) {
            errors.push(ConfigValidationError {
                field: "build.jobs".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        let name = &self.build.manifest_name;
        if name.is_empty() || name.contains(|c: char| c == '/' || c == '\\') {
            errors.push(ConfigValidationError {
                field: "build.manifest_name".to_string(),
                message: "must be a non-empty file name".to_string(),
            });
        }

        errors
    }
}
