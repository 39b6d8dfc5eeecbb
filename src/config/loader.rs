//! Configuration loading and discovery for `shaderbuild.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{ShaderBuildConfig, CONFIG_FILE_NAME};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse shaderbuild.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override engine root
    pub engine_root: Option<PathBuf>,
    /// Override tool binaries root
    pub tools_dir: Option<PathBuf>,
    /// Override intermediate root
    pub intermediate: Option<PathBuf>,
    /// Override target root
    pub target: Option<PathBuf>,
    /// Override render API
    pub api: Option<String>,
    /// Override compiler directory
    pub compiler_dir: Option<PathBuf>,
    /// Override GLSL version
    pub glsl_version: Option<String>,
    /// Override target environment
    pub target_env: Option<String>,
    /// Enable SPIR-V disassembly
    pub disassemble: Option<bool>,
    /// Number of parallel jobs
    pub jobs: Option<usize>,
    /// Tool timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Find shaderbuild.toml by walking up from the current working directory.
///
/// # Returns
/// - `Some(path)` if a shaderbuild.toml file is found
/// - `None` if no config file is found
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find shaderbuild.toml by walking up from a specific directory.
///
/// This is the internal implementation that allows specifying the start directory,
/// useful for testing.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        // Move to parent directory
        if !current.pop() {
            // Reached root, no config found
            return None;
        }
    }
}

/// Load configuration from a shaderbuild.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the default
/// configuration.
///
/// A relative `engine.root` is resolved against the directory holding the file.
///
/// # Example
/// ```ignore
/// // Load from discovered config
/// let config = load_config(None)?;
///
/// // Load from specific path
/// let config = load_config(Some(Path::new("engine/shaderbuild.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<ShaderBuildConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(ShaderBuildConfig::default()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<ShaderBuildConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let mut config: ShaderBuildConfig = toml::from_str(&contents)?;
    validate_config(&config)?;

    if let (Some(root), Some(dir)) = (config.engine.root.take(), config_root(path)) {
        config.engine.root = Some(resolve_path(dir, &root));
    }

    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// Turn validation findings into a [`ConfigError`].
pub fn validate_config(config: &ShaderBuildConfig) -> Result<(), ConfigError> {
    let errors = config.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()))
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
///
/// # Example
/// ```ignore
/// let mut config = load_config(None)?;
/// let overrides = CliOverrides {
///     glsl_version: Some("450".to_string()),
///     disassemble: Some(true),
///     ..Default::default()
/// };
/// merge_cli_overrides(&mut config, &overrides);
/// ```
pub fn merge_cli_overrides(config: &mut ShaderBuildConfig, overrides: &CliOverrides) {
    if let Some(ref root) = overrides.engine_root {
        config.engine.root = Some(root.clone());
    }
    if let Some(ref tools) = overrides.tools_dir {
        config.engine.tools_dir = tools.clone();
    }

    if let Some(ref intermediate) = overrides.intermediate {
        config.output.intermediate = intermediate.clone();
    }
    if let Some(ref target) = overrides.target {
        config.output.target = target.clone();
    }

    if let Some(ref api) = overrides.api {
        config.toolchain.api = api.clone();
    }
    if let Some(ref dir) = overrides.compiler_dir {
        config.toolchain.compiler_dir = Some(dir.clone());
    }
    if let Some(ref version) = overrides.glsl_version {
        config.toolchain.glsl_version = Some(version.clone());
    }
    if let Some(ref env) = overrides.target_env {
        config.toolchain.target_env = Some(env.clone());
    }
    if let Some(disassemble) = overrides.disassemble {
        config.toolchain.disassemble = disassemble;
    }

    if let Some(jobs) = overrides.jobs {
        config.build.jobs = Some(jobs);
    }
    if let Some(timeout) = overrides.timeout_secs {
        config.build.timeout_secs = timeout;
    }
}

/// Get the directory holding a config file.
pub fn config_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to a root directory.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the root.
pub fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
