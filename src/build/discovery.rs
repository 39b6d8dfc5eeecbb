//! Shader source discovery for the build system.
//!
//! Finds `<name>.<stage>.glsl` files below the shader source root, groups
//! them into pipelines by name and computes every artifact path.

use crate::build::{
    IntermediateArtifact, ShaderCatalog, SourceShaderFile, StageFile, StageKind, SOURCE_EXTENSION,
};
use glob::{glob, Pattern};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory below the intermediate and target roots holding shader artifacts.
pub const SHADERS_DIR: &str = "Shaders";

/// Error during source discovery.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, #[source] glob::PatternError),
    /// IO error during file enumeration or directory creation
    #[error("IO error during discovery: {0}")]
    Io(#[from] std::io::Error),
    /// Shader source root does not exist
    #[error("Shader source directory not found: {0}")]
    SourceRootMissing(PathBuf),
    /// Two files of the same stage resolve to one pipeline
    #[error("Pipeline '{pipeline}' has more than one {kind} stage: {} and {}", first.display(), second.display())]
    DuplicateStage { pipeline: String, kind: StageKind, first: PathBuf, second: PathBuf },
}

/// Discover stage sources of one kind, sorted by path.
pub fn discover_stage_files(
    source_root: &Path,
    kind: StageKind,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let pattern = format!(
        "{}/**/*{}",
        Pattern::escape(&source_root.to_string_lossy()),
        kind.file_suffix()
    );
    let paths = glob(&pattern).map_err(|e| DiscoveryError::InvalidPattern(pattern.clone(), e))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    files.push(path);
                }
            }
            Err(e) => {
                // Log but continue on unreadable directories
                tracing::warn!(error = %e, "error reading path during shader discovery");
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Pipeline name of a stage source: file name minus `.<tag>.glsl`.
pub fn pipeline_name(path: &Path, kind: StageKind) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let name = file_name.strip_suffix(&kind.file_suffix())?;
    (!name.is_empty()).then(|| name.to_string())
}

/// Discover all shader stages and group them into pipelines.
///
/// Kinds are visited in stage table order and files of one kind in path
/// order, so the stage order of every pipeline is stable across runs over
/// an unchanged tree. Every artifact directory is created.
pub fn discover(
    source_root: &Path,
    intermediate_root: &Path,
    target_root: &Path,
) -> Result<ShaderCatalog, DiscoveryError> {
    if !source_root.is_dir() {
        return Err(DiscoveryError::SourceRootMissing(source_root.to_path_buf()));
    }

    let intermediate_shaders = intermediate_root.join(SHADERS_DIR);
    let target_shaders = target_root.join(SHADERS_DIR);
    fs::create_dir_all(&intermediate_shaders)?;
    fs::create_dir_all(&target_shaders)?;

    let mut catalog = ShaderCatalog::new();

    for kind in StageKind::ALL {
        for path in discover_stage_files(source_root, kind)? {
            let Some(name) = pipeline_name(&path, kind) else {
                tracing::warn!(
                    source = %path.display(),
                    "skipping shader source with empty pipeline name"
                );
                continue;
            };

            if let Some(existing) = catalog.pipeline_stage(&name, kind) {
                return Err(DiscoveryError::DuplicateStage {
                    pipeline: name,
                    kind,
                    first: existing.source.path.clone(),
                    second: path,
                });
            }

            let relative_dir = path
                .parent()
                .and_then(|parent| parent.strip_prefix(source_root).ok())
                .unwrap_or_else(|| Path::new(""));
            let artifact_dir = intermediate_shaders.join(relative_dir);
            fs::create_dir_all(&artifact_dir)?;

            let artifact_base = artifact_dir.join(format!("{}.{}", name, kind.tag()));
            let stage = StageFile {
                artifact: IntermediateArtifact::from_base(&artifact_base),
                source: SourceShaderFile { path, kind, pipeline_name: name.clone() },
            };

            tracing::debug!(
                source = %stage.source.path.display(),
                pipeline = %name,
                stage = %kind,
                "discovered shader stage"
            );
            catalog.insert(stage, &target_shaders.join(&name));
        }
    }

    tracing::info!(
        stages = catalog.stage_count(),
        pipelines = catalog.pipeline_count(),
        "discovered shaders"
    );

    Ok(catalog)
}

/// Whether a path looks like a shader stage source.
pub fn is_stage_source(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION)
        && StageKind::ALL.iter().any(|kind| pipeline_name(path, *kind).is_some())
}
