//! Build context containing roots, toolchain and run settings for a shader build.

use crate::build::{default_jobs, Toolchain};
use std::path::{Path, PathBuf};

/// Default change manifest name for the shader batch.
pub const SHADER_MANIFEST_NAME: &str = "ShaderIntmdt";

/// Everything one shader build run needs.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Root scanned for `*.<stage>.glsl` files
    source_root: PathBuf,
    /// Root for per-stage artifacts and the change manifest
    intermediate_root: PathBuf,
    /// Root for combined pipeline shaders and reflection data
    target_root: PathBuf,
    /// External tools
    toolchain: Toolchain,
    /// Treat every stage as changed
    force: bool,
    /// Number of parallel tool invocations
    jobs: usize,
    /// Change manifest name (`<name>FileManifest.manifest`)
    manifest_name: String,
}

impl BuildContext {
    pub fn new(
        source_root: PathBuf,
        intermediate_root: PathBuf,
        target_root: PathBuf,
        toolchain: Toolchain,
    ) -> Self {
        Self {
            source_root,
            intermediate_root,
            target_root,
            toolchain,
            force: false,
            jobs: default_jobs(),
            manifest_name: SHADER_MANIFEST_NAME.to_string(),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn intermediate_root(&self) -> &Path {
        &self.intermediate_root
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn is_forced(&self) -> bool {
        self.force
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn manifest_name(&self) -> &str {
        &self.manifest_name
    }

    /// Recompile every stage regardless of the change manifest.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set the number of parallel tool invocations (at least 1).
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolchain() -> Toolchain {
        Toolchain::resolve(Some(PathBuf::from("/sdk/1.3.0/bin")), PathBuf::from("/tools"), None, None)
    }

    #[test]
    fn test_build_context_new() {
        let ctx = BuildContext::new(
            PathBuf::from("/engine/Source/Runtime/EngineShaders"),
            PathBuf::from("/engine/Intermediate"),
            PathBuf::from("/engine/Binaries"),
            toolchain(),
        );

        assert_eq!(ctx.source_root(), Path::new("/engine/Source/Runtime/EngineShaders"));
        assert_eq!(ctx.manifest_name(), SHADER_MANIFEST_NAME);
        assert!(!ctx.is_forced());
        assert!(ctx.jobs() >= 1);
    }

    #[test]
    fn test_build_context_builders() {
        let ctx = BuildContext::new(
            PathBuf::from("/src"),
            PathBuf::from("/int"),
            PathBuf::from("/bin"),
            toolchain(),
        )
        .with_force(true)
        .with_jobs(0)
        .with_manifest_name("Custom");

        assert!(ctx.is_forced());
        assert_eq!(ctx.jobs(), 1);
        assert_eq!(ctx.manifest_name(), "Custom");
    }
}
