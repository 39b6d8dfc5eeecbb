//! Shader build orchestration.
//!
//! The build is a straight line: discover sources, compile stale stages,
//! then reflect the pipelines whose stages were recompiled. Per-stage and
//! per-pipeline failures are folded into the [`CompileResult`]; only missing
//! tooling and fatal discovery or filesystem errors abort the run.

use crate::build::{
    discover, manifest_path, BuildContext, ChangeManifest, CompileResult, DiscoveryError,
    ManifestError, PipelineReflector, RenderApi, StageCompiler, StageKind, Toolchain,
    DEFAULT_TOOL_TIMEOUT, SHADERS_DIR,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Error that aborts a shader build.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BuildError {
    /// Compiler or reflection tool not found
    #[error("Shader tooling missing: compiler '{compiler}', reflection tool '{reflector}'")]
    ToolingMissing { compiler: String, reflector: String },
    /// Render API other than Vulkan requested
    #[error("Unsupported render API '{0}' (supported: vulkan)")]
    UnsupportedApi(String),
    /// Discovery error
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
    /// Change manifest could not be opened
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Named options for one shader compile, as handed over by the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Render API selector
    pub api: String,
    pub source_root: PathBuf,
    pub intermediate_root: PathBuf,
    pub target_root: PathBuf,
    /// Tool binaries root holding the reflection tool
    pub tools_root: PathBuf,
    /// Compiler directory override (defaults to `$VULKAN_SDK/bin`)
    pub compiler_dir: Option<PathBuf>,
    pub glsl_version: Option<String>,
    pub target_env: Option<String>,
    /// Emit SPIR-V disassembly next to each compiled stage
    pub disassemble: bool,
    pub force: bool,
    /// Parallel tool invocations (defaults to available parallelism)
    pub jobs: Option<usize>,
    /// Per tool invocation timeout, `None` waits forever (defaults to [`DEFAULT_TOOL_TIMEOUT`])
    pub timeout: Option<Duration>,
    pub manifest_name: Option<String>,
}

impl CompileOptions {
    pub fn new(
        source_root: PathBuf,
        intermediate_root: PathBuf,
        target_root: PathBuf,
        tools_root: PathBuf,
    ) -> Self {
        Self {
            api: "vulkan".to_string(),
            source_root,
            intermediate_root,
            target_root,
            tools_root,
            compiler_dir: None,
            glsl_version: None,
            target_env: None,
            disassemble: false,
            force: false,
            jobs: None,
            timeout: Some(DEFAULT_TOOL_TIMEOUT),
            manifest_name: None,
        }
    }

    /// Resolve the toolchain and build the context for a run.
    pub fn context(&self) -> Result<BuildContext, BuildError> {
        let RenderApi::Vulkan = self.api.parse::<RenderApi>()?;

        let toolchain = Toolchain::resolve(
            self.compiler_dir.clone(),
            self.tools_root.clone(),
            self.target_env.clone(),
            self.glsl_version.clone(),
        )
        .with_disassembly(self.disassemble)
        .with_timeout(self.timeout);

        let mut context = BuildContext::new(
            self.source_root.clone(),
            self.intermediate_root.clone(),
            self.target_root.clone(),
            toolchain,
        )
        .with_force(self.force);
        if let Some(jobs) = self.jobs {
            context = context.with_jobs(jobs);
        }
        if let Some(name) = &self.manifest_name {
            context = context.with_manifest_name(name.clone());
        }
        Ok(context)
    }
}

/// Staleness of one stage as reported by [`ShaderBuild::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStatus {
    pub kind: StageKind,
    pub source: PathBuf,
    /// The next build would recompile this stage
    pub stale: bool,
}

/// Staleness of one pipeline's stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    pub name: String,
    pub stages: Vec<StageStatus>,
}

impl PipelineStatus {
    pub fn is_stale(&self) -> bool {
        self.stages.iter().any(|s| s.stale)
    }
}

/// Coordinates discovery, stage compilation and reflection.
#[derive(Debug, Clone)]
pub struct ShaderBuild {
    context: BuildContext,
}

impl ShaderBuild {
    pub fn new(context: BuildContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Run the build.
    ///
    /// Reflection only runs when at least one stage was recompiled. No
    /// retries are attempted; a failed run is fixed by the caller and re-run.
    pub fn run(&self) -> Result<CompileResult, BuildError> {
        let start = Instant::now();
        let ctx = &self.context;
        let toolchain = ctx.toolchain();

        toolchain.verify()?;
        tracing::debug!(
            compiler = ?toolchain.compiler(),
            target_env = toolchain.target_env(),
            glsl_version = toolchain.glsl_version(),
            "resolved shader toolchain"
        );

        let catalog = discover(ctx.source_root(), ctx.intermediate_root(), ctx.target_root())?;
        let mut result = CompileResult::new();

        let manifest =
            ChangeManifest::open(ctx.manifest_name(), ctx.source_root(), ctx.intermediate_root())?;
        // The compiler owns the manifest; dropping it at the end of this
        // block persists the manifest before reflection starts.
        let stages = {
            let mut compiler = StageCompiler::new(manifest, toolchain)
                .with_jobs(ctx.jobs())
                .with_force(ctx.is_forced());
            compiler.compile_all(&catalog)
        };
        result.add_stages(&stages);

        if !stages.touched.is_empty() {
            let reflection = PipelineReflector::new(toolchain)
                .with_jobs(ctx.jobs())
                .reflect(&stages.touched, &catalog)?;
            result.add_reflection(&reflection);
        }

        Ok(result.with_duration(start.elapsed()))
    }

    /// Report which stages the next build would recompile.
    ///
    /// No tool is run and the manifest on disk is left untouched.
    pub fn status(&self) -> Result<Vec<PipelineStatus>, BuildError> {
        let ctx = &self.context;
        let catalog = discover(ctx.source_root(), ctx.intermediate_root(), ctx.target_root())?;
        let manifest = ChangeManifest::open_read_only(
            ctx.manifest_name(),
            ctx.source_root(),
            ctx.intermediate_root(),
        )?;

        let mut report = Vec::with_capacity(catalog.pipeline_count());
        for (name, target) in catalog.pipelines() {
            let stages = target
                .stages
                .iter()
                .filter_map(|stage_ref| catalog.stage(*stage_ref))
                .map(|stage| {
                    let [reflection, shader] = target.outputs();
                    let outputs = [stage.artifact.binary.as_path(), reflection, shader];
                    StageStatus {
                        kind: stage.source.kind,
                        source: stage.source.path.clone(),
                        stale: ctx.is_forced() || manifest.probe(&stage.source.path, &outputs),
                    }
                })
                .collect();
            report.push(PipelineStatus { name: name.clone(), stages });
        }
        Ok(report)
    }

    /// Remove shader artifacts and the change manifest.
    pub fn clean(&self) -> Result<(), BuildError> {
        let ctx = &self.context;
        remove_dir_if_exists(&ctx.intermediate_root().join(SHADERS_DIR))?;
        remove_dir_if_exists(&ctx.target_root().join(SHADERS_DIR))?;

        let manifest = manifest_path(ctx.manifest_name(), ctx.intermediate_root());
        match fs::remove_file(&manifest) {
            Ok(()) => tracing::info!(path = %manifest.display(), "removed change manifest"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

fn remove_dir_if_exists(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            tracing::info!(path = %dir.display(), "removed directory");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Compile all engine shaders.
///
/// Never fails outright: errors that abort the run are reported as a failed
/// [`CompileResult`] carrying the error message.
pub fn compile_shaders(options: &CompileOptions) -> CompileResult {
    let outcome = options.context().and_then(|context| ShaderBuild::new(context).run());
    match outcome {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "shader build aborted");
            CompileResult::failure(e.to_string())
        }
    }
}
