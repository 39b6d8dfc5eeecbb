//! Stage compilation.
//!
//! Every discovered stage is checked against the change manifest on the
//! driving thread. Stale stages are then compiled on the worker pool and the
//! outcomes folded into a [`StageReport`] in discovery order.

use crate::build::{
    run_jobs, ChangeManifest, ShaderCatalog, StageFile, StageReport, Toolchain, COMPILER_NAME,
};
use crate::process::ToolOutput;
use std::fs;
use std::path::{Path, PathBuf};

/// Compiles stale stages and owns the change manifest for the run.
///
/// Dropping the compiler drops the manifest, which persists it.
#[derive(Debug)]
pub struct StageCompiler<'a> {
    manifest: ChangeManifest,
    toolchain: &'a Toolchain,
    jobs: usize,
    force: bool,
}

impl<'a> StageCompiler<'a> {
    pub fn new(manifest: ChangeManifest, toolchain: &'a Toolchain) -> Self {
        Self { manifest, toolchain, jobs: 1, force: false }
    }

    /// Number of compiler processes run at once.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Compile every stage; the manifest is still refreshed.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn manifest(&self) -> &ChangeManifest {
        &self.manifest
    }

    /// Compile every stage whose source or outputs changed.
    pub fn compile_all(&mut self, catalog: &ShaderCatalog) -> StageReport {
        let mut report = StageReport::default();

        let mut stale: Vec<&StageFile> = Vec::new();
        for (_, stage) in catalog.stages() {
            let mut outputs: Vec<&Path> = vec![&stage.artifact.binary];
            if let Some(target) = catalog.pipeline(&stage.source.pipeline_name) {
                outputs.extend(target.outputs());
            }

            let changed = self.manifest.is_newer(&stage.source.path, &outputs);
            if changed || self.force {
                stale.push(stage);
            } else {
                tracing::debug!(source = %stage.source.path.display(), "stage up to date");
                report.skipped += 1;
            }
        }

        if stale.is_empty() {
            return report;
        }

        let compiler =
            self.toolchain.compiler().unwrap_or_else(|| PathBuf::from(COMPILER_NAME));
        let toolchain = self.toolchain;
        let outcomes = run_jobs(self.jobs, &stale, |stage| compile_stage(toolchain, &compiler, stage));

        let mut broken = Vec::new();
        for (stage, output) in stale.iter().zip(outcomes) {
            if output.success {
                tracing::info!(
                    source = %stage.source.path.display(),
                    pipeline = %stage.source.pipeline_name,
                    "compiled shader stage"
                );
                report.compiled += 1;
                report.touched.insert(stage.source.pipeline_name.clone());
            } else {
                tracing::error!(
                    source = %stage.source.path.display(),
                    log = %stage.artifact.log.display(),
                    "shader stage failed to compile"
                );
                report.failed += 1;
                report.success = false;
                report.errors.push_str(&output.output);
                if !output.output.ends_with('\n') {
                    report.errors.push('\n');
                }
                broken.push(stage.source.pipeline_name.as_str());
            }
        }

        // A pipeline with any failed stage is never reflected, even when
        // its other stages compiled; those stay stale until the next run.
        for name in broken {
            if report.touched.remove(name) {
                tracing::warn!(pipeline = %name, "skipping reflection of partially failed pipeline");
            }
        }

        report
    }
}

/// Run the compiler for one stage, write its log and optionally disassemble it.
fn compile_stage(toolchain: &Toolchain, compiler: &Path, stage: &StageFile) -> ToolOutput {
    let kind = stage.source.kind;
    let command = toolchain
        .command(compiler)
        .args(["-S", kind.compiler_flag(), "-e", kind.entry_point()])
        .args(["--source-entrypoint", "main", "--target-env", toolchain.target_env()])
        .args(["--glsl-version", toolchain.glsl_version(), "-H", "-o"])
        .arg(&stage.artifact.binary)
        .arg(&stage.source.path);

    tracing::debug!(command = %command, "compiling shader stage");
    let output = command.run();

    if let Err(e) = fs::write(&stage.artifact.log, &output.output) {
        tracing::warn!(
            log = %stage.artifact.log.display(),
            error = %e,
            "failed to write compiler log"
        );
    }

    if output.success {
        if let Some(disassembler) = toolchain.disassembler() {
            disassemble(toolchain, &disassembler, stage);
        }
    }

    output
}

/// Best effort; failures are logged and otherwise ignored.
fn disassemble(toolchain: &Toolchain, disassembler: &Path, stage: &StageFile) {
    let command = toolchain
        .command(disassembler)
        .arg("-o")
        .arg(&stage.artifact.disassembly)
        .arg(&stage.artifact.binary);

    tracing::debug!(command = %command, "disassembling shader stage");
    let output = command.run();
    if !output.success {
        tracing::warn!(
            binary = %stage.artifact.binary.display(),
            output = %output.output.trim_end(),
            "disassembly failed"
        );
    }
}
