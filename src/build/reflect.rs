//! Pipeline reflection.
//!
//! Each pipeline touched by stage compilation is handed to the reflection
//! tool, which combines the stage binaries into one shader blob and writes
//! the pipeline's reflection metadata. The tool's arguments are the stage
//! binaries in pipeline order, then the reflection path, then the combined
//! shader path.

use crate::build::{run_jobs, BuildError, PipelineTarget, ReflectReport, ShaderCatalog, Toolchain};
use crate::process::{ToolCommand, ToolOutput};
use std::collections::BTreeSet;
use std::path::Path;

/// Runs the reflection tool over touched pipelines.
#[derive(Debug, Clone, Copy)]
pub struct PipelineReflector<'a> {
    toolchain: &'a Toolchain,
    jobs: usize,
}

impl<'a> PipelineReflector<'a> {
    pub fn new(toolchain: &'a Toolchain) -> Self {
        Self { toolchain, jobs: 1 }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Reflect every pipeline in `touched`.
    ///
    /// Fails without doing any work when the compiler or reflection tool is
    /// missing. A failing pipeline clears the report's success flag but does
    /// not stop the others.
    pub fn reflect(
        &self,
        touched: &BTreeSet<String>,
        catalog: &ShaderCatalog,
    ) -> Result<ReflectReport, BuildError> {
        self.toolchain.verify()?;

        let mut report = ReflectReport::default();
        let reflector = self.toolchain.reflector();

        let mut commands: Vec<(&str, ToolCommand)> = Vec::with_capacity(touched.len());
        for name in touched {
            debug_assert!(
                catalog.pipeline(name).is_some(),
                "touched pipeline '{}' is not in the catalog",
                name
            );
            let Some(target) = catalog.pipeline(name) else {
                tracing::error!(pipeline = %name, "touched pipeline is not in the catalog");
                continue;
            };
            commands.push((name.as_str(), self.command(&reflector, catalog, target)));
        }

        let outcomes = run_jobs(self.jobs, &commands, |(name, command)| {
            tracing::debug!(pipeline = %name, command = %command, "reflecting pipeline");
            command.run()
        });

        for ((name, _), output) in commands.iter().zip(outcomes) {
            record(&mut report, name, output);
        }

        Ok(report)
    }

    fn command(
        &self,
        reflector: &Path,
        catalog: &ShaderCatalog,
        target: &PipelineTarget,
    ) -> ToolCommand {
        let binaries = target.stages.iter().filter_map(|stage_ref| {
            let stage = catalog.stage(*stage_ref);
            if stage.is_none() {
                tracing::error!(?stage_ref, "pipeline references an unknown stage");
            }
            stage.map(|stage| stage.artifact.binary.as_path())
        });

        self.toolchain
            .command(reflector)
            .args(binaries)
            .arg(&target.reflection_file)
            .arg(&target.shader_file)
    }
}

fn record(report: &mut ReflectReport, name: &str, output: ToolOutput) {
    if output.success {
        tracing::info!(pipeline = %name, "reflected pipeline");
        report.reflected += 1;
        return;
    }

    tracing::error!(pipeline = %name, output = %output.output.trim_end(), "pipeline reflection failed");
    report.failed += 1;
    report.success = false;
    report.errors.push_str(&format!("Reflection of pipeline '{}' failed:\n", name));
    report.errors.push_str(&output.output);
    if !output.output.ends_with('\n') {
        report.errors.push('\n');
    }
}
