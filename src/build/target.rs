//! Discovered shader stages, their intermediate artifacts, and pipeline targets.

use crate::build::StageKind;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One discovered stage source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceShaderFile {
    /// Absolute path to the `.glsl` source
    pub path: PathBuf,
    /// Stage this file compiles to
    pub kind: StageKind,
    /// Pipeline this stage belongs to (file name minus stage tag and extension)
    pub pipeline_name: String,
}

/// Per-stage compiler outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateArtifact {
    /// Compiled SPIR-V binary
    pub binary: PathBuf,
    /// Full compiler output of the last compile
    pub log: PathBuf,
    /// Human readable disassembly (only written when requested)
    pub disassembly: PathBuf,
}

impl IntermediateArtifact {
    /// Derive the artifact paths from a base path without extension.
    pub fn from_base(base: &Path) -> Self {
        Self {
            binary: with_suffix(base, "shader"),
            log: with_suffix(base, "log"),
            disassembly: with_suffix(base, "txt"),
        }
    }
}

/// A stage source together with its intermediate artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFile {
    pub source: SourceShaderFile,
    pub artifact: IntermediateArtifact,
}

/// Reference to a stage stored in [`ShaderCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageRef {
    pub kind: StageKind,
    pub index: usize,
}

/// One logical rendering pipeline built from one or more stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineTarget {
    /// Stages in discovery order; this order is passed verbatim to reflection
    pub stages: Vec<StageRef>,
    /// Combined shader blob
    pub shader_file: PathBuf,
    /// Reflection metadata
    pub reflection_file: PathBuf,
}

impl PipelineTarget {
    /// Create a pipeline target with no stages from a base path without extension.
    pub fn from_base(base: &Path) -> Self {
        Self {
            stages: Vec::new(),
            shader_file: with_suffix(base, "shader"),
            reflection_file: with_suffix(base, "ref"),
        }
    }

    /// Final outputs of this pipeline.
    pub fn outputs(&self) -> [&Path; 2] {
        [&self.reflection_file, &self.shader_file]
    }
}

/// Everything found by one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderCatalog {
    stages: BTreeMap<StageKind, Vec<StageFile>>,
    pipelines: BTreeMap<String, PipelineTarget>,
}

impl ShaderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage, creating its pipeline on first sight.
    ///
    /// `target_base` is only used when the pipeline does not exist yet.
    pub fn insert(&mut self, stage: StageFile, target_base: &Path) -> StageRef {
        let kind = stage.source.kind;
        let list = self.stages.entry(kind).or_default();
        let stage_ref = StageRef { kind, index: list.len() };

        self.pipelines
            .entry(stage.source.pipeline_name.clone())
            .or_insert_with(|| PipelineTarget::from_base(target_base))
            .stages
            .push(stage_ref);
        list.push(stage);

        stage_ref
    }

    /// Resolve a stage reference.
    pub fn stage(&self, stage_ref: StageRef) -> Option<&StageFile> {
        self.stages.get(&stage_ref.kind).and_then(|list| list.get(stage_ref.index))
    }

    /// Stage files of one kind in discovery order.
    pub fn stages_of(&self, kind: StageKind) -> &[StageFile] {
        self.stages.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All stages, grouped by kind in stage table order.
    pub fn stages(&self) -> impl Iterator<Item = (StageRef, &StageFile)> {
        self.stages.iter().flat_map(|(kind, list)| {
            list.iter()
                .enumerate()
                .map(move |(index, stage)| (StageRef { kind: *kind, index }, stage))
        })
    }

    pub fn pipeline(&self, name: &str) -> Option<&PipelineTarget> {
        self.pipelines.get(name)
    }

    pub fn pipelines(&self) -> &BTreeMap<String, PipelineTarget> {
        &self.pipelines
    }

    /// Find a pipeline stage of the given kind, if any.
    pub fn pipeline_stage(&self, name: &str, kind: StageKind) -> Option<&StageFile> {
        self.pipeline(name)?
            .stages
            .iter()
            .filter(|stage_ref| stage_ref.kind == kind)
            .find_map(|stage_ref| self.stage(*stage_ref))
    }

    pub fn stage_count(&self) -> usize {
        self.stages.values().map(Vec::len).sum()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

/// Append `.ext` to a path without replacing any existing extension.
fn with_suffix(base: &Path, ext: &str) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(".");
    path.push(ext);
    PathBuf::from(path)
}
