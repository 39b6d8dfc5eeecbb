//! Shader stage kinds and their fixed compiler parameters.

use std::fmt;

/// Source extension shared by every stage file (`<name>.<tag>.glsl`).
pub const SOURCE_EXTENSION: &str = "glsl";

/// One programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageKind {
    Vertex,
    Fragment,
    TessControl,
    TessEvaluation,
    Geometry,
    Compute,
}

/// Static per-stage compiler parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageInfo {
    /// File name tag, e.g. `frag` in `lit.frag.glsl`
    pub tag: &'static str,
    /// Value passed to the compiler's `-S` flag
    pub compiler_flag: &'static str,
    /// Value passed to the compiler's `-e` flag
    pub entry_point: &'static str,
}

const STAGE_TABLE: [(StageKind, StageInfo); 6] = [
    (StageKind::Vertex, StageInfo { tag: "vert", compiler_flag: "vert", entry_point: "mainVS" }),
    (StageKind::Fragment, StageInfo { tag: "frag", compiler_flag: "frag", entry_point: "mainFS" }),
    (
        StageKind::TessControl,
        StageInfo { tag: "tesc", compiler_flag: "tesc", entry_point: "mainTC" },
    ),
    (
        StageKind::TessEvaluation,
        StageInfo { tag: "tese", compiler_flag: "tese", entry_point: "mainTE" },
    ),
    (StageKind::Geometry, StageInfo { tag: "geom", compiler_flag: "geom", entry_point: "mainGeo" }),
    (StageKind::Compute, StageInfo { tag: "comp", compiler_flag: "comp", entry_point: "mainComp" }),
];

impl StageKind {
    /// All stage kinds in discovery order.
    pub const ALL: [StageKind; 6] = [
        StageKind::Vertex,
        StageKind::Fragment,
        StageKind::TessControl,
        StageKind::TessEvaluation,
        StageKind::Geometry,
        StageKind::Compute,
    ];

    /// Fixed compiler parameters for this stage.
    pub fn info(self) -> &'static StageInfo {
        &STAGE_TABLE[self as usize].1
    }

    pub fn tag(self) -> &'static str {
        self.info().tag
    }

    pub fn compiler_flag(self) -> &'static str {
        self.info().compiler_flag
    }

    pub fn entry_point(self) -> &'static str {
        self.info().entry_point
    }

    /// Look up a stage by its file name tag.
    pub fn from_tag(tag: &str) -> Option<StageKind> {
        STAGE_TABLE.iter().find(|(_, info)| info.tag == tag).map(|(kind, _)| *kind)
    }

    /// File name suffix matched during discovery, e.g. `.frag.glsl`.
    pub fn file_suffix(self) -> String {
        format!(".{}.{}", self.tag(), SOURCE_EXTENSION)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_indexed_by_kind() {
        for kind in StageKind::ALL {
            assert_eq!(STAGE_TABLE[kind as usize].0, kind);
        }
    }

    #[test]
    fn test_entry_points() {
        assert_eq!(StageKind::Vertex.entry_point(), "mainVS");
        assert_eq!(StageKind::Fragment.entry_point(), "mainFS");
        assert_eq!(StageKind::TessControl.entry_point(), "mainTC");
        assert_eq!(StageKind::TessEvaluation.entry_point(), "mainTE");
        assert_eq!(StageKind::Geometry.entry_point(), "mainGeo");
        assert_eq!(StageKind::Compute.entry_point(), "mainComp");
    }

    #[test]
    fn test_from_tag() {
        assert_eq!(StageKind::from_tag("tese"), Some(StageKind::TessEvaluation));
        assert_eq!(StageKind::from_tag("comp"), Some(StageKind::Compute));
        assert_eq!(StageKind::from_tag("pixel"), None);
    }

    #[test]
    fn test_file_suffix() {
        assert_eq!(StageKind::Fragment.file_suffix(), ".frag.glsl");
        assert_eq!(StageKind::Geometry.to_string(), "geom");
    }
}
