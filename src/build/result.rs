//! Build result types.
//!
//! Per-stage and per-pipeline failures are folded into one aggregate
//! success flag plus accumulated error text. Detailed compiler output for
//! each stage lives in that stage's log file, not here.

use std::collections::BTreeSet;
use std::time::Duration;

/// Outcome of compiling every stale stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    /// Pipelines with at least one successfully compiled stage this run
    pub touched: BTreeSet<String>,
    /// No stage failed
    pub success: bool,
    /// Concatenated output of failed compiles
    pub errors: String,
    pub compiled: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Default for StageReport {
    fn default() -> Self {
        Self {
            touched: BTreeSet::new(),
            success: true,
            errors: String::new(),
            compiled: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

/// Outcome of reflecting every touched pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectReport {
    pub success: bool,
    pub errors: String,
    pub reflected: usize,
    pub failed: usize,
}

impl Default for ReflectReport {
    fn default() -> Self {
        Self { success: true, errors: String::new(), reflected: 0, failed: 0 }
    }
}

/// Aggregate result of one shader build invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResult {
    /// Every stage and pipeline processed this run succeeded
    pub success: bool,
    /// Accumulated error text; empty on success
    pub errors: String,
    pub stages_compiled: usize,
    pub stages_skipped: usize,
    pub stages_failed: usize,
    pub pipelines_reflected: usize,
    pub pipelines_failed: usize,
    /// Total build duration
    pub duration: Duration,
}

impl Default for CompileResult {
    fn default() -> Self {
        Self::new()
    }
}

impl CompileResult {
    /// Create an empty, successful result.
    pub fn new() -> Self {
        Self {
            success: true,
            errors: String::new(),
            stages_compiled: 0,
            stages_skipped: 0,
            stages_failed: 0,
            pipelines_reflected: 0,
            pipelines_failed: 0,
            duration: Duration::ZERO,
        }
    }

    /// A run that failed before any unit of work was attempted.
    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, errors: error.into(), ..Self::new() }
    }

    /// Fold in the stage compile outcome.
    pub fn add_stages(&mut self, report: &StageReport) {
        self.success &= report.success;
        self.errors.push_str(&report.errors);
        self.stages_compiled += report.compiled;
        self.stages_skipped += report.skipped;
        self.stages_failed += report.failed;
    }

    /// Fold in the reflection outcome.
    pub fn add_reflection(&mut self, report: &ReflectReport) {
        self.success &= report.success;
        self.errors.push_str(&report.errors);
        self.pipelines_reflected += report.reflected;
        self.pipelines_failed += report.failed;
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Whether the run invoked no tool at all.
    pub fn is_up_to_date(&self) -> bool {
        self.stages_compiled == 0 && self.stages_failed == 0 && self.pipelines_reflected == 0
    }

    /// Format a one-line summary of the run.
    pub fn summary(&self) -> String {
        let verdict = if self.success { "Shader build succeeded" } else { "Shader build failed" };
        format!(
            "{}: {} stages compiled, {} up to date, {} failed; {} pipelines reflected, {} failed ({:.2}s)",
            verdict,
            self.stages_compiled,
            self.stages_skipped,
            self.stages_failed,
            self.pipelines_reflected,
            self.pipelines_failed,
            self.duration.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_result_is_success() {
        let result = CompileResult::new();
        assert!(result.is_success());
        assert!(result.is_up_to_date());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_failure() {
        let result = CompileResult::failure("tools missing");
        assert!(!result.is_success());
        assert_eq!(result.errors, "tools missing");
    }

    #[test]
    fn test_fold_reports() {
        let mut stages = StageReport::default();
        stages.compiled = 2;
        stages.failed = 1;
        stages.success = false;
        stages.errors.push_str("ERROR: a.frag.glsl\n");
        stages.touched.insert("b".to_string());

        let mut reflection = ReflectReport::default();
        reflection.reflected = 1;

        let mut result = CompileResult::new();
        result.add_stages(&stages);
        result.add_reflection(&reflection);

        assert!(!result.is_success());
        assert_eq!(result.stages_compiled, 2);
        assert_eq!(result.stages_failed, 1);
        assert_eq!(result.pipelines_reflected, 1);
        assert!(result.errors.contains("a.frag.glsl"));
        assert!(!result.is_up_to_date());
    }

    #[test]
    fn test_reflection_failure_clears_success() {
        let mut result = CompileResult::new();
        result.add_reflection(&ReflectReport {
            success: false,
            errors: "bad pipeline".to_string(),
            reflected: 0,
            failed: 1,
        });
        assert!(!result.is_success());
        assert_eq!(result.pipelines_failed, 1);
    }

    #[test]
    fn test_summary() {
        let mut result = CompileResult::new().with_duration(Duration::from_millis(1500));
        result.stages_compiled = 3;
        result.pipelines_reflected = 2;

        let summary = result.summary();
        assert!(summary.starts_with("Shader build succeeded"));
        assert!(summary.contains("3 stages compiled"));
        assert!(summary.contains("2 pipelines reflected"));
        assert!(summary.contains("1.50s"));
    }
}
