use crate::database::{PassStatistics, PoseUpdate};
use crate::refine::RecomputeMode;
use crate::types::Real;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKind {
    RadiusClamp,
    RadiusStatistics,
    DisparityStatistics,
    Triangulation,
}

/// Outcome of one filter pass, with removals split by partition range.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterReport {
    pub kind: FilterKind,
    pub examined: usize,
    pub removed: usize,
    pub removed_a: usize,
    pub removed_b: usize,
    pub removed_c: usize,
    /// The pass did not run (statistics without spread).
    pub skipped: bool,
}

impl FilterReport {
    pub fn skipped(kind: FilterKind) -> Self {
        Self {
            kind,
            examined: 0,
            removed: 0,
            removed_a: 0,
            removed_b: 0,
            removed_c: 0,
            skipped: true,
        }
    }
}

/// Trace of one inner iteration of the refinement loop.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationReport {
    pub iteration: usize,
    pub error: Real,
    /// `|error - previous error|`, compared against epsilon.
    pub delta: Real,
    pub pose: PoseUpdate,
    pub degenerate_structures: usize,
    pub statistics: PassStatistics,
    pub filters: Vec<FilterReport>,
    pub structures_after: usize,
    pub elapsed_ms: f64,
}

impl IterationReport {
    pub fn removed(&self) -> usize {
        self.filters.iter().map(|f| f.removed).sum()
    }
}

/// Full trace of one refinement run (one outer step).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementReport {
    pub mode: RecomputeMode,
    pub viewpoints: usize,
    pub converged: bool,
    pub final_error: Real,
    pub iterations: Vec<IterationReport>,
    pub elapsed_ms: f64,
}

impl RefinementReport {
    pub fn iteration_count(&self) -> usize {
        self.iterations.len()
    }
}
