use super::{AggregationReport, RefinementReport, TimingBreakdown};
use serde::Serialize;

/// What one driver step did.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum StepOutcome {
    /// The source is over.
    Exhausted,
    /// The source had nothing this time; the iteration was dropped.
    Dropped,
    /// A viewpoint was ingested, but too few exist for refinement.
    Deferred(StepReport),
    /// A viewpoint was ingested and the refinement loop ran.
    Refined(StepReport),
}

/// Per-step report of the driver.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub viewpoint: usize,
    pub uid: String,
    pub aggregation: AggregationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refinement: Option<RefinementReport>,
    pub structures: usize,
    /// Export artifacts that could not be written this step.
    pub export_failures: usize,
    pub timing: TimingBreakdown,
}

/// Totals over a complete run.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub viewpoints: usize,
    pub refined: usize,
    pub deferred: usize,
    pub dropped: usize,
    pub structures: usize,
    pub unconverged: usize,
    pub total_ms: f64,
    pub steps: Vec<StepReport>,
}
