//! Serializable reports produced by the aggregator, the refinement engine and
//! the driver.
//!
//! Reports are plain data: the pipeline fills them while it runs and the demo
//! dumps them as JSON. Nothing in the library reads them back.

pub mod aggregation;
pub mod pipeline;
pub mod refine;
pub mod timing;

pub use aggregation::AggregationReport;
pub use pipeline::{RunSummary, StepOutcome, StepReport};
pub use refine::{FilterKind, FilterReport, IterationReport, RefinementReport};
pub use timing::{StageTiming, TimingBreakdown};
