//! Outer driver pulling one viewpoint per step through the core.
//!
//! A step ingests the next viewpoint, aggregates it with the correspondence
//! provider's match table, runs the refinement loop once enough viewpoints
//! exist, then exports the point list and the trajectory.
//!
//! ```no_run
//! use incremental_sfm::prelude::*;
//!
//! # fn main() -> incremental_sfm::Result<()> {
//! let frames = Scene::straight_line(6).frames(true);
//! let mut driver = Reconstructor::new(
//!     VecSource::new(frames),
//!     KeyMatcher,
//!     ReconstructionParams::default(),
//! )?;
//! let summary = driver.run()?;
//! println!("{} structures", summary.structures);
//! # Ok(())
//! # }
//! ```
//!
//! Invariant violations and contract errors from the collaborators end the
//! run. Export failures are logged and the pipeline continues.

use crate::aggregate::Aggregator;
use crate::database::Database;
use crate::diagnostics::timing::elapsed_ms;
use crate::diagnostics::{
    RefinementReport, RunSummary, StepOutcome, StepReport, TimingBreakdown,
};
use crate::error::Result;
use crate::io::{write_points_xyz, write_trajectory_xyz};
use crate::model::Viewpoint;
use crate::params::ReconstructionParams;
use crate::refine::Refiner;
use crate::source::{CorrespondenceProvider, ViewpointSource};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub struct Reconstructor<S, C> {
    source: S,
    matcher: C,
    db: Database,
    aggregator: Aggregator,
    refiner: Refiner,
    params: ReconstructionParams,
    export_dir: Option<PathBuf>,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl<S: ViewpointSource, C: CorrespondenceProvider> Reconstructor<S, C> {
    pub fn new(source: S, matcher: C, params: ReconstructionParams) -> Result<Self> {
        #[cfg(feature = "parallel")]
        let pool = match params.threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| crate::error::Error::ThreadPool(e.to_string()))?,
            ),
            None => None,
        };
        #[cfg(not(feature = "parallel"))]
        {
            if params.threads.is_some() {
                debug!("pipeline: built without `parallel`, ignoring thread count");
            }
        }
        Ok(Self {
            source,
            matcher,
            db: Database::new(),
            aggregator: Aggregator::new(params.window),
            refiner: Refiner::new(&params),
            params,
            export_dir: None,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    /// Write `<index>_structure.xyz` and `<index>_odometry.xyz` into `dir`
    /// after every refined step.
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn params(&self) -> &ReconstructionParams {
        &self.params
    }

    /// Pull and process at most one viewpoint.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if !self.source.has_next() {
            return Ok(StepOutcome::Exhausted);
        }
        let Some(frame) = self.source.next_viewpoint() else {
            debug!("pipeline: no viewpoint available, dropping iteration");
            return Ok(StepOutcome::Dropped);
        };
        let total = Instant::now();
        let mut timing = TimingBreakdown::default();

        let stage = Instant::now();
        let viewpoint = Viewpoint::from_frame(frame);
        let (index, uid) = (viewpoint.index, viewpoint.uid.clone());
        let table = self
            .matcher
            .correspondences(&viewpoint, self.db.recent(self.aggregator.window()));
        timing.lap("correspondences", stage);

        let stage = Instant::now();
        self.db.push_viewpoint(viewpoint)?;
        let aggregation = self.aggregator.aggregate(&mut self.db, &table)?;
        if self.params.check_invariants {
            self.db.check_invariants()?;
        }
        timing.lap("aggregate", stage);

        let mut report = StepReport {
            viewpoint: index,
            uid,
            aggregation,
            refinement: None,
            structures: self.db.structure_count(),
            export_failures: 0,
            timing,
        };
        if self.db.viewpoint_count() < self.params.effective_min_viewpoints() {
            report.timing.total_ms = elapsed_ms(total);
            debug!(
                "pipeline: viewpoint {index} deferred ({} of {} needed)",
                self.db.viewpoint_count(),
                self.params.effective_min_viewpoints()
            );
            return Ok(StepOutcome::Deferred(report));
        }

        let stage = Instant::now();
        let refinement = self.refine();
        if self.params.check_invariants {
            self.db.check_invariants()?;
        }
        report.timing.lap("refine", stage);

        let stage = Instant::now();
        report.export_failures = self.export(index);
        report.timing.lap("export", stage);

        report.structures = self.db.structure_count();
        report.timing.total_ms = elapsed_ms(total);
        info!(
            "viewpoint {index}: {:?} {} iteration(s), error {:.6}, {} structures{}",
            refinement.mode,
            refinement.iteration_count(),
            refinement.final_error,
            report.structures,
            if refinement.converged { "" } else { " (not converged)" }
        );
        report.refinement = Some(refinement);
        Ok(StepOutcome::Refined(report))
    }

    /// Step until the source is exhausted.
    pub fn run(&mut self) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::default();
        loop {
            match self.step()? {
                StepOutcome::Exhausted => break,
                StepOutcome::Dropped => summary.dropped += 1,
                StepOutcome::Deferred(report) => {
                    summary.deferred += 1;
                    summary.steps.push(report);
                }
                StepOutcome::Refined(report) => {
                    summary.refined += 1;
                    if report.refinement.as_ref().is_some_and(|r| !r.converged) {
                        summary.unconverged += 1;
                    }
                    summary.steps.push(report);
                }
            }
        }
        summary.viewpoints = self.db.viewpoint_count();
        summary.structures = self.db.structure_count();
        summary.total_ms = elapsed_ms(start);
        Ok(summary)
    }

    fn refine(&mut self) -> RefinementReport {
        let (refiner, db) = (&self.refiner, &mut self.db);
        #[cfg(feature = "parallel")]
        {
            if let Some(pool) = &self.pool {
                return pool.install(|| refiner.refine(db));
            }
        }
        refiner.refine(db)
    }

    /// Returns the number of artifacts that failed to write.
    fn export(&self, index: usize) -> usize {
        let Some(dir) = &self.export_dir else {
            return 0;
        };
        let mut failures = 0;
        let cloud = self.db.point_cloud(self.params.min_structure_size);
        let structure_path = export_path(dir, index, "structure");
        if let Err(err) = write_points_xyz(&structure_path, &cloud) {
            warn!("pipeline: {err}");
            failures += 1;
        }
        let odometry_path = export_path(dir, index, "odometry");
        if let Err(err) = write_trajectory_xyz(&odometry_path, &self.db.trajectory()) {
            warn!("pipeline: {err}");
            failures += 1;
        }
        failures
    }
}

fn export_path(dir: &Path, index: usize, kind: &str) -> PathBuf {
    dir.join(format!("{index}_{kind}.xyz"))
}
