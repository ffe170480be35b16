//! Fixed-point refinement of poses and structure positions.
//!
//! One [`Refiner::refine`] call runs the inner loop for the newest viewpoint.
//! Every iteration walks the same chain of passes over the [`Database`]:
//!
//! 1) model points of the features feeding recomputed transforms,
//! 2) transform centroids and 3) correlations,
//! 4) Procrustes poses followed by global translation renormalisation,
//! 5) absolute frames chained from the first viewpoint,
//! 6) optimal positions and 7) feature radii/disparities of every structure,
//! 8) radius/disparity statistics,
//! 9) outlier filters (radius clamp, radius and disparity statistics, and the
//!    optional triangulation gate),
//! 10) the error: distance from the first to the newest viewpoint plus the
//!     largest disparity in the statistics scope.
//!
//! The loop stops once two successive errors differ by less than
//! `epsilon`. Nothing guarantees a monotone error; only the successive
//! difference is tested, with `max_iterations` as a safety cap.
//!
//! Below `bootstrap_viewpoints` every pass recomputes all transforms and
//! structures ([`RecomputeMode::Full`]). From there on only the newest
//! transform and the structures observed by the newest viewpoint are
//! recomputed ([`RecomputeMode::Last`]). Structure positions and radii are
//! still refreshed everywhere, since renormalisation rescales every frame.

use crate::database::{Database, PassStatistics};
use crate::diagnostics::timing::elapsed_ms;
use crate::diagnostics::{FilterReport, IterationReport, RefinementReport};
use crate::params::{FilterParams, ReconstructionParams, RefineParams};
use crate::types::Real;
use log::{debug, warn};
use serde::Serialize;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecomputeMode {
    /// Every transform and every structure.
    Full,
    /// The newest transform and the type A/B structures only.
    Last,
}

#[derive(Clone, Debug)]
pub struct Refiner {
    refine: RefineParams,
    filters: FilterParams,
    bootstrap_viewpoints: usize,
}

impl Refiner {
    pub fn new(params: &ReconstructionParams) -> Self {
        Self {
            refine: params.refine.clone(),
            filters: params.filters.clone(),
            bootstrap_viewpoints: params.bootstrap_viewpoints,
        }
    }

    pub fn mode_for(&self, viewpoints: usize) -> RecomputeMode {
        if viewpoints < self.bootstrap_viewpoints {
            RecomputeMode::Full
        } else {
            RecomputeMode::Last
        }
    }

    /// Run the inner loop in the mode implied by the viewpoint count.
    pub fn refine(&self, db: &mut Database) -> RefinementReport {
        let mode = self.mode_for(db.viewpoint_count());
        self.refine_with_mode(db, mode)
    }

    pub fn refine_with_mode(&self, db: &mut Database, mode: RecomputeMode) -> RefinementReport {
        let start = Instant::now();
        let mut previous: Real = 0.0;
        let mut iterations = Vec::new();
        let mut converged = false;
        for iteration in 0..self.refine.max_iterations.max(1) {
            let report = self.iterate(db, mode, iteration, previous);
            let (error, delta) = (report.error, report.delta);
            iterations.push(report);
            if !error.is_finite() {
                warn!("refine: non-finite error at iteration {iteration}, stopping");
                break;
            }
            if delta < self.refine.epsilon {
                converged = true;
                break;
            }
            previous = error;
        }
        let final_error = iterations.last().map_or(0.0, |it| it.error);
        if !converged {
            warn!(
                "refine: no convergence after {} iterations (error {:.6})",
                iterations.len(),
                final_error
            );
        }
        RefinementReport {
            mode,
            viewpoints: db.viewpoint_count(),
            converged,
            final_error,
            iterations,
            elapsed_ms: elapsed_ms(start),
        }
    }

    /// One pass of the fixed-point loop.
    pub fn iterate(
        &self,
        db: &mut Database,
        mode: RecomputeMode,
        iteration: usize,
        previous: Real,
    ) -> IterationReport {
        let start = Instant::now();
        db.compute_models(mode);
        db.compute_centroids(mode);
        db.compute_correlations(mode);
        let pose = db.compute_poses(mode);
        db.compute_frames();
        let degenerate_structures = db.compute_optimals(mode);
        db.compute_radii();
        let statistics = db.compute_statistics(mode);
        let filters = self.run_filters(db, mode, &statistics);

        let error = db.trajectory_span() + statistics.disparity.max;
        let delta = (error - previous).abs();
        debug!(
            "refine[{mode:?}] #{iteration}: error={error:.9} delta={delta:.3e} shift={:.3e} structures={}",
            pose.max_shift,
            db.structure_count()
        );
        IterationReport {
            iteration,
            error,
            delta,
            pose,
            degenerate_structures,
            statistics,
            filters,
            structures_after: db.structure_count(),
            elapsed_ms: elapsed_ms(start),
        }
    }

    fn run_filters(
        &self,
        db: &mut Database,
        mode: RecomputeMode,
        statistics: &PassStatistics,
    ) -> Vec<FilterReport> {
        let f = &self.filters;
        let mut reports = vec![
            db.filter_radius_clamp(f.radius_floor),
            db.filter_radius_statistics(mode, &statistics.radius, f.radius_multiplier),
            db.filter_disparity_statistics(mode, &statistics.disparity, f.disparity_multiplier),
        ];
        if let Some(gate) = &f.triangulation {
            reports.push(db.filter_triangulation(mode, gate));
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::model::Viewpoint;
    use crate::source::{CorrespondenceProvider, KeyMatcher};
    use crate::synthetic::Scene;

    fn three_viewpoints() -> Database {
        let mut db = Database::new();
        let aggregator = Aggregator::new(5);
        for frame in Scene::straight_line(3).frames(true) {
            let vp = Viewpoint::from_frame(frame);
            let table = KeyMatcher.correspondences(&vp, db.recent(5));
            db.push_viewpoint(vp).unwrap();
            aggregator.aggregate(&mut db, &table).unwrap();
        }
        db
    }

    #[test]
    fn mode_switches_at_bootstrap_count() {
        let refiner = Refiner::new(&ReconstructionParams {
            bootstrap_viewpoints: 4,
            ..ReconstructionParams::default()
        });
        assert_eq!(refiner.mode_for(3), RecomputeMode::Full);
        assert_eq!(refiner.mode_for(4), RecomputeMode::Last);
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let mut db = three_viewpoints();
        let refiner = Refiner::new(&ReconstructionParams {
            refine: RefineParams {
                max_iterations: 1,
                ..RefineParams::default()
            },
            ..ReconstructionParams::default()
        });
        let report = refiner.refine(&mut db);
        assert_eq!(report.iteration_count(), 1);
        assert!(!report.converged);
        // First error is measured against zero.
        assert!((report.iterations[0].delta - report.final_error).abs() < 1e-12);
    }

    #[test]
    fn second_pass_of_exact_data_is_stationary() {
        let mut db = three_viewpoints();
        let report = Refiner::new(&ReconstructionParams::default()).refine(&mut db);
        assert!(report.converged);
        assert_eq!(report.iteration_count(), 2);
        assert!((report.final_error - 2.0).abs() < 1e-9, "{}", report.final_error);
        let last = &report.iterations[1];
        assert!(last.pose.max_shift < 1e-9);
        assert_eq!(last.removed(), 0);
        assert_eq!(last.pose.estimated, 2);
    }
}
