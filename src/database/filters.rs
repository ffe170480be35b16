use super::passes::map_structures;
use super::{Database, StructureType, Summary};
use crate::diagnostics::{FilterKind, FilterReport};
use crate::model::{Structure, StructureId, Viewpoint};
use crate::params::TriangulationGate;
use crate::refine::RecomputeMode;
use crate::types::Real;
use log::debug;
use std::collections::HashSet;

impl Database {
    /// Structures examined by the statistics filters: everything in
    /// [`RecomputeMode::Full`], type A only in [`RecomputeMode::Last`].
    fn statistics_scope(&self, mode: RecomputeMode) -> Vec<StructureId> {
        match mode {
            RecomputeMode::Full => self.partition.all().to_vec(),
            RecomputeMode::Last => self.partition.range(StructureType::A).to_vec(),
        }
    }

    /// Evaluate `reject` over `ids`, then remove the rejected structures.
    fn apply_filter<P>(&mut self, kind: FilterKind, ids: Vec<StructureId>, reject: P) -> FilterReport
    where
        P: Fn(&Structure, &[Viewpoint]) -> bool + Send + Sync,
    {
        let structures = &self.structures;
        let viewpoints = &self.viewpoints;
        let rejected: HashSet<StructureId> = map_structures(&ids, |id| {
            let s = structures.get(id.0)?;
            reject(s, viewpoints).then_some(())
        })
        .into_iter()
        .map(|(id, ())| id)
        .collect();
        let counts = self.remove_structures(&rejected);
        if counts.total() > 0 {
            debug!(
                "filter {:?}: removed {} of {} (A={} B={} C={})",
                kind,
                counts.total(),
                ids.len(),
                counts.a,
                counts.b,
                counts.c
            );
        }
        FilterReport {
            kind,
            examined: ids.len(),
            removed: counts.total(),
            removed_a: counts.a,
            removed_b: counts.b,
            removed_c: counts.c,
            skipped: false,
        }
    }

    /// Reject structures with any member radius below `floor`. Examines every
    /// structure regardless of mode.
    pub fn filter_radius_clamp(&mut self, floor: Real) -> FilterReport {
        let ids = self.partition.all().to_vec();
        self.apply_filter(FilterKind::RadiusClamp, ids, |s, vps| s.radius_below(vps, floor))
    }

    /// Reject structures with a member radius further than
    /// `multiplier × σ` from the mean radius.
    pub fn filter_radius_statistics(
        &mut self,
        mode: RecomputeMode,
        radius: &Summary,
        multiplier: Real,
    ) -> FilterReport {
        if !radius.has_spread() {
            return FilterReport::skipped(FilterKind::RadiusStatistics);
        }
        let (mean, bound) = (radius.mean, multiplier * radius.std_dev);
        let ids = self.statistics_scope(mode);
        self.apply_filter(FilterKind::RadiusStatistics, ids, |s, vps| {
            s.radius_deviates(vps, mean, bound)
        })
    }

    /// Reject structures with a member disparity above `multiplier × σ`.
    pub fn filter_disparity_statistics(
        &mut self,
        mode: RecomputeMode,
        disparity: &Summary,
        multiplier: Real,
    ) -> FilterReport {
        if !disparity.has_spread() {
            return FilterReport::skipped(FilterKind::DisparityStatistics);
        }
        let bound = multiplier * disparity.std_dev;
        let ids = self.statistics_scope(mode);
        self.apply_filter(FilterKind::DisparityStatistics, ids, |s, vps| {
            s.disparity_above(vps, bound)
        })
    }

    /// Reject structures seen under a pairwise angle outside the gate.
    pub fn filter_triangulation(
        &mut self,
        mode: RecomputeMode,
        gate: &TriangulationGate,
    ) -> FilterReport {
        let (min_rad, max_rad) = (
            gate.min_angle_deg.to_radians(),
            gate.max_angle_deg.to_radians(),
        );
        let ids = self.scoped_structures(mode).to_vec();
        self.apply_filter(FilterKind::Triangulation, ids, |s, vps| {
            s.triangulation_outside(vps, min_rad, max_rad)
        })
    }
}
