//! Geometric passes of one refinement iteration.
//!
//! Transform accumulation follows a fold/reduce discipline: every worker
//! builds private per-transform partial sums over a chunk of structures and
//! the partials are merged once, so no transform is ever written concurrently.
//! Per-structure results (positions, ray samples) are computed in parallel and
//! written back serially.

use super::Database;
use crate::model::{
    normalize_translations, CentroidSums, Feature, FeatureId, Structure, StructureId, Viewpoint,
};
use crate::refine::RecomputeMode;
use crate::types::{Mat3, Real, Vec3};
use log::debug;
use serde::Serialize;
use slab::Slab;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Outcome of the pose estimation pass.
#[derive(Clone, Copy, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseUpdate {
    /// Transforms with at least one contributing pair.
    pub estimated: usize,
    /// Mean translation norm divided out, when renormalisation applied.
    pub scale: Option<Real>,
    /// Largest translation change over the recomputed transforms.
    pub max_shift: Real,
}

fn per_transform<T, F>(
    ids: &[StructureId],
    len: usize,
    zero: T,
    #[cfg_attr(not(feature = "parallel"), allow(unused_variables))] merge: fn(&mut T, &T),
    contribute: F,
) -> Vec<T>
where
    T: Clone + Send + Sync,
    F: Fn(&mut [T], StructureId) + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        ids.par_iter()
            .fold(
                || vec![zero.clone(); len],
                |mut acc, &id| {
                    contribute(acc.as_mut_slice(), id);
                    acc
                },
            )
            .reduce(
                || vec![zero.clone(); len],
                |mut left, right| {
                    for (l, r) in left.iter_mut().zip(&right) {
                        merge(l, r);
                    }
                    left
                },
            )
    }
    #[cfg(not(feature = "parallel"))]
    {
        ids.iter().fold(vec![zero; len], |mut acc, &id| {
            contribute(acc.as_mut_slice(), id);
            acc
        })
    }
}

pub(super) fn map_structures<R, F>(ids: &[StructureId], f: F) -> Vec<(StructureId, R)>
where
    R: Send,
    F: Fn(StructureId) -> Option<R> + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        ids.par_iter()
            .filter_map(|&id| f(id).map(|r| (id, r)))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        ids.iter()
            .filter_map(|&id| f(id).map(|r| (id, r)))
            .collect()
    }
}

#[inline]
fn model(viewpoints: &[Viewpoint], id: FeatureId) -> &Vec3 {
    &viewpoints[id.viewpoint].features[id.index].model
}

/// Consecutive member pairs of `id` whose transform index is at least `start`.
fn pairs_from(
    structures: &Slab<Structure>,
    id: StructureId,
    start: usize,
) -> impl Iterator<Item = (FeatureId, FeatureId)> + '_ {
    structures
        .get(id.0)
        .into_iter()
        .flat_map(|s| s.consecutive_pairs())
        .filter(move |(first, _)| first.viewpoint >= start)
}

impl Database {
    /// First transform recomputed in `mode`.
    pub fn transform_start(&self, mode: RecomputeMode) -> usize {
        match mode {
            RecomputeMode::Full => 0,
            RecomputeMode::Last => self.transforms.len().saturating_sub(1),
        }
    }

    /// Refresh `direction × radius` for the features feeding recomputed
    /// transforms.
    pub fn compute_models(&mut self, mode: RecomputeMode) {
        let start = self.transform_start(mode);
        let targets = &mut self.viewpoints[start..];
        #[cfg(feature = "parallel")]
        {
            targets
                .par_iter_mut()
                .for_each(|vp| vp.features.iter_mut().for_each(Feature::compute_model));
        }
        #[cfg(not(feature = "parallel"))]
        {
            targets
                .iter_mut()
                .for_each(|vp| vp.features.iter_mut().for_each(Feature::compute_model));
        }
    }

    pub fn compute_centroids(&mut self, mode: RecomputeMode) {
        let start = self.transform_start(mode);
        let len = self.transforms.len();
        for t in &mut self.transforms[start..] {
            t.reset();
        }
        let structures = &self.structures;
        let viewpoints = &self.viewpoints;
        let sums = per_transform(
            self.scoped_structures(mode),
            len,
            CentroidSums::default(),
            |acc, other| acc.merge(other),
            |acc, id| {
                for (first, second) in pairs_from(structures, id, start) {
                    acc[first.viewpoint].add(model(viewpoints, first), model(viewpoints, second));
                }
            },
        );
        for (t, s) in self.transforms[start..].iter_mut().zip(&sums[start..]) {
            t.set_centroids(s);
        }
    }

    pub fn compute_correlations(&mut self, mode: RecomputeMode) {
        let start = self.transform_start(mode);
        let structures = &self.structures;
        let viewpoints = &self.viewpoints;
        let transforms = &self.transforms;
        let correlations = per_transform(
            self.scoped_structures(mode),
            transforms.len(),
            Mat3::zeros(),
            |acc, other| *acc += other,
            |acc, id| {
                for (first, second) in pairs_from(structures, id, start) {
                    let j = first.viewpoint;
                    acc[j] += transforms[j]
                        .correlation_term(model(viewpoints, first), model(viewpoints, second));
                }
            },
        );
        for (t, c) in self.transforms[start..].iter_mut().zip(&correlations[start..]) {
            t.set_correlation(*c);
        }
    }

    /// Estimate recomputed transforms, then renormalise every translation.
    pub fn compute_poses(&mut self, mode: RecomputeMode) -> PoseUpdate {
        let start = self.transform_start(mode);
        let mut update = PoseUpdate::default();
        for t in &mut self.transforms[start..] {
            if t.compute_pose() {
                update.estimated += 1;
            }
        }
        update.scale = normalize_translations(&mut self.transforms);
        update.max_shift = self.transforms[start..]
            .iter()
            .map(|t| t.shift())
            .fold(0.0, Real::max);
        update
    }

    /// Chain absolute frames from the fixed first viewpoint.
    ///
    /// Always starts at viewpoint 0: renormalisation rescales every
    /// translation, so every frame after the first moves.
    pub fn compute_frames(&mut self) {
        let Some(first) = self.viewpoints.first_mut() else {
            return;
        };
        first.reset_frame();
        for (j, t) in self.transforms.iter().enumerate() {
            let (orientation, position) = {
                let vp = &self.viewpoints[j];
                t.chain(&vp.orientation, &vp.position)
            };
            let next = &mut self.viewpoints[j + 1];
            next.orientation = orientation;
            next.position = position;
        }
    }

    /// Re-triangulate every structure. Returns how many were degenerate and
    /// kept their previous position.
    ///
    /// Runs over all structures in both modes: renormalisation rescales every
    /// frame, so type C positions would otherwise keep the previous scale. In
    /// [`RecomputeMode::Last`] type A structures use every viewpoint while type
    /// B and C structures leave out the newest one.
    pub fn compute_optimals(&mut self, mode: RecomputeMode) -> usize {
        let Some(newest) = self.newest() else {
            return 0;
        };
        let ids: Vec<StructureId> = self.partition.all().to_vec();
        let (type_a, _, _) = self.partition.counts();
        let cutoff_for = |position: usize| match mode {
            RecomputeMode::Last if position >= type_a => newest.saturating_sub(1),
            _ => newest,
        };
        let structures = &self.structures;
        let viewpoints = &self.viewpoints;
        let solve = |(position, id): (usize, &StructureId)| {
            let s = structures.get(id.0)?;
            Some((position, s.optimal_position(viewpoints, cutoff_for(position))))
        };
        #[cfg(feature = "parallel")]
        let positions: Vec<(usize, Option<Vec3>)> =
            ids.par_iter().enumerate().filter_map(solve).collect();
        #[cfg(not(feature = "parallel"))]
        let positions: Vec<(usize, Option<Vec3>)> =
            ids.iter().enumerate().filter_map(solve).collect();

        let mut degenerate = 0usize;
        for (position, solved) in positions {
            match solved {
                Some(p) => {
                    if let Some(s) = self.structures.get_mut(ids[position].0) {
                        s.position = p;
                    }
                }
                None => degenerate += 1,
            }
        }
        if degenerate > 0 {
            debug!("optimals: {degenerate} degenerate structure(s) kept their position");
        }
        degenerate
    }

    /// Project every structure position back onto its member rays.
    pub fn compute_radii(&mut self) {
        let structures = &self.structures;
        let viewpoints = &self.viewpoints;
        let samples = map_structures(self.partition.all(), |id| {
            structures.get(id.0).map(|s| s.ray_samples(viewpoints))
        });
        for (_, rays) in samples {
            for ray in rays {
                let f = &mut self.viewpoints[ray.feature.viewpoint].features[ray.feature.index];
                f.radius = ray.radius;
                f.disparity = ray.disparity;
            }
        }
    }

    /// Distance between the newest and the first viewpoint positions.
    pub fn trajectory_span(&self) -> Real {
        match (self.viewpoints.first(), self.viewpoints.last()) {
            (Some(first), Some(last)) => (last.position - first.position).norm(),
            _ => 0.0,
        }
    }
}
