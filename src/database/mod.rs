//! State of the reconstruction and the geometric passes run over it.
//!
//! The [`Database`] owns the viewpoints (and through them every feature), one
//! [`Transform`] per consecutive viewpoint pair, the structure arena and the
//! Type A/B/C [`Partition`] over it. Mutations that change the structure set
//! go through [`Database::create_structure`], [`Database::attach`] and
//! [`Database::remove_structures`], which keep back-references and partition
//! ranges consistent.
//!
//! Submodules:
//! - `passes`: model points, centroids, correlations, poses, frames, optimal
//!   positions and radii, scoped by [`RecomputeMode`].
//! - `statistics`: pass-scoped radius/disparity summaries.
//! - `filters`: outlier rejection with detach + partition bookkeeping.
//! - `sanity`: the full invariant audit.

mod filters;
mod partition;
mod passes;
mod sanity;
mod statistics;

pub use partition::{Partition, RemovalCounts, StructureType};
pub use passes::PoseUpdate;
pub use statistics::{PassStatistics, Summary};

use crate::error::{Error, InvariantViolation, Result};
use crate::model::{Feature, FeatureId, Structure, StructureId, Transform, Viewpoint};
use crate::refine::RecomputeMode;
use crate::types::{PointCloud, PoseRecord, Trajectory};
use log::debug;
use slab::Slab;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct Database {
    viewpoints: Vec<Viewpoint>,
    transforms: Vec<Transform>,
    structures: Slab<Structure>,
    partition: Partition,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn viewpoints(&self) -> &[Viewpoint] {
        &self.viewpoints
    }

    pub fn viewpoint_count(&self) -> usize {
        self.viewpoints.len()
    }

    /// Index of the newest viewpoint.
    pub fn newest(&self) -> Option<usize> {
        self.viewpoints.len().checked_sub(1)
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(id.0)
    }

    pub fn structures(&self) -> impl Iterator<Item = (StructureId, &Structure)> + '_ {
        self.structures.iter().map(|(k, s)| (StructureId(k), s))
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.viewpoints.get(id.viewpoint)?.features.get(id.index)
    }

    /// The `window` most recent viewpoints, oldest first. Called before a new
    /// viewpoint is pushed, this is the correspondence window of that viewpoint.
    pub fn recent(&self, window: usize) -> &[Viewpoint] {
        let start = self.viewpoints.len().saturating_sub(window);
        &self.viewpoints[start..]
    }

    /// Append the next viewpoint of the sequence.
    ///
    /// Every existing structure becomes type C: nothing references the new
    /// viewpoint until aggregation runs.
    pub fn push_viewpoint(&mut self, viewpoint: Viewpoint) -> Result<()> {
        let expected = self.viewpoints.len();
        if viewpoint.index != expected {
            return Err(Error::OutOfOrder {
                expected,
                found: viewpoint.index,
            });
        }
        if !self.viewpoints.is_empty() {
            self.transforms.push(Transform::default());
        }
        debug!(
            "database: viewpoint {} ({}) with {} features",
            viewpoint.index,
            viewpoint.uid,
            viewpoint.features.len()
        );
        self.viewpoints.push(viewpoint);
        self.partition.demote_all();
        Ok(())
    }

    fn feature_mut(&mut self, id: FeatureId) -> &mut Feature {
        &mut self.viewpoints[id.viewpoint].features[id.index]
    }

    /// Every id passed to [`Database::link`] goes through here first, so
    /// `feature_mut` only ever sees existing features.
    fn ensure_unowned(&self, id: FeatureId) -> Result<()> {
        let feature = self.feature(id).ok_or(Error::UnknownFeature(id))?;
        match feature.structure {
            Some(owner) => Err(InvariantViolation::FeatureAlreadyOwned { feature: id, owner }.into()),
            None => Ok(()),
        }
    }

    /// Create a structure from unowned features of distinct viewpoints.
    ///
    /// Fails with [`Error::UnknownFeature`] when a member does not exist.
    pub fn create_structure(&mut self, members: &[FeatureId]) -> Result<StructureId> {
        for &id in members {
            self.ensure_unowned(id)?;
        }
        let id = StructureId(self.structures.insert(Structure::new()));
        for &feature in members {
            if !self.link(id, feature) {
                let viewpoint = feature.viewpoint;
                self.discard(id);
                return Err(InvariantViolation::DuplicateViewpoint {
                    structure: id,
                    viewpoint,
                }
                .into());
            }
        }
        let ty = self.classify(id);
        self.partition.insert(id, ty);
        Ok(id)
    }

    /// Add `feature` to an existing structure.
    ///
    /// Returns `Ok(false)` when the structure already holds a feature of that
    /// viewpoint. Attaching an owned feature is an invariant violation. The
    /// caller refreshes the partition with [`Database::refresh_type`].
    pub fn attach(&mut self, structure: StructureId, feature: FeatureId) -> Result<bool> {
        self.ensure_unowned(feature)?;
        Ok(self.link(structure, feature))
    }

    fn link(&mut self, structure: StructureId, feature: FeatureId) -> bool {
        let Some(s) = self.structures.get_mut(structure.0) else {
            return false;
        };
        if !s.insert(feature) {
            return false;
        }
        let f = self.feature_mut(feature);
        f.structure = Some(structure);
        f.reset();
        true
    }

    fn discard(&mut self, id: StructureId) {
        if let Some(s) = self.structures.try_remove(id.0) {
            for &f in s.features() {
                self.feature_mut(f).structure = None;
            }
        }
    }

    fn classify(&self, id: StructureId) -> StructureType {
        match self.structures.get(id.0) {
            Some(s) => StructureType::classify(s, self.newest()),
            None => StructureType::C,
        }
    }

    /// Move a structure to the range matching its current classification.
    pub fn refresh_type(&mut self, id: StructureId) {
        let ty = self.classify(id);
        self.partition.reclassify(id, ty);
    }

    /// Remove structures, detaching every member feature first.
    pub fn remove_structures(&mut self, ids: &HashSet<StructureId>) -> RemovalCounts {
        for &id in ids {
            self.discard(id);
        }
        self.partition.remove_many(ids)
    }

    /// Positions of live structures with at least `min_size` features.
    pub fn point_cloud(&self, min_size: usize) -> PointCloud {
        PointCloud {
            points: self
                .partition
                .all()
                .iter()
                .filter_map(|id| self.structures.get(id.0))
                .filter(|s| s.len() >= min_size)
                .map(|s| s.position)
                .collect(),
        }
    }

    pub fn trajectory(&self) -> Trajectory {
        Trajectory {
            poses: self
                .viewpoints
                .iter()
                .map(|vp| PoseRecord {
                    index: vp.index,
                    uid: vp.uid.clone(),
                    orientation: vp.orientation,
                    position: vp.position,
                })
                .collect(),
        }
    }

    pub(crate) fn scoped_structures(&self, mode: RecomputeMode) -> &[StructureId] {
        match mode {
            RecomputeMode::Full => self.partition.all(),
            RecomputeMode::Last => self.partition.touching_newest(),
        }
    }
}
