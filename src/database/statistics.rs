use super::{Database, StructureType};
use crate::model::structure_feature;
use crate::refine::RecomputeMode;
use crate::types::Real;
use serde::Serialize;

/// Standard deviations at or below this are treated as "no spread".
const MIN_SPREAD: Real = 1e-9;

/// Sample mean, standard deviation (n - 1) and maximum of one quantity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub count: usize,
    pub mean: Real,
    pub std_dev: Real,
    pub max: Real,
}

impl Summary {
    pub fn from_samples(samples: &[Real]) -> Self {
        let count = samples.len();
        if count == 0 {
            return Self::default();
        }
        let mean = samples.iter().sum::<Real>() / count as Real;
        let std_dev = if count > 1 {
            let ss: Real = samples.iter().map(|v| (v - mean) * (v - mean)).sum();
            (ss / (count - 1) as Real).sqrt()
        } else {
            0.0
        };
        let max = samples.iter().copied().fold(Real::NEG_INFINITY, Real::max);
        Self {
            count,
            mean,
            std_dev,
            max,
        }
    }

    /// Whether a statistics filter can use this summary.
    pub fn has_spread(&self) -> bool {
        self.count >= 2 && self.std_dev.is_finite() && self.std_dev > MIN_SPREAD
    }
}

/// Radius and disparity summaries of one refinement iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassStatistics {
    pub radius: Summary,
    pub disparity: Summary,
}

impl Database {
    /// Summarise radius and disparity over the features in scope.
    ///
    /// [`RecomputeMode::Full`] covers every member feature. In
    /// [`RecomputeMode::Last`] only features of the newest viewpoint inside
    /// type A structures count.
    pub fn compute_statistics(&self, mode: RecomputeMode) -> PassStatistics {
        let (ids, from_viewpoint) = match mode {
            RecomputeMode::Full => (self.partition.all(), 0),
            RecomputeMode::Last => (
                self.partition.range(StructureType::A),
                self.newest().unwrap_or(0),
            ),
        };
        let mut radii = Vec::new();
        let mut disparities = Vec::new();
        for s in ids.iter().filter_map(|id| self.structures.get(id.0)) {
            for &fid in s.features().iter().filter(|f| f.viewpoint >= from_viewpoint) {
                let f = structure_feature(&self.viewpoints, fid);
                radii.push(f.radius);
                disparities.push(f.disparity);
            }
        }
        PassStatistics {
            radius: Summary::from_samples(&radii),
            disparity: Summary::from_samples(&disparities),
        }
    }
}
