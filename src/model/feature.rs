use super::StructureId;
use crate::source::Observation;
use crate::types::{Real, Vec2, Vec3};

/// One observed ray of a viewpoint.
///
/// `direction` is a unit vector in the viewpoint's own frame. `model` is the
/// same ray scaled by the current `radius`, i.e. the estimated point in that
/// frame, and feeds the pairwise pose estimation.
#[derive(Clone, Debug)]
pub struct Feature {
    pub viewpoint: usize,
    pub pixel: Option<Vec2>,
    pub direction: Vec3,
    /// Measured distance for 3D observations.
    pub range: Option<Real>,
    /// Raw keypoint identity used by key-based correspondence.
    pub key: Option<u64>,
    pub model: Vec3,
    pub radius: Real,
    pub disparity: Real,
    pub structure: Option<StructureId>,
}

impl Feature {
    pub fn from_observation(viewpoint: usize, observation: &Observation) -> Self {
        let norm = observation.direction.norm();
        let direction = if norm > 0.0 {
            observation.direction / norm
        } else {
            observation.direction
        };
        let mut feature = Self {
            viewpoint,
            pixel: observation.pixel,
            direction,
            range: observation.range,
            key: observation.key,
            model: Vec3::zeros(),
            radius: 1.0,
            disparity: 0.0,
            structure: None,
        };
        feature.reset();
        feature
    }

    /// Restore the initial depth guess: the measured range, or unit depth.
    pub fn reset(&mut self) {
        self.radius = self.range.unwrap_or(1.0);
        self.disparity = 0.0;
        self.compute_model();
    }

    #[inline]
    pub fn compute_model(&mut self) {
        self.model = self.direction * self.radius;
    }
}
