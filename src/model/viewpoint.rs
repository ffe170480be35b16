use super::{Feature, FeatureId};
use crate::source::ViewpointFrame;
use crate::types::{Mat3, Vec3};

/// One pose of the trajectory with the features observed from it.
///
/// `orientation` maps directions of this viewpoint's frame into the world
/// frame (the frame of viewpoint 0); `position` is its centre in world.
#[derive(Clone, Debug)]
pub struct Viewpoint {
    pub index: usize,
    pub uid: String,
    pub features: Vec<Feature>,
    pub orientation: Mat3,
    pub position: Vec3,
}

impl Viewpoint {
    pub fn from_frame(frame: ViewpointFrame) -> Self {
        let index = frame.index;
        let features = frame
            .observations
            .iter()
            .map(|obs| Feature::from_observation(index, obs))
            .collect();
        Self {
            index,
            uid: frame.uid,
            features,
            orientation: Mat3::identity(),
            position: Vec3::zeros(),
        }
    }

    pub fn reset_frame(&mut self) {
        self.orientation = Mat3::identity();
        self.position = Vec3::zeros();
    }

    pub fn feature_id(&self, index: usize) -> FeatureId {
        FeatureId::new(self.index, index)
    }

    /// World-frame unit ray of a local direction.
    #[inline]
    pub fn world_ray(&self, direction: &Vec3) -> Vec3 {
        self.orientation * direction
    }
}
