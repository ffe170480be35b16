use nalgebra::{Matrix3, Vector2, Vector3};
use serde::Serialize;

pub type Real = f64;

pub type Vec2 = Vector2<Real>;
pub type Vec3 = Vector3<Real>;
pub type Mat3 = Matrix3<Real>;

/// Absolute frame of one viewpoint of the trajectory.
#[derive(Clone, Debug, Serialize)]
pub struct PoseRecord {
    pub index: usize,
    pub uid: String,
    pub orientation: Mat3,
    pub position: Vec3,
}

/// Exported viewpoint trajectory, refreshed after each converged step.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Trajectory {
    pub poses: Vec<PoseRecord>,
}

/// Exported point list: positions of all live structures above the size floor.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PointCloud {
    pub points: Vec<Vec3>,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
