//! Deterministic synthetic scenes for the demo and the tests.
//!
//! A [`Scene`] is a set of world points and a trajectory of poses. Every
//! point is observed from every pose; the observation direction is expressed
//! in the pose's own frame and keyed by the point index, so [`KeyMatcher`]
//! recovers the true correspondences.
//!
//! [`KeyMatcher`]: crate::source::KeyMatcher

use crate::source::{Observation, ViewpointFrame};
use crate::types::{Mat3, Real, Vec3};
use nalgebra::{Rotation3, Vector3};
use serde::Deserialize;

/// Ground-truth pose: `orientation` maps local directions to world.
#[derive(Clone, Copy, Debug)]
pub struct ScenePose {
    pub orientation: Mat3,
    pub position: Vec3,
}

#[derive(Clone, Debug)]
pub struct Scene {
    pub points: Vec<Vec3>,
    pub poses: Vec<ScenePose>,
}

/// Six points spread in front of an x-axis trajectory.
pub fn default_points() -> Vec<Vec3> {
    vec![
        Vec3::new(-1.0, -0.5, 5.0),
        Vec3::new(1.0, 0.5, 6.0),
        Vec3::new(0.5, -1.0, 4.5),
        Vec3::new(-0.5, 1.0, 7.0),
        Vec3::new(2.0, 0.0, 5.5),
        Vec3::new(-2.0, 0.3, 6.5),
    ]
}

impl Scene {
    pub fn new(points: Vec<Vec3>, poses: Vec<ScenePose>) -> Self {
        Self { points, poses }
    }

    /// Poses at `i·step` along x, each turned by `i·yaw` radians about the
    /// vertical (y) axis. `yaw = 0` gives a straight, non-rotating line.
    pub fn along_x(points: Vec<Vec3>, count: usize, step: Real, yaw: Real) -> Self {
        let poses = (0..count)
            .map(|i| ScenePose {
                orientation: Rotation3::from_axis_angle(&Vector3::y_axis(), yaw * i as Real)
                    .into_inner(),
                position: Vec3::new(step * i as Real, 0.0, 0.0),
            })
            .collect();
        Self { points, poses }
    }

    pub fn straight_line(count: usize) -> Self {
        Self::along_x(default_points(), count, 1.0, 0.0)
    }

    /// Observation frames of every pose, in trajectory order.
    ///
    /// With `measured_range` each observation carries its true distance, as a
    /// pre-posed point cloud would. Observation order is rotated per viewpoint
    /// so feature indices differ between viewpoints.
    pub fn frames(&self, measured_range: bool) -> Vec<ViewpointFrame> {
        self.poses
            .iter()
            .enumerate()
            .map(|(index, pose)| {
                let n = self.points.len();
                let observations = (0..n)
                    .map(|k| (k + index) % n)
                    .map(|key| {
                        let local = pose.orientation.transpose() * (self.points[key] - pose.position);
                        let range = local.norm();
                        let obs = if measured_range {
                            Observation::with_range(local / range, range)
                        } else {
                            Observation::new(local / range)
                        };
                        obs.keyed(key as u64)
                    })
                    .collect();
                ViewpointFrame::new(index, observations)
            })
            .collect()
    }
}

/// Scene description accepted by the demo configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub viewpoints: usize,
    pub step: Real,
    pub yaw_deg_per_step: Real,
    pub measured_range: bool,
    /// World points; the built-in six-point set when absent.
    pub points: Option<Vec<[Real; 3]>>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            viewpoints: 8,
            step: 1.0,
            yaw_deg_per_step: 0.0,
            measured_range: true,
            points: None,
        }
    }
}

impl SceneConfig {
    pub fn build(&self) -> Scene {
        let points = match &self.points {
            Some(points) => points.iter().map(|p| Vec3::new(p[0], p[1], p[2])).collect(),
            None => default_points(),
        };
        Scene::along_x(
            points,
            self.viewpoints,
            self.step,
            self.yaw_deg_per_step.to_radians(),
        )
    }
}
