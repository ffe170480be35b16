use super::{Feature, FeatureId, Viewpoint};
use crate::geometry::{angle_between, ray_projector};
use crate::types::{Mat3, Real, Vec3};

const DET_EPS: Real = 1e-12;

/// A reconstructed point seen by features of distinct viewpoints.
///
/// Members are kept sorted by viewpoint index, at most one per viewpoint.
#[derive(Clone, Debug)]
pub struct Structure {
    features: Vec<FeatureId>,
    pub position: Vec3,
}

/// Radius and disparity of one member ray against the structure position.
#[derive(Clone, Copy, Debug)]
pub struct RaySample {
    pub feature: FeatureId,
    pub radius: Real,
    pub disparity: Real,
}

#[inline]
pub(crate) fn structure_feature<'a>(viewpoints: &'a [Viewpoint], id: FeatureId) -> &'a Feature {
    &viewpoints[id.viewpoint].features[id.index]
}

impl Structure {
    pub(crate) fn new() -> Self {
        Self {
            features: Vec::new(),
            position: Vec3::zeros(),
        }
    }

    pub fn features(&self) -> &[FeatureId] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn contains(&self, id: FeatureId) -> bool {
        self.features.binary_search(&id).is_ok()
    }

    /// Most recent viewpoint observing the structure.
    pub fn last_viewpoint(&self) -> Option<usize> {
        self.features.last().map(|f| f.viewpoint)
    }

    /// Insert a member, keeping viewpoint order. Returns `false` and leaves the
    /// structure untouched when the viewpoint is already represented.
    pub(crate) fn insert(&mut self, id: FeatureId) -> bool {
        match self
            .features
            .binary_search_by_key(&id.viewpoint, |f| f.viewpoint)
        {
            Ok(_) => false,
            Err(pos) => {
                self.features.insert(pos, id);
                true
            }
        }
    }

    /// Member pairs observed from consecutive viewpoints `(j, j + 1)`.
    pub fn consecutive_pairs(&self) -> impl Iterator<Item = (FeatureId, FeatureId)> + '_ {
        self.features
            .windows(2)
            .filter(|w| w[1].viewpoint == w[0].viewpoint + 1)
            .map(|w| (w[0], w[1]))
    }

    /// Least-squares intersection of the member rays whose viewpoint index is
    /// at most `cutoff`.
    ///
    /// Solves `Σ(I - rrᵗ)·X = Σ(I - rrᵗ)·c` over world rays `r` through centres
    /// `c`. Returns `None` when fewer than two rays qualify or the system is
    /// singular (parallel rays).
    pub fn optimal_position(&self, viewpoints: &[Viewpoint], cutoff: usize) -> Option<Vec3> {
        let mut normal = Mat3::zeros();
        let mut rhs = Vec3::zeros();
        let mut rays = 0usize;
        for &id in self.features.iter().filter(|f| f.viewpoint <= cutoff) {
            let vp = &viewpoints[id.viewpoint];
            let ray = vp.world_ray(&structure_feature(viewpoints, id).direction);
            let projector = ray_projector(&ray);
            normal += projector;
            rhs += projector * vp.position;
            rays += 1;
        }
        if rays < 2 || normal.determinant().abs() <= DET_EPS {
            return None;
        }
        let position = normal.try_inverse()? * rhs;
        position.iter().all(|v| v.is_finite()).then_some(position)
    }

    /// Project the current position onto every member ray.
    pub fn ray_samples(&self, viewpoints: &[Viewpoint]) -> Vec<RaySample> {
        self.features
            .iter()
            .map(|&id| {
                let vp = &viewpoints[id.viewpoint];
                let ray = vp.world_ray(&structure_feature(viewpoints, id).direction);
                let radius = ray.dot(&(self.position - vp.position));
                let foot = vp.position + ray * radius;
                RaySample {
                    feature: id,
                    radius,
                    disparity: (foot - self.position).norm(),
                }
            })
            .collect()
    }

    fn any_member(&self, viewpoints: &[Viewpoint], pred: impl Fn(&Feature) -> bool) -> bool {
        self.features
            .iter()
            .any(|&id| pred(structure_feature(viewpoints, id)))
    }

    pub fn radius_below(&self, viewpoints: &[Viewpoint], floor: Real) -> bool {
        self.any_member(viewpoints, |f| f.radius < floor)
    }

    pub fn radius_deviates(&self, viewpoints: &[Viewpoint], mean: Real, bound: Real) -> bool {
        self.any_member(viewpoints, |f| (f.radius - mean).abs() > bound)
    }

    pub fn disparity_above(&self, viewpoints: &[Viewpoint], bound: Real) -> bool {
        self.any_member(viewpoints, |f| f.disparity > bound)
    }

    /// True when any pair of member viewpoints sees the position under an angle
    /// outside `[min_rad, max_rad]`.
    pub fn triangulation_outside(
        &self,
        viewpoints: &[Viewpoint],
        min_rad: Real,
        max_rad: Real,
    ) -> bool {
        let arms: Vec<Vec3> = self
            .features
            .iter()
            .map(|id| self.position - viewpoints[id.viewpoint].position)
            .collect();
        for (i, a) in arms.iter().enumerate() {
            for b in &arms[i + 1..] {
                let angle = angle_between(a, b);
                if angle < min_rad || angle > max_rad {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Observation, ViewpointFrame};

    fn looking_at(index: usize, position: Vec3, target: Vec3) -> Viewpoint {
        let frame = ViewpointFrame::new(
            index,
            vec![Observation::new(target - position)],
        );
        let mut vp = Viewpoint::from_frame(frame);
        vp.position = position;
        vp
    }

    #[test]
    fn insert_keeps_viewpoint_order_and_rejects_duplicates() {
        let mut s = Structure::new();
        assert!(s.insert(FeatureId::new(3, 0)));
        assert!(s.insert(FeatureId::new(1, 4)));
        assert!(s.insert(FeatureId::new(2, 2)));
        assert!(!s.insert(FeatureId::new(2, 7)));
        let order: Vec<usize> = s.features().iter().map(|f| f.viewpoint).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(s.consecutive_pairs().count(), 2);
        assert_eq!(s.last_viewpoint(), Some(3));
    }

    #[test]
    fn rays_intersect_at_target() {
        let target = Vec3::new(0.5, -0.2, 4.0);
        let viewpoints = vec![
            looking_at(0, Vec3::zeros(), target),
            looking_at(1, Vec3::new(1.0, 0.0, 0.0), target),
            looking_at(2, Vec3::new(2.0, 0.5, 0.0), target),
        ];
        let mut s = Structure::new();
        for vp in &viewpoints {
            s.insert(vp.feature_id(0));
        }
        let p = s.optimal_position(&viewpoints, 2).unwrap();
        assert!((p - target).norm() < 1e-9, "p={p}");
        s.position = p;
        let samples = s.ray_samples(&viewpoints);
        assert_eq!(samples.len(), 3);
        for (sample, vp) in samples.iter().zip(&viewpoints) {
            assert!((sample.radius - (target - vp.position).norm()).abs() < 1e-9);
            assert!(sample.disparity < 1e-9);
        }
        // Only one ray left below the cutoff.
        assert!(s.optimal_position(&viewpoints, 0).is_none());
    }

    #[test]
    fn triangulation_angle_gate() {
        let target = Vec3::new(0.0, 0.0, 10.0);
        let viewpoints = vec![
            looking_at(0, Vec3::zeros(), target),
            looking_at(1, Vec3::new(1.0, 0.0, 0.0), target),
        ];
        let mut s = Structure::new();
        s.insert(viewpoints[0].feature_id(0));
        s.insert(viewpoints[1].feature_id(0));
        s.position = target;
        // Baseline 1 at depth 10 subtends about 5.7 degrees.
        assert!(!s.triangulation_outside(&viewpoints, 1f64.to_radians(), 10f64.to_radians()));
        assert!(s.triangulation_outside(&viewpoints, 6f64.to_radians(), 90f64.to_radians()));
    }
}
