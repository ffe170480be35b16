use crate::geometry::rotation_from_correlation;
use crate::types::{Mat3, Real, Vec3};
use log::{debug, warn};

/// Per-worker partial sums of the paired model points of one transform.
#[derive(Clone, Copy, Debug)]
pub struct CentroidSums {
    pub first: Vec3,
    pub second: Vec3,
    pub count: usize,
}

impl Default for CentroidSums {
    fn default() -> Self {
        Self {
            first: Vec3::zeros(),
            second: Vec3::zeros(),
            count: 0,
        }
    }
}

impl CentroidSums {
    #[inline]
    pub fn add(&mut self, first: &Vec3, second: &Vec3) {
        self.first += first;
        self.second += second;
        self.count += 1;
    }

    #[inline]
    pub fn merge(&mut self, other: &CentroidSums) {
        self.first += other.first;
        self.second += other.second;
        self.count += other.count;
    }
}

/// Rigid motion from viewpoint `j` to viewpoint `j + 1`.
///
/// A point `a` expressed in the frame of `j` maps to `rotation·a + translation`
/// in the frame of `j + 1`. Centroids and correlation are pass-scoped
/// accumulators, reset before every recomputation.
#[derive(Clone, Debug)]
pub struct Transform {
    pub rotation: Mat3,
    pub translation: Vec3,
    previous_translation: Vec3,
    centroid_first: Vec3,
    centroid_second: Vec3,
    correlation: Mat3,
    count: usize,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            rotation: Mat3::identity(),
            translation: Vec3::zeros(),
            previous_translation: Vec3::zeros(),
            centroid_first: Vec3::zeros(),
            centroid_second: Vec3::zeros(),
            correlation: Mat3::zeros(),
            count: 0,
        }
    }
}

impl Transform {
    pub fn reset(&mut self) {
        self.centroid_first = Vec3::zeros();
        self.centroid_second = Vec3::zeros();
        self.correlation = Mat3::zeros();
        self.count = 0;
    }

    /// Number of pairs that contributed to the current centroids.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn set_centroids(&mut self, sums: &CentroidSums) {
        self.count = sums.count;
        if sums.count > 0 {
            let n = sums.count as Real;
            self.centroid_first = sums.first / n;
            self.centroid_second = sums.second / n;
        }
    }

    pub fn centroids(&self) -> (Vec3, Vec3) {
        (self.centroid_first, self.centroid_second)
    }

    /// Contribution of one centred pair to the cross-covariance.
    #[inline]
    pub fn correlation_term(&self, first: &Vec3, second: &Vec3) -> Mat3 {
        (first - self.centroid_first) * (second - self.centroid_second).transpose()
    }

    pub fn set_correlation(&mut self, correlation: Mat3) {
        self.correlation = correlation;
    }

    pub fn correlation(&self) -> &Mat3 {
        &self.correlation
    }

    /// Estimate rotation and translation from the accumulated pairs.
    ///
    /// Returns `false` and keeps the previous pose when nothing contributed or
    /// the decomposition failed.
    pub fn compute_pose(&mut self) -> bool {
        self.previous_translation = self.translation;
        if self.count == 0 {
            return false;
        }
        let Some((rotation, reflected)) = rotation_from_correlation(&self.correlation) else {
            warn!("transform: SVD did not converge, keeping previous pose");
            return false;
        };
        if reflected {
            debug!("transform: reflection corrected over {} pairs", self.count);
        }
        self.rotation = rotation;
        self.translation = self.centroid_second - rotation * self.centroid_first;
        true
    }

    /// Frame of the next viewpoint given this viewpoint's absolute frame.
    #[inline]
    pub fn chain(&self, orientation: &Mat3, position: &Vec3) -> (Mat3, Vec3) {
        let next_orientation = orientation * self.rotation.transpose();
        let next_position = position - next_orientation * self.translation;
        (next_orientation, next_position)
    }

    /// Translation change caused by the last pose estimate.
    pub fn shift(&self) -> Real {
        (self.translation - self.previous_translation).norm()
    }

    pub(crate) fn scale_translation(&mut self, factor: Real) {
        self.translation *= factor;
        self.previous_translation *= factor;
    }
}

/// Divide every translation by the mean translation norm.
///
/// Returns the mean that was applied, or `None` when it was not usable
/// (empty set, non-finite, or vanishing).
pub fn normalize_translations(transforms: &mut [Transform]) -> Option<Real> {
    if transforms.is_empty() {
        return None;
    }
    let mean = transforms
        .iter()
        .map(|t| t.translation.norm())
        .sum::<Real>()
        / transforms.len() as Real;
    if !mean.is_finite() || mean <= 1e-12 {
        return None;
    }
    let factor = 1.0 / mean;
    for t in transforms.iter_mut() {
        t.scale_translation(factor);
    }
    Some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn estimate(pairs: &[(Vec3, Vec3)]) -> Transform {
        let mut sums = CentroidSums::default();
        for (a, b) in pairs {
            sums.add(a, b);
        }
        let mut t = Transform::default();
        t.set_centroids(&sums);
        let correlation = pairs
            .iter()
            .fold(Mat3::zeros(), |acc, (a, b)| acc + t.correlation_term(a, b));
        t.set_correlation(correlation);
        assert!(t.compute_pose());
        t
    }

    #[test]
    fn procrustes_converges_as_noise_vanishes() {
        let truth_r = Rotation3::from_euler_angles(0.1, -0.3, 0.25).into_inner();
        let truth_t = Vec3::new(0.4, -1.0, 0.2);
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<Vec3> = (0..40)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-3.0..3.0),
                    rng.gen_range(-3.0..3.0),
                    rng.gen_range(2.0..8.0),
                )
            })
            .collect();

        let mut last_error = Real::INFINITY;
        for sigma in [1e-1, 1e-3, 1e-5, 0.0] {
            let pairs: Vec<(Vec3, Vec3)> = points
                .iter()
                .map(|a| {
                    let noise = Vec3::new(
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                    ) * sigma;
                    (*a, truth_r * a + truth_t + noise)
                })
                .collect();
            let t = estimate(&pairs);
            assert!((t.rotation.determinant() - 1.0).abs() < 1e-9);
            let error = (t.rotation - truth_r).norm() + (t.translation - truth_t).norm();
            assert!(error <= last_error + 1e-12, "sigma={sigma} error={error}");
            last_error = error;
        }
        assert!(last_error < 1e-9, "noise-free error {last_error}");
    }

    #[test]
    fn empty_transform_keeps_pose() {
        let mut t = Transform::default();
        t.translation = Vec3::new(1.0, 0.0, 0.0);
        t.set_centroids(&CentroidSums::default());
        assert!(!t.compute_pose());
        assert_eq!(t.translation, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(t.shift(), 0.0);
    }

    #[test]
    fn normalization_gives_unit_mean() {
        let mut transforms: Vec<Transform> = [0.5, 2.0, 3.5]
            .iter()
            .map(|&n| Transform {
                translation: Vec3::new(0.0, n, 0.0),
                ..Transform::default()
            })
            .collect();
        let mean = normalize_translations(&mut transforms).unwrap();
        assert!((mean - 2.0).abs() < 1e-12);
        let new_mean: Real =
            transforms.iter().map(|t| t.translation.norm()).sum::<Real>() / 3.0;
        assert!((new_mean - 1.0).abs() < 1e-12);

        let mut zero = vec![Transform::default(); 2];
        assert!(normalize_translations(&mut zero).is_none());
    }

    #[test]
    fn chaining_recovers_second_frame() {
        let o1 = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.3).into_inner();
        let p1 = Vec3::new(1.0, 2.0, 0.0);
        let x = Vec3::new(-1.0, 4.0, 6.0);
        // Points in frame 0 (identity, origin) and frame 1.
        let a = x;
        let b = o1.transpose() * (x - p1);
        let rotation = o1.transpose();
        let t = Transform {
            rotation,
            translation: b - rotation * a,
            ..Transform::default()
        };
        let (o, p) = t.chain(&Mat3::identity(), &Vec3::zeros());
        assert!((o - o1).norm() < 1e-12);
        assert!((p - p1).norm() < 1e-12);
    }
}
