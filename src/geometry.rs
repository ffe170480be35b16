//! Geometry helpers shared by the transform and structure estimators.

use crate::types::{Mat3, Real, Vec3};
use log::debug;
use std::f64::consts::{FRAC_PI_2, PI};

const SVD_MAX_ITERATIONS: usize = 1000;

/// Rotation solving the orthogonal Procrustes problem for a cross-covariance
/// matrix `H = Σ (a - ā)(b - b̄)ᵗ`, i.e. the `R` minimising `Σ |b - R a|²`.
///
/// Computed as `V·Uᵗ` from the SVD `H = U·S·Vᵗ`. When that product is a
/// reflection (negative determinant) the last column of `V` is negated and
/// the product recomputed; the second tuple element reports that correction.
/// Returns `None` for a non-finite input or when the decomposition does not
/// converge.
pub fn rotation_from_correlation(correlation: &Mat3) -> Option<(Mat3, bool)> {
    if !correlation.iter().all(|v| v.is_finite()) {
        return None;
    }
    let svd = correlation.try_svd(true, true, Real::EPSILON, SVD_MAX_ITERATIONS)?;
    let u = svd.u?;
    let mut v = svd.v_t?.transpose();
    let rotation = v * u.transpose();
    if rotation.determinant() >= 0.0 {
        return Some((rotation, false));
    }
    debug!("procrustes: reflective solution, flipping last singular vector");
    for row in 0..3 {
        v[(row, 2)] = -v[(row, 2)];
    }
    Some((v * u.transpose(), true))
}

/// Projector onto the plane orthogonal to a unit ray, `I - r·rᵗ`.
///
/// Summing `P_i` and `P_i·c_i` over rays through centres `c_i` gives the normal
/// equations of the least-squares ray intersection.
#[inline]
pub fn ray_projector(ray: &Vec3) -> Mat3 {
    Mat3::identity() - ray * ray.transpose()
}

/// Unsigned angle between two vectors in radians, in `[0, π]`.
#[inline]
pub fn angle_between(a: &Vec3, b: &Vec3) -> Real {
    let na = a.norm().max(1e-12);
    let nb = b.norm().max(1e-12);
    (a.dot(b) / (na * nb)).clamp(-1.0, 1.0).acos()
}

/// Unit direction of an equirectangular (panoramic) pixel.
///
/// Longitude spans `[-π, π)` left to right, latitude `[π/2, -π/2]` top to
/// bottom. The frame is x forward at the image centre, y left, z up.
pub fn equirectangular_direction(x: Real, y: Real, width: usize, height: usize) -> Vec3 {
    let w = width.max(1) as Real;
    let h = height.max(1) as Real;
    let longitude = 2.0 * PI * x / w - PI;
    let latitude = FRAC_PI_2 - PI * y / h;
    Vec3::new(
        latitude.cos() * longitude.cos(),
        -latitude.cos() * longitude.sin(),
        latitude.sin(),
    )
}
