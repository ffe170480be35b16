//! Parameter types configuring aggregation, refinement and filtering.
//!
//! Every struct deserialises with `#[serde(default)]`, so a JSON config only
//! needs the keys it overrides. Defaults reconstruct a clean synthetic scene
//! without tuning; for real data start with the filter multipliers and the
//! convergence epsilon.

use crate::types::Real;
use serde::{Deserialize, Serialize};

/// Smallest bootstrap threshold that can determine a relative pose.
pub const MIN_BOOTSTRAP_VIEWPOINTS: usize = 3;

/// Top-level parameters of the reconstruction driver.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionParams {
    /// Number of prior viewpoints a new viewpoint is matched against (K).
    pub window: usize,
    /// Viewpoint count below which refinement is deferred. Clamped to >= 3.
    pub min_viewpoints: usize,
    /// Viewpoint count below which every pass recomputes everything; the
    /// incremental mode takes over from there.
    pub bootstrap_viewpoints: usize,
    /// Smallest structure written to the exported point list.
    pub min_structure_size: usize,
    /// Size of a dedicated worker pool. `None` uses the global pool.
    pub threads: Option<usize>,
    /// Audit all cross-references after every ingestion and refinement.
    pub check_invariants: bool,
    pub refine: RefineParams,
    pub filters: FilterParams,
}

impl Default for ReconstructionParams {
    fn default() -> Self {
        Self {
            window: 5,
            min_viewpoints: MIN_BOOTSTRAP_VIEWPOINTS,
            bootstrap_viewpoints: 5,
            min_structure_size: 2,
            threads: None,
            check_invariants: true,
            refine: RefineParams::default(),
            filters: FilterParams::default(),
        }
    }
}

impl ReconstructionParams {
    pub fn effective_min_viewpoints(&self) -> usize {
        self.min_viewpoints.max(MIN_BOOTSTRAP_VIEWPOINTS)
    }
}

/// Stop conditions of the inner fixed-point loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineParams {
    /// Stop once successive errors differ by less than this.
    pub epsilon: Real,
    /// Safety cap on inner iterations.
    pub max_iterations: usize,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            max_iterations: 500,
        }
    }
}

/// Outlier filter thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    /// Smallest radius accepted for any member feature.
    pub radius_floor: Real,
    /// Radius deviation from the mean allowed, in standard deviations.
    pub radius_multiplier: Real,
    /// Disparity allowed, in standard deviations of disparity.
    pub disparity_multiplier: Real,
    /// Optional pairwise triangulation angle gate.
    pub triangulation: Option<TriangulationGate>,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            radius_floor: 0.0,
            radius_multiplier: 3.0,
            disparity_multiplier: 3.0,
            triangulation: None,
        }
    }
}

/// Accepted range of angles (degrees) under which two member viewpoints see
/// a structure.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TriangulationGate {
    pub min_angle_deg: Real,
    pub max_angle_deg: Real,
}
