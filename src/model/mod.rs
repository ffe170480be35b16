//! Entities of the reconstruction: features, viewpoints, structures and the
//! relative transforms between consecutive viewpoints.
//!
//! Ownership is flat. A [`Viewpoint`] owns its [`Feature`]s, the database owns
//! viewpoints, transforms and the structure arena. Every cross-reference is a
//! copyable id ([`FeatureId`], [`StructureId`]) rather than a pointer, so
//! removing a structure can never leave a dangling link behind; clearing a
//! back-reference writes `None`.

mod feature;
mod ids;
mod structure;
mod transform;
mod viewpoint;

pub use feature::Feature;
pub use ids::{FeatureId, StructureId};
pub use structure::{RaySample, Structure};
pub(crate) use structure::structure_feature;
pub use transform::{normalize_translations, CentroidSums, Transform};
pub use viewpoint::Viewpoint;
