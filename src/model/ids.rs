use serde::Serialize;
use std::fmt;

/// Address of a feature: owning viewpoint index and position in its list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FeatureId {
    pub viewpoint: usize,
    pub index: usize,
}

impl FeatureId {
    pub fn new(viewpoint: usize, index: usize) -> Self {
        Self { viewpoint, index }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.viewpoint, self.index)
    }
}

/// Key of a structure in the database arena.
///
/// Keys of removed structures may be reused by later insertions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StructureId(pub usize);

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
