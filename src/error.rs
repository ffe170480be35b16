//! Error taxonomy.
//!
//! Two classes of failure surface through [`Error`]:
//!
//! - [`Error::Invariant`] reports a broken structure/feature/viewpoint
//!   cross-reference. It is never produced by bad input alone and the driver
//!   treats it as fatal.
//! - Everything else is a contract violation by a collaborator (out-of-order
//!   viewpoint, malformed match table, unknown feature id) or an I/O/config
//!   failure.
//!
//! Weak or ambiguous correspondences are not errors; they are counted in
//! [`crate::diagnostics::AggregationReport`].
use crate::model::{FeatureId, StructureId};
use std::path::PathBuf;

/// Broken cross-reference between structures, features and viewpoints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("feature {feature} already belongs to structure {owner}")]
    FeatureAlreadyOwned {
        feature: FeatureId,
        owner: StructureId,
    },
    #[error("structure {structure} holds two features of viewpoint {viewpoint}")]
    DuplicateViewpoint {
        structure: StructureId,
        viewpoint: usize,
    },
    #[error("structure {structure} has {count} feature(s), at least 2 required")]
    UndersizedStructure { structure: StructureId, count: usize },
    #[error("feature {feature} listed by structure {structure} points to {found:?}")]
    BrokenBackReference {
        feature: FeatureId,
        structure: StructureId,
        found: Option<StructureId>,
    },
    #[error("feature {feature} points to structure {structure} which does not list it")]
    MissingMembership {
        feature: FeatureId,
        structure: StructureId,
    },
    #[error("partition slot {position} holds structure {structure} classified {found}, range says {expected}")]
    PartitionMismatch {
        position: usize,
        structure: StructureId,
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors surfaced by ingestion, refinement, configuration and export.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
    #[error("viewpoint ingested with index {found}, expected {expected}")]
    OutOfOrder { expected: usize, found: usize },
    #[error("match table is {rows}x{width}, expected {expected_rows}x{expected_width}")]
    MatchTableShape {
        rows: usize,
        width: usize,
        expected_rows: usize,
        expected_width: usize,
    },
    #[error("match ({query}, slot {slot}) references observation {train}, viewpoint {viewpoint} has {available}")]
    MatchOutOfRange {
        query: usize,
        slot: usize,
        train: usize,
        viewpoint: usize,
        available: usize,
    },
    #[error("feature {0} does not exist")]
    UnknownFeature(FeatureId),
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error for {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

pub type Result<T> = std::result::Result<T, Error>;
