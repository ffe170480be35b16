#![doc = include_str!("../README.md")]

// Core
pub mod aggregate;
pub mod database;
pub mod model;
pub mod refine;

// Collaborator seams and the driver built on them.
pub mod pipeline;
pub mod source;

// Support
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod io;
pub mod params;
pub mod synthetic;
pub mod types;

// --- High-level re-exports -------------------------------------------------

pub use crate::aggregate::{Aggregator, MatchTable};
pub use crate::database::Database;
pub use crate::error::{Error, InvariantViolation, Result};
pub use crate::params::{FilterParams, ReconstructionParams, RefineParams, TriangulationGate};
pub use crate::pipeline::Reconstructor;
pub use crate::refine::{RecomputeMode, Refiner};
pub use crate::types::{PointCloud, Trajectory};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for driving a reconstruction end to end.
pub mod prelude {
    pub use crate::diagnostics::{RunSummary, StepOutcome, StepReport};
    pub use crate::source::{
        CorrespondenceProvider, KeyMatcher, Observation, VecSource, ViewpointFrame,
        ViewpointSource,
    };
    pub use crate::synthetic::Scene;
    pub use crate::{Database, ReconstructionParams, Reconstructor, Refiner};
}
