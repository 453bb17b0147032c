//! Error types for hydraulic solving.

use aq_core::AqError;
use thiserror::Error;

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;

/// Errors that can occur while solving a hydraulic period.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Solver could not be set up for the network.
    #[error("Problem setup error: {what}")]
    ProblemSetup { what: String },

    /// Factorization hit a non-positive pivot at `row`.
    #[error("Singular system at row {row}")]
    Singular { row: usize },

    /// Singular system that no valve status change could repair.
    #[error("Ill-conditioned system at node '{node}'")]
    IllConditioned { node: String },

    #[error("Non-finite {what} after linear solve")]
    NonFinite { what: &'static str },
}

impl SolverError {
    /// Numeric code reported for this error.
    pub fn code(&self) -> u16 {
        match self {
            SolverError::IllConditioned { .. } | SolverError::Singular { .. } => 110,
            SolverError::ProblemSetup { .. } => 200,
            SolverError::NonFinite { .. } => 110,
        }
    }
}

impl From<SolverError> for AqError {
    fn from(e: SolverError) -> Self {
        AqError::Model {
            code: e.code(),
            message: e.to_string(),
        }
    }
}
