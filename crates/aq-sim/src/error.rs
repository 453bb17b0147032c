//! Error types for extended-period simulation.

use aq_controls::ControlError;
use aq_core::AqError;
use aq_network::NetworkError;
use aq_solver::SolverError;
use thiserror::Error;

/// Errors encountered while setting up or running a simulation.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("Backend error: {message}")]
    Backend { message: String },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<NetworkError> for SimError {
    fn from(e: NetworkError) -> Self {
        SimError::Backend {
            message: e.to_string(),
        }
    }
}

impl From<SimError> for AqError {
    fn from(e: SimError) -> Self {
        match e {
            SimError::Solver(e) => e.into(),
            SimError::Control(e) => e.into(),
            SimError::InvalidArg { what } => AqError::InvalidArg { what },
            SimError::Backend { message } => AqError::Model { code: 200, message },
        }
    }
}
