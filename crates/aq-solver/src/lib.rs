//! aq-solver: hydraulic network solver for aqualine.
//!
//! Implements the gradient method for one hydraulic period:
//! - Linear-system accumulator and sparse pattern
//! - Coefficient assembly (sequential or per-thread partial systems)
//! - Status resolution for check valves, pumps, control valves and tank links
//! - Iterate-to-convergence loop with bad-valve recovery

pub mod assemble;
pub mod config;
pub mod error;
pub mod linear;
pub mod matrix;
pub mod solve;
pub mod sparsity;
pub mod status;

pub use assemble::Assembler;
pub use config::HydraulicConfig;
pub use error::{SolverError, SolverResult};
pub use linear::{DenseCholesky, LinearSolver};
pub use matrix::LinearSystem;
pub use solve::{HydraulicSolution, HydraulicSolver};
pub use sparsity::SparsePattern;
pub use status::{StatusChange, StatusLog};
