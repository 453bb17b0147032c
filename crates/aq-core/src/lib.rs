//! aq-core: stable foundation for aqualine.
//!
//! Contains:
//! - units (uom run timing on the whole-second clock, hydraulic constants)
//! - numeric (Real, Seconds, hydraulic tolerances and penalty constants)
//! - ids (stable compact IDs for network records)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{AqError, AqResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
