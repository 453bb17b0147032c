//! aq-components: per-category coefficient models.
//!
//! Every link category turns its current status, setting and flow into a
//! linearized headloss pair `(P, Y)`:
//! - Pipes and check valves through a pluggable [`HeadlossModel`]
//! - Pumps from fitted power curves or custom curve segments
//! - PBV, TCV, GPV and inactive PRV/PSV/FCV through valve formulas
//!
//! Emitters and pump energy live here as well. All functions are pure and
//! never fail: degenerate inputs are absorbed by the penalty constants in
//! [`aq_core::Tolerances`].
//!
//! # Example
//!
//! ```
//! use aq_components::{pipe_coeffs, headloss_model};
//! use aq_core::Tolerances;
//! use aq_network::{HeadlossFormula, NetworkBuilder, PipeSpec, LinkStatus};
//!
//! let mut b = NetworkBuilder::new();
//! let r = b.add_reservoir("R", 100.0);
//! let j = b.add_junction("J", 0.0);
//! b.add_pipe("P", r, j, PipeSpec::new(1000.0, 1.0, 100.0));
//! let net = b.build().unwrap();
//!
//! let model = headloss_model(HeadlossFormula::HazenWilliams, net.viscosity());
//! let c = pipe_coeffs(&net.links()[0], LinkStatus::Open, 2.0, model.as_ref(), &Tolerances::default());
//! assert!(c.p > 0.0);
//! ```

pub mod emitter;
pub mod link;
pub mod pipe;
pub mod pump;
pub mod traits;
pub mod valve;

// Re-exports
pub use emitter::{emitter_flow_change, emitter_headloss};
pub use link::link_coeffs;
pub use pipe::{ChezyManning, DarcyWeisbach, HazenWilliams, headloss_model, pipe_coeffs};
pub use pump::{pump_coeffs, pump_efficiency, pump_power};
pub use traits::{HeadlossModel, LinkCoeffs};
pub use valve::{gpv_coeffs, pbv_coeffs, tcv_coeffs, valve_coeffs};
