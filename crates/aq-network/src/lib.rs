//! aq-network: element state model for aqualine.
//!
//! Provides:
//! - Structural records (nodes, tanks, links with pump/valve payloads, curves, patterns)
//! - Incremental network builder with validation
//! - Junction-to-row indexing for solver integration
//! - Per-period hydraulic state arrays
//!
//! # Example
//!
//! ```
//! use aq_network::{NetworkBuilder, PipeSpec};
//!
//! let mut builder = NetworkBuilder::new();
//! let r = builder.add_reservoir("R1", 100.0);
//! let j = builder.add_junction("J1", 10.0);
//! builder.add_demand(j, 0.5, None);
//! builder.add_pipe("P1", r, j, PipeSpec::new(1000.0, 1.0, 100.0));
//! let network = builder.build().unwrap();
//!
//! assert_eq!(network.nodes().len(), 2);
//! assert_eq!(network.links().len(), 1);
//! ```

pub mod builder;
pub mod curve;
pub mod error;
pub mod indexing;
pub mod link;
pub mod network;
pub mod node;
pub mod pattern;
pub mod pump;
pub mod state;
pub mod tank;
pub(crate) mod validate;

// Re-exports for ergonomics
pub use builder::{NetworkBuilder, PipeSpec, TankSpec, ValveSpec};
pub use curve::Curve;
pub use error::{NetworkError, NetworkResult};
pub use indexing::RowMap;
pub use link::{Link, LinkKind, LinkStatus, ValveKind};
pub use network::{HeadlossFormula, Network};
pub use node::{Demand, Node, NodeKind};
pub use pattern::Pattern;
pub use pump::{Pump, PumpCurveKind};
pub use state::{HydraulicState, LinkState, NodeState, PumpEnergy, TankState};
pub use tank::Tank;
