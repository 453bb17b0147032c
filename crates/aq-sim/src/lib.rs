//! Extended-period hydraulic simulation for aqualine.
//!
//! Provides:
//! - Demand, reservoir head and pump speed patterns per period
//! - Tank volume integration with level limits
//! - Time-step planning from patterns, reports, tanks, controls and rules
//! - Pump energy accounting
//! - A period-by-period driver with serializable result records

pub mod demand;
pub mod energy;
pub mod error;
pub mod options;
pub mod record;
pub mod sim;
pub mod tank;
pub mod timestep;

pub use demand::apply_patterns;
pub use energy::{EnergyReport, PumpEnergyReport, PumpLoad, accumulate_energy, pump_loads};
pub use error::{SimError, SimResult};
pub use options::{EnergyOptions, Schedule, SimOptions};
pub use record::{PeriodResult, SimRecord};
pub use sim::{HaltHandle, Simulation};
pub use tank::{TankSnapshot, advance_tanks};
pub use timestep::TimeStepPlanner;
