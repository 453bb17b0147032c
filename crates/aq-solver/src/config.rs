//! Convergence settings for the hydraulic solver.

use aq_core::Tolerances;
use serde::{Deserialize, Serialize};

/// Configuration of the iterate-to-convergence loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydraulicConfig {
    /// Maximum number of trials per period.
    pub max_trials: usize,
    /// Convergence limit on `Σ|Δq| / Σ|q|`.
    pub accuracy: f64,
    /// Trials between periodic link status checks.
    pub check_freq: usize,
    /// Last trial on which periodic status checks run.
    pub max_check: usize,
    /// Relative error below which flow updates are damped; 0 disables damping.
    pub damp_limit: f64,
    /// Pressure exponent of emitter discharge.
    pub emitter_exponent: f64,
    pub tolerances: Tolerances,
    /// Fold link coefficients into per-thread partial systems.
    pub parallel_assembly: bool,
    /// Log every link status change at debug level.
    pub log_status_changes: bool,
}

impl Default for HydraulicConfig {
    fn default() -> Self {
        Self {
            max_trials: 200,
            accuracy: 0.001,
            check_freq: 2,
            max_check: 10,
            damp_limit: 0.0,
            emitter_exponent: 0.5,
            tolerances: Tolerances::default(),
            parallel_assembly: false,
            log_status_changes: false,
        }
    }
}

/// Relaxation applied to flow updates once damping is engaged.
pub(crate) const DAMPED_RELAXATION: f64 = 0.6;
