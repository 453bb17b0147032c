//! Tank geometry: level/volume conversion.

use aq_core::{CurveId, PatternId};
use serde::{Deserialize, Serialize};

use crate::curve::Curve;

/// Storage tank or reservoir. A reservoir is a tank with zero area: infinite
/// capacity and a head fixed by its elevation (and optional head pattern).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    /// Cross-sectional area (ft²); 0 for a reservoir.
    pub area: f64,
    /// Minimum, maximum and initial head (ft).
    pub h_min: f64,
    pub h_max: f64,
    pub h_init: f64,
    /// Volumes at minimum, maximum and initial head (ft³).
    pub v_min: f64,
    pub v_max: f64,
    pub v_init: f64,
    /// Volume vs. depth curve for non-cylindrical tanks.
    pub volume_curve: Option<CurveId>,
    /// Head multiplier pattern (reservoirs only).
    pub head_pattern: Option<PatternId>,
    /// Full tank spills instead of closing its inflow links.
    pub can_overflow: bool,
}

impl Tank {
    pub fn is_reservoir(&self) -> bool {
        self.area == 0.0
    }

    /// Volume held at `head`.
    pub fn volume_at(&self, head: f64, elevation: f64, curve: Option<&Curve>) -> f64 {
        match curve {
            Some(c) => c.interpolate(head - elevation),
            None => self.v_min + (head - self.h_min) * self.area,
        }
    }

    /// Head for a stored `volume`.
    pub fn head_at(&self, volume: f64, elevation: f64, curve: Option<&Curve>) -> f64 {
        match curve {
            Some(c) => elevation + c.interpolate_inverse(volume),
            None => self.h_min + (volume - self.v_min) / self.area,
        }
    }
}
