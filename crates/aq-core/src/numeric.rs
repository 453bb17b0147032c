/// Floating point type used throughout the engine.
pub type Real = f64;

/// Simulation clock value in whole seconds.
pub type Seconds = i64;

/// Tolerances and penalty constants shared by assembly and status resolution.
///
/// All values are in internal units (ft, ft³/s). The penalty constants replace
/// special-cased equations: a closed link is a link with slope `1/cbig`, an
/// active valve pins its controlled node with a `cbig` diagonal.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    /// Head tolerance used by status hysteresis (ft).
    pub htol: Real,
    /// Flow tolerance used by status hysteresis (cfs).
    pub qtol: Real,
    /// Lower bound on any headloss gradient.
    pub rqtol: Real,
    /// Big penalty coefficient.
    pub cbig: Real,
    /// Small penalty coefficient (emitter floor).
    pub csmall: Real,
    /// Smallest flow used when evaluating gradients.
    pub tiny: Real,
    /// Flow treated as zero by tanks, energy and initial closed links.
    pub qzero: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            htol: 0.0005,
            qtol: 0.0001,
            rqtol: 1e-7,
            cbig: 1e8,
            csmall: 1e-6,
            tiny: 1e-6,
            qzero: 1e-6,
        }
    }
}

/// Sign of `x` as used by headloss relations (zero counts as positive).
#[inline]
pub fn sign(x: Real) -> Real {
    if x < 0.0 { -1.0 } else { 1.0 }
}
