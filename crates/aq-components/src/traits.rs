//! Core traits and shared types for coefficient models.

use aq_core::Tolerances;
use aq_network::Link;

/// Linearized headloss of a link: `P·(h1 − h2) ≈ q − Y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkCoeffs {
    /// Inverse headloss gradient.
    pub p: f64,
    /// Flow correction.
    pub y: f64,
}

impl LinkCoeffs {
    /// Closed link of any category: negligible slope, correction equal to the flow.
    #[inline]
    pub fn closed(flow: f64, tol: &Tolerances) -> Self {
        Self {
            p: 1.0 / tol.cbig,
            y: flow,
        }
    }

    /// From a signed headloss and its (positive) gradient.
    #[inline]
    pub fn from_gradient(hloss: f64, hgrad: f64) -> Self {
        let p = 1.0 / hgrad;
        Self { p, y: hloss * p }
    }
}

/// Pipe friction headloss as a function of flow.
///
/// Models are stateless and shared across threads during assembly.
pub trait HeadlossModel: Send + Sync {
    /// Formula name for diagnostics.
    fn name(&self) -> &'static str;

    /// Flow exponent of the friction relation (used for near-zero gradients).
    fn exponent(&self) -> f64;

    /// Friction resistance coefficient of a pipe.
    fn resistance(&self, pipe: &Link) -> f64;

    /// Friction headloss magnitude and its gradient at flow magnitude `q`.
    ///
    /// Minor losses are not included.
    fn friction(&self, pipe: &Link, q: f64) -> (f64, f64);
}
