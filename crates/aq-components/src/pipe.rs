//! Pipe friction models: Hazen-Williams, Darcy-Weisbach and Chezy-Manning.

use std::f64::consts::{LN_10, PI};

use aq_core::{Tolerances, sign, units::constants::G_FTPS2};
use aq_network::{HeadlossFormula, Link, LinkStatus};

use crate::traits::{HeadlossModel, LinkCoeffs};

// Darcy-Weisbach friction factor constants (w = q/(ν·d) = Re·π/4).
const A1: f64 = 1000.0 * PI; // Re = 4000
const A2: f64 = 500.0 * PI; // Re = 2000
const A3: f64 = 16.0 * PI;
const A4: f64 = 2.0 * PI;
const A8: f64 = 4.618_413_198_590_666_7; // 5.74·(π/4)^0.9
const A9: f64 = -2.0 / LN_10;
const AA: f64 = -2.0 * 0.9 * 2.0 / LN_10;
const AB: f64 = 3.288_954_763_453_990_6e-3; // 5.74/4000^0.9
const AC: f64 = AA * AB;

/// Hazen-Williams: `h = 4.727·L/(C^1.852·d^4.871)·q^1.852`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HazenWilliams;

impl HeadlossModel for HazenWilliams {
    fn name(&self) -> &'static str {
        "Hazen-Williams"
    }

    fn exponent(&self) -> f64 {
        1.852
    }

    fn resistance(&self, pipe: &Link) -> f64 {
        4.727 * pipe.length / pipe.roughness.powf(1.852) / pipe.diameter.powf(4.871)
    }

    fn friction(&self, pipe: &Link, q: f64) -> (f64, f64) {
        power_law(self.resistance(pipe), self.exponent(), q)
    }
}

/// Chezy-Manning: roughness is Manning's n.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChezyManning;

impl HeadlossModel for ChezyManning {
    fn name(&self) -> &'static str {
        "Chezy-Manning"
    }

    fn exponent(&self) -> f64 {
        2.0
    }

    fn resistance(&self, pipe: &Link) -> f64 {
        let d = pipe.diameter;
        let k = 4.0 * pipe.roughness / (1.49 * PI * d * d);
        k * k * (d / 4.0).powf(-1.333) * pipe.length
    }

    fn friction(&self, pipe: &Link, q: f64) -> (f64, f64) {
        power_law(self.resistance(pipe), self.exponent(), q)
    }
}

/// Darcy-Weisbach with Swamee-Jain turbulent friction, Hagen-Poiseuille
/// laminar flow and a cubic interpolation across the transition.
/// Roughness is absolute (ft).
#[derive(Debug, Clone, Copy)]
pub struct DarcyWeisbach {
    /// Kinematic viscosity (ft²/s).
    pub viscosity: f64,
}

impl Default for DarcyWeisbach {
    fn default() -> Self {
        Self { viscosity: 1.1e-5 }
    }
}

impl DarcyWeisbach {
    /// Friction factor and its derivative with respect to flow.
    ///
    /// `e` is relative roughness, `s` is viscosity × diameter.
    pub fn friction_factor(q: f64, e: f64, s: f64) -> (f64, f64) {
        let w = q / s;
        if w >= A1 {
            let y1 = A8 / w.powf(0.9);
            let y2 = e / 3.7 + y1;
            let y3 = A9 * y2.ln();
            let f = 1.0 / (y3 * y3);
            (f, 1.8 * f * y1 * A9 / y2 / y3 / q)
        } else if w > A2 {
            let y2 = e / 3.7 + AB;
            let y3 = A9 * y2.ln();
            let fa = 1.0 / (y3 * y3);
            let fb = (2.0 + AC / (y2 * y3)) * fa;
            let r = w / A2;
            let x1 = 7.0 * fa - fb;
            let x2 = 0.128 - 17.0 * fa + 2.5 * fb;
            let x3 = -0.128 + 13.0 * fa - 2.0 * fb;
            let x4 = 0.032 - 3.0 * fa + 0.5 * fb;
            let f = x1 + r * (x2 + r * (x3 + r * x4));
            (f, (x2 + r * (2.0 * x3 + r * 3.0 * x4)) / s / A2)
        } else if w > A4 {
            let f = A3 * s / q;
            (f, -f / q)
        } else {
            (8.0, 0.0)
        }
    }
}

impl HeadlossModel for DarcyWeisbach {
    fn name(&self) -> &'static str {
        "Darcy-Weisbach"
    }

    fn exponent(&self) -> f64 {
        2.0
    }

    fn resistance(&self, pipe: &Link) -> f64 {
        let area = PI * pipe.diameter * pipe.diameter / 4.0;
        pipe.length / (2.0 * G_FTPS2 * pipe.diameter * area * area)
    }

    fn friction(&self, pipe: &Link, q: f64) -> (f64, f64) {
        let r = self.resistance(pipe);
        let s = self.viscosity * pipe.diameter;
        if q / s <= A2 {
            // Hagen-Poiseuille, linear in q
            let rl = A3 * s * r;
            (rl * q, rl)
        } else {
            let e = pipe.roughness / pipe.diameter;
            let (f, dfdq) = Self::friction_factor(q, e, s);
            (f * r * q * q, 2.0 * f * r * q + dfdq * r * q * q)
        }
    }
}

fn power_law(r: f64, n: f64, q: f64) -> (f64, f64) {
    let hgrad = n * r * q.powf(n - 1.0);
    (hgrad * q / n, hgrad)
}

/// Friction model for a network-level formula choice.
pub fn headloss_model(formula: HeadlossFormula, viscosity: f64) -> Box<dyn HeadlossModel> {
    match formula {
        HeadlossFormula::HazenWilliams => Box::new(HazenWilliams),
        HeadlossFormula::DarcyWeisbach => Box::new(DarcyWeisbach { viscosity }),
        HeadlossFormula::ChezyManning => Box::new(ChezyManning),
    }
}

/// Coefficients of a pipe or check valve: friction plus minor loss.
pub fn pipe_coeffs(
    pipe: &Link,
    status: LinkStatus,
    flow: f64,
    model: &dyn HeadlossModel,
    tol: &Tolerances,
) -> LinkCoeffs {
    if status.is_closed() {
        return LinkCoeffs::closed(flow, tol);
    }
    let q = flow.abs();
    let ml = pipe.minor_loss;
    let (hf, gf) = model.friction(pipe, q);
    let hloss = hf + ml * q * q;
    let hgrad = gf + 2.0 * ml * q;

    if hgrad < tol.rqtol {
        return LinkCoeffs {
            p: 1.0 / tol.rqtol,
            y: flow / model.exponent(),
        };
    }
    LinkCoeffs::from_gradient(sign(flow) * hloss, hgrad)
}
