//! Pump head-curve models.

use aq_core::{CurveId, PatternId};
use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::error::{NetworkError, NetworkResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpCurveKind {
    /// `h = a − b·q^c`, fitted from one design point or three points.
    PowerFunction,
    /// Multi-point curve, linearized on the segment around the operating flow.
    Custom,
}

/// Pump payload of a link.
///
/// Head is stored in headloss form: the pump's headloss at relative speed 1 is
/// `h0 + r·q^n` with `h0 < 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pump {
    pub curve_kind: PumpCurveKind,
    pub head_curve: CurveId,
    /// Shutoff headloss (negative of shutoff head).
    pub h0: f64,
    /// Flow coefficient.
    pub r: f64,
    /// Flow exponent.
    pub n: f64,
    /// Design flow, used to start the iterations.
    pub q0: f64,
    pub q_max: f64,
    /// Maximum head gain at full speed.
    pub h_max: f64,
    pub efficiency_curve: Option<CurveId>,
    /// Energy price per kWh; 0 uses the global price.
    pub energy_price: f64,
    pub price_pattern: Option<PatternId>,
    pub speed_pattern: Option<PatternId>,
}

impl Pump {
    /// Classify and fit a head curve.
    ///
    /// One point `(q1, h1)` becomes a power curve through `(0, 4/3·h1)`,
    /// `(q1, h1)` and `(2·q1, 0)`. Three points starting at zero flow are
    /// fitted exactly. Anything else is a custom curve whose heads must
    /// strictly decrease.
    pub fn from_head_curve(curve: &Curve) -> NetworkResult<Self> {
        let invalid = |reason| NetworkError::InvalidPumpCurve {
            curve: curve.name.clone(),
            reason,
        };
        let (x, y) = (&curve.x, &curve.y);
        let base = |kind, h0, r, n, q0, q_max, h_max| Pump {
            curve_kind: kind,
            head_curve: curve.id,
            h0,
            r,
            n,
            q0,
            q_max,
            h_max,
            efficiency_curve: None,
            energy_price: 0.0,
            price_pattern: None,
            speed_pattern: None,
        };

        if x.len() != y.len() {
            return Err(invalid("x and y lengths differ"));
        }

        let three_points = match x.len() {
            0 => return Err(invalid("curve has no points")),
            1 => Some((1.33334 * y[0], y[0], 0.0, x[0], 2.0 * x[0])),
            3 if x[0] == 0.0 => Some((y[0], y[1], y[2], x[1], x[2])),
            _ => None,
        };

        match three_points {
            Some((h0, h1, h2, q1, q2)) => {
                let (a, b, c) =
                    power_curve(h0, h1, h2, q1, q2).ok_or(invalid("cannot fit power function"))?;
                let q_max = (-a / b).powf(1.0 / c);
                Ok(base(PumpCurveKind::PowerFunction, -a, -b, c, q1, q_max, h0))
            }
            None => {
                if y.windows(2).any(|w| w[1] >= w[0]) {
                    return Err(invalid("head must decrease with flow"));
                }
                let q_max = x[x.len() - 1];
                let q0 = (x[0] + q_max) / 2.0;
                Ok(base(PumpCurveKind::Custom, -y[0], 0.0, 1.0, q0, q_max, y[0]))
            }
        }
    }

    /// Maximum head gain at relative speed `speed`.
    pub fn max_head(&self, speed: f64) -> f64 {
        speed * speed * self.h_max
    }
}

/// Fit `h = a + b·q^c` through `(0, h0)`, `(q1, h1)`, `(q2, h2)`.
fn power_curve(h0: f64, h1: f64, h2: f64, q1: f64, q2: f64) -> Option<(f64, f64, f64)> {
    const TINY: f64 = 1e-6;
    if h0 < TINY || h0 - h1 < TINY || h1 - h2 < TINY || q1 < TINY || q2 - q1 < TINY {
        return None;
    }
    let h4 = h0 - h1;
    let h5 = h0 - h2;
    let c = (h5 / h4).ln() / (q2 / q1).ln();
    if c <= 0.0 || c > 20.0 {
        return None;
    }
    let b = -h4 / q1.powf(c);
    if b >= 0.0 {
        return None;
    }
    Some((h0, b, c))
}
