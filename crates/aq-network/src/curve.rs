//! Piecewise-linear curves (pump head, efficiency, tank volume, GPV headloss).

use aq_core::CurveId;
use serde::{Deserialize, Serialize};

/// A piecewise-linear x→y curve. X values are strictly increasing once the
/// network has been validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub id: CurveId,
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Curve {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Interpolate y at `x`, holding the end values outside the curve's range.
    pub fn interpolate(&self, x: f64) -> f64 {
        interpolate(&self.x, &self.y, x)
    }

    /// Interpolate x at `y`, treating y as the independent variable.
    ///
    /// Used for monotone curves such as tank volume vs. depth.
    pub fn interpolate_inverse(&self, y: f64) -> f64 {
        interpolate(&self.y, &self.x, y)
    }

    /// Intercept and slope `(h0, r)` of the segment bracketing `x`, such that
    /// `y ≈ h0 + r·x` locally. The first/last segment is used outside the range.
    ///
    /// Requires at least two points.
    pub fn segment(&self, x: f64) -> (f64, f64) {
        let n = self.x.len();
        let mut k2 = self.x.iter().take_while(|&&xi| xi < x).count();
        if k2 == 0 {
            k2 = 1;
        } else if k2 == n {
            k2 = n - 1;
        }
        let k1 = k2 - 1;
        let r = (self.y[k2] - self.y[k1]) / (self.x[k2] - self.x[k1]);
        let h0 = self.y[k1] - r * self.x[k1];
        (h0, r)
    }
}

fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let Some((&x0, &y0)) = xs.first().zip(ys.first()) else {
        return 0.0;
    };
    if x <= x0 {
        return y0;
    }
    for i in 1..xs.len() {
        if xs[i] >= x {
            let dx = xs[i] - xs[i - 1];
            let dy = ys[i] - ys[i - 1];
            if dx.abs() < 1e-6 {
                return ys[i];
            }
            return ys[i] - (xs[i] - x) * dy / dx;
        }
    }
    ys[ys.len() - 1]
}
