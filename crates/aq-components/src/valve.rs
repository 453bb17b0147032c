//! Valve coefficients for the inactive (throttled pipe) regime.
//!
//! PRV, PSV and FCV only come through here while they are not holding a
//! setpoint; their active regime is assembled at node level by the solver.

use aq_core::{Tolerances, sign, units::constants::MINOR_LOSS_FACTOR};
use aq_network::{Curve, LinkStatus};

use crate::traits::LinkCoeffs;

/// Generic valve: minor loss `km·q²`, or a near-lossless linear relation
/// when `km` is zero.
pub fn valve_coeffs(km: f64, status: LinkStatus, flow: f64, tol: &Tolerances) -> LinkCoeffs {
    if status.is_closed() {
        return LinkCoeffs::closed(flow, tol);
    }
    if km > 0.0 {
        let p = (2.0 * km * flow.abs()).max(tol.rqtol);
        LinkCoeffs {
            p: 1.0 / p,
            y: flow / 2.0,
        }
    } else {
        LinkCoeffs {
            p: 1.0 / tol.rqtol,
            y: flow,
        }
    }
}

/// Pressure breaker: pins the headloss to the setting unless the valve's own
/// minor loss already exceeds it.
pub fn pbv_coeffs(
    km: f64,
    status: LinkStatus,
    flow: f64,
    setting: Option<f64>,
    tol: &Tolerances,
) -> LinkCoeffs {
    match setting {
        Some(s) if s != 0.0 && !status.is_closed() && km * flow * flow <= s => LinkCoeffs {
            p: tol.cbig,
            y: s * tol.cbig,
        },
        _ => valve_coeffs(km, status, flow, tol),
    }
}

/// Throttle control: the setting is a loss coefficient converted to
/// head-per-flow² with the valve diameter.
pub fn tcv_coeffs(
    diameter: f64,
    km: f64,
    status: LinkStatus,
    flow: f64,
    setting: Option<f64>,
    tol: &Tolerances,
) -> LinkCoeffs {
    let km = setting.map_or(km, |s| MINOR_LOSS_FACTOR * s / diameter.powi(4));
    valve_coeffs(km, status, flow, tol)
}

/// General purpose valve: headloss from a curve of headloss vs. flow.
pub fn gpv_coeffs(
    curve: &Curve,
    km: f64,
    status: LinkStatus,
    flow: f64,
    tol: &Tolerances,
) -> LinkCoeffs {
    if status.is_closed() || curve.len() < 2 {
        return valve_coeffs(km, status, flow, tol);
    }
    let q = flow.abs().max(tol.tiny);
    let (h0, r) = curve.segment(q);
    let r = r.max(tol.rqtol);
    let p = 1.0 / r;
    LinkCoeffs {
        p,
        y: p * (h0 + r * q) * sign(flow),
    }
}
