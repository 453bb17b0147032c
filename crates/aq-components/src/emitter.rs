//! Emitters: pressure-dependent outflow `q = Kc·p^γ` at junctions.
//!
//! Internally the relation is inverted to a headloss `h = Ke·|q|^(1/γ)`
//! through a fictitious link to the atmosphere, linearized around the last
//! emitter flow.

use aq_core::Tolerances;

/// Headloss and gradient through an emitter with discharge coefficient `kc`
/// and pressure exponent `exponent`, evaluated at emitter flow `q`.
pub fn emitter_headloss(kc: f64, exponent: f64, q: f64, tol: &Tolerances) -> (f64, f64) {
    let qexp = 1.0 / exponent;
    let ke = kc.powf(-qexp).max(tol.csmall);
    let hgrad = qexp * ke * q.abs().powf(qexp - 1.0);
    if hgrad < tol.rqtol {
        (tol.rqtol * q, tol.rqtol)
    } else {
        (hgrad * q / qexp, hgrad)
    }
}

/// Secant correction to the emitter flow given the new head at the node.
/// The caller subtracts the returned value from the current flow.
pub fn emitter_flow_change(
    kc: f64,
    exponent: f64,
    q: f64,
    head: f64,
    elevation: f64,
    tol: &Tolerances,
) -> f64 {
    let (hloss, hgrad) = emitter_headloss(kc, exponent, q, tol);
    (hloss - head + elevation) / hgrad
}
