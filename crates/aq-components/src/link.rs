//! Category dispatch: one entry point for the coefficients of any link.

use aq_core::Tolerances;
use aq_network::{Link, LinkKind, LinkState, Network, ValveKind};

use crate::pipe::pipe_coeffs;
use crate::pump::pump_coeffs;
use crate::traits::{HeadlossModel, LinkCoeffs};
use crate::valve::{gpv_coeffs, pbv_coeffs, tcv_coeffs, valve_coeffs};

/// Coefficients of `link` in its current state.
///
/// PRV, PSV and FCV are treated as plain valves here; callers assemble their
/// active regime separately.
pub fn link_coeffs(
    network: &Network,
    link: &Link,
    state: &LinkState,
    model: &dyn HeadlossModel,
    tol: &Tolerances,
) -> LinkCoeffs {
    let (status, flow) = (state.status, state.flow);
    match &link.kind {
        LinkKind::Pipe | LinkKind::CheckValve => pipe_coeffs(link, status, flow, model, tol),
        LinkKind::Pump(pump) => pump_coeffs(
            pump,
            network.curve(pump.head_curve),
            status,
            flow,
            state.setting,
            tol,
        ),
        LinkKind::Valve(ValveKind::Pbv) => {
            pbv_coeffs(link.minor_loss, status, flow, state.setting, tol)
        }
        LinkKind::Valve(ValveKind::Tcv) => {
            tcv_coeffs(link.diameter, link.minor_loss, status, flow, state.setting, tol)
        }
        LinkKind::Valve(ValveKind::Gpv { curve }) => match network.curve(*curve) {
            Some(c) => gpv_coeffs(c, link.minor_loss, status, flow, tol),
            None => valve_coeffs(link.minor_loss, status, flow, tol),
        },
        LinkKind::Valve(ValveKind::Prv | ValveKind::Psv | ValveKind::Fcv) => {
            valve_coeffs(link.minor_loss, status, flow, tol)
        }
    }
}
