//! Pump coefficients and energy.

use aq_core::{
    Tolerances,
    units::constants::{HP_DIVISOR, KW_PER_HP},
};
use aq_network::{Curve, LinkStatus, Pump, PumpCurveKind};

use crate::traits::LinkCoeffs;

/// Coefficients of a pump running at relative speed `setting`.
///
/// Head gain is expressed as negative headloss. Power-function pumps scale
/// shutoff head by `speed²` and resistance by `speed^(2−n)`; custom curves
/// are linearized on the segment bracketing the speed-adjusted flow.
pub fn pump_coeffs(
    pump: &Pump,
    head_curve: Option<&Curve>,
    status: LinkStatus,
    flow: f64,
    setting: Option<f64>,
    tol: &Tolerances,
) -> LinkCoeffs {
    let speed = setting.unwrap_or(1.0);
    if status.is_closed() || speed == 0.0 {
        return LinkCoeffs::closed(flow, tol);
    }
    let q = flow.abs().max(tol.tiny);

    let (hloss, hgrad) = match pump.curve_kind {
        PumpCurveKind::Custom => {
            let (h0, r) = head_curve
                .filter(|c| c.len() >= 2)
                .map_or((0.0, 1.0), |c| c.segment(q / speed));
            let hgrad = -r * speed;
            (-h0 * speed * speed + hgrad * flow, hgrad)
        }
        PumpCurveKind::PowerFunction => {
            let h0 = speed * speed * pump.h0;
            let n = if (pump.n - 1.0).abs() < tol.tiny { 1.0 } else { pump.n };
            let r = pump.r * speed.powf(2.0 - n);
            let hgrad = n * r * q.powf(n - 1.0);
            (h0 + hgrad * flow / n, hgrad)
        }
    };

    if hgrad < tol.rqtol {
        LinkCoeffs::from_gradient(hloss, tol.rqtol)
    } else {
        LinkCoeffs::from_gradient(hloss, hgrad)
    }
}

/// Wire-to-water efficiency (fraction) at flow `q` and relative speed.
///
/// Uses the pump's efficiency curve when present, otherwise the global
/// efficiency (percent). Off-design speeds are adjusted with the
/// Sarbu-Borza relation; the result is kept within 1%..100%.
pub fn pump_efficiency(curve: Option<&Curve>, q: f64, speed: f64, global_efficiency: f64) -> f64 {
    let e = match curve {
        Some(c) if speed > 0.0 => {
            let e = c.interpolate(q / speed);
            if speed != 1.0 {
                100.0 - (100.0 - e) * (1.0 / speed).powf(0.1)
            } else {
                e
            }
        }
        _ => global_efficiency,
    };
    e.clamp(1.0, 100.0) / 100.0
}

/// Power (kW) drawn to lift `q` (cfs) through `dh` (ft) at efficiency `e`.
pub fn pump_power(dh: f64, q: f64, specific_gravity: f64, e: f64) -> f64 {
    dh * q * specific_gravity / HP_DIVISOR / e * KW_PER_HP
}

#[cfg(test)]
mod tests {
    use super::*;
    use aq_core::CurveId;

    fn curve(x: &[f64], y: &[f64]) -> Curve {
        Curve {
            id: CurveId::from_index(0),
            name: "C".into(),
            x: x.to_vec(),
            y: y.to_vec(),
        }
    }

    #[test]
    fn power_pump_matches_design_point() {
        let tol = Tolerances::default();
        let c = curve(&[1.0], &[60.0]);
        let pump = Pump::from_head_curve(&c).unwrap();
        let k = pump_coeffs(&pump, Some(&c), LinkStatus::Open, 1.0, Some(1.0), &tol);
        // Y/P = headloss at q: -60 ft
        let hloss = k.y / k.p;
        assert!((hloss + 60.0).abs() < 1e-2, "hloss = {hloss}");
    }

    #[test]
    fn speed_scales_shutoff_head() {
        let tol = Tolerances::default();
        let c = curve(&[1.0], &[60.0]);
        let pump = Pump::from_head_curve(&c).unwrap();
        let full = pump_coeffs(&pump, Some(&c), LinkStatus::Open, 1e-9, Some(1.0), &tol);
        let half = pump_coeffs(&pump, Some(&c), LinkStatus::Open, 1e-9, Some(0.5), &tol);
        let h_full = full.y / full.p;
        let h_half = half.y / half.p;
        assert!((h_half / h_full - 0.25).abs() < 1e-3);
    }

    #[test]
    fn power_pump_linearizes_reverse_flow_on_signed_q() {
        let tol = Tolerances::default();
        let c = curve(&[1.0], &[60.0]);
        let pump = Pump::from_head_curve(&c).unwrap();
        let fwd = pump_coeffs(&pump, Some(&c), LinkStatus::Open, 0.5, Some(1.0), &tol);
        let rev = pump_coeffs(&pump, Some(&c), LinkStatus::Open, -0.5, Some(1.0), &tol);

        // same gradient both ways, intercept shifted by the flow sign
        assert!((fwd.p - rev.p).abs() < 1e-12);
        let hgrad = 1.0 / rev.p;
        let expected = (pump.h0 - hgrad * 0.5 / pump.n) * rev.p;
        assert!((rev.y - expected).abs() < 1e-9, "y = {}", rev.y);
        // h0 = -80, r = 20, n = 2: y goes from -3.75 to -4.25
        assert!((fwd.y + 3.75).abs() < 1e-3);
        assert!((rev.y + 4.25).abs() < 1e-3);
    }

    #[test]
    fn custom_curve_uses_segment() {
        let tol = Tolerances::default();
        let c = curve(&[0.0, 1.0, 2.0, 3.0], &[100.0, 90.0, 70.0, 40.0]);
        let pump = Pump::from_head_curve(&c).unwrap();
        assert_eq!(pump.curve_kind, PumpCurveKind::Custom);
        let k = pump_coeffs(&pump, Some(&c), LinkStatus::Open, 1.5, Some(1.0), &tol);
        // segment 1..2 has slope -20, head gain at 1.5 = 80
        assert!((k.p - 1.0 / 20.0).abs() < 1e-12);
        assert!((k.y / k.p + 80.0).abs() < 1e-9);
    }

    #[test]
    fn zero_speed_is_closed() {
        let tol = Tolerances::default();
        let c = curve(&[1.0], &[60.0]);
        let pump = Pump::from_head_curve(&c).unwrap();
        let k = pump_coeffs(&pump, Some(&c), LinkStatus::Open, 0.7, Some(0.0), &tol);
        assert_eq!(k, LinkCoeffs::closed(0.7, &tol));
    }

    #[test]
    fn efficiency_and_power() {
        let eff = curve(&[0.0, 2.0, 4.0], &[50.0, 80.0, 60.0]);
        assert!((pump_efficiency(Some(&eff), 2.0, 1.0, 75.0) - 0.8).abs() < 1e-12);
        assert!((pump_efficiency(None, 2.0, 1.0, 75.0) - 0.75).abs() < 1e-12);
        // slower speed degrades efficiency
        assert!(pump_efficiency(Some(&eff), 1.6, 0.8, 75.0) < 0.8);

        // 1 cfs through 88.14 ft at 100%: 10 hp = 7.457 kW
        let kw = pump_power(88.14, 1.0, 1.0, 1.0);
        assert!((kw - 7.457).abs() < 1e-9);
    }
}
