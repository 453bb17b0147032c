//! Pump energy usage and cost.

use aq_components::{pump_efficiency, pump_power};
use aq_core::{LinkId, Seconds, Tolerances, units::constants::SEC_PER_HOUR};
use aq_network::{HydraulicState, Network};
use serde::{Deserialize, Serialize};

use crate::options::EnergyOptions;

/// Operating point of one online pump after a solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpLoad {
    /// Position in [`Network::pumps`].
    pub index: usize,
    pub kw: f64,
    /// Efficiency as a fraction.
    pub efficiency: f64,
    /// |Q|, at least `qzero`.
    pub flow: f64,
    /// Energy price per kWh in effect for the period.
    pub price: f64,
}

/// Power drawn by every online pump at the solved state. Closed pumps are
/// left out.
pub fn pump_loads(
    network: &Network,
    state: &HydraulicState,
    options: &EnergyOptions,
    period: i64,
    tol: &Tolerances,
) -> Vec<PumpLoad> {
    let global_factor = network.pattern_factor(options.price_pattern, period);
    let mut loads = Vec::new();
    for (index, &id) in network.pumps().iter().enumerate() {
        let Some(link) = network.link(id) else {
            continue;
        };
        let Some(pump) = link.pump() else {
            continue;
        };
        let ls = state.link(id);
        if ls.status.is_closed() {
            continue;
        }

        let price = if pump.energy_price > 0.0 {
            pump.energy_price
        } else {
            options.global_price
        };
        let price = match pump.price_pattern {
            Some(p) => price * network.pattern_factor(Some(p), period),
            None => price * global_factor,
        };

        let q = ls.flow.abs().max(tol.qzero);
        let dh = (state.head(link.from) - state.head(link.to)).abs();
        let speed = ls.setting.unwrap_or(1.0);
        let curve = pump.efficiency_curve.and_then(|c| network.curve(c));
        let e = pump_efficiency(curve, q, speed, options.global_efficiency);
        loads.push(PumpLoad {
            index,
            kw: pump_power(dh, q, options.specific_gravity, e),
            efficiency: e,
            flow: q,
            price,
        });
    }
    loads
}

/// Add `loads` held over a step of `dt` seconds to the running totals in
/// `state`. A steady run (zero `duration`) counts as one hour. Returns the
/// total pumping power (kW).
pub fn accumulate_energy(
    state: &mut HydraulicState,
    loads: &[PumpLoad],
    dt: Seconds,
    duration: Seconds,
) -> f64 {
    let hours = if duration == 0 {
        1.0
    } else {
        dt as f64 / SEC_PER_HOUR
    };
    if hours <= 0.0 {
        return 0.0;
    }
    let mut total_kw = 0.0;
    for load in loads {
        let Some(acc) = state.energy.get_mut(load.index) else {
            continue;
        };
        acc.online_hours += hours;
        acc.efficiency_hours += load.efficiency * hours;
        acc.kwh_per_flow += load.kw / load.flow * hours;
        acc.kwh += load.kw * hours;
        acc.peak_kw = acc.peak_kw.max(load.kw);
        acc.cost += load.price * load.kw * hours;
        total_kw += load.kw;
    }
    state.peak_kw = state.peak_kw.max(total_kw);
    total_kw
}

/// Summary of one pump over the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PumpEnergyReport {
    pub link: LinkId,
    /// Share of the run spent online (%).
    pub utilization: f64,
    /// Mean efficiency while online (%).
    pub efficiency: f64,
    /// Mean kWh per unit of flow (cfs·h).
    pub kwh_per_flow: f64,
    /// Mean power while online (kW).
    pub average_kw: f64,
    pub peak_kw: f64,
    pub cost_per_day: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyReport {
    pub pumps: Vec<PumpEnergyReport>,
    /// Peak total pumping power over the run (kW).
    pub peak_kw: f64,
    pub demand_charge: f64,
}

impl EnergyReport {
    pub fn new(
        network: &Network,
        state: &HydraulicState,
        options: &EnergyOptions,
        duration: Seconds,
    ) -> Self {
        let run_hours = if duration == 0 {
            1.0
        } else {
            duration as f64 / SEC_PER_HOUR
        };
        let pumps = network
            .pumps()
            .iter()
            .zip(&state.energy)
            .map(|(&link, acc)| {
                let online = acc.online_hours;
                let per_hour = |x: f64| if online > 0.0 { x / online } else { 0.0 };
                PumpEnergyReport {
                    link,
                    utilization: online / run_hours * 100.0,
                    efficiency: per_hour(acc.efficiency_hours) * 100.0,
                    kwh_per_flow: per_hour(acc.kwh_per_flow),
                    average_kw: per_hour(acc.kwh),
                    peak_kw: acc.peak_kw,
                    cost_per_day: acc.cost * 24.0 / run_hours,
                }
            })
            .collect();
        Self {
            pumps,
            peak_kw: state.peak_kw,
            demand_charge: state.peak_kw * options.demand_charge,
        }
    }

    /// Energy cost of all pumps per day plus the demand charge.
    pub fn total_cost(&self) -> f64 {
        self.pumps.iter().map(|p| p.cost_per_day).sum::<f64>() + self.demand_charge
    }
}
