//! Tank volume integration between periods.

use aq_core::Seconds;
use aq_network::{HydraulicState, Network};

/// Advance every storage tank by `dt` seconds at its current net inflow.
///
/// Explicit Euler on volume, clamped to `[v_min, v_max]`. A tank within one
/// second of inflow of a limit snaps to it, so a level control set at the
/// limit still sees it reached. An overflowing tank spills at `v_max`.
/// Reservoirs are left alone.
pub fn advance_tanks(network: &Network, state: &mut HydraulicState, dt: Seconds) {
    let dt = dt as f64;
    for &id in network.tanks() {
        let Some(node) = network.node(id) else {
            continue;
        };
        let Some(tank) = node.storage_tank() else {
            continue;
        };
        let ns = &mut state.nodes[id.slot()];
        let Some(ts) = ns.tank.as_mut() else {
            continue;
        };
        let q = ns.demand;
        let mut v = ts.volume + q * dt;
        if v + q >= tank.v_max {
            v = tank.v_max;
        }
        if v - q <= tank.v_min {
            v = tank.v_min;
        }
        v = v.clamp(tank.v_min, tank.v_max);

        ts.volume = v;
        ns.head = tank.head_at(v, node.elevation, network.tank_curve(tank));
    }
}

/// Tank volumes and heads captured so a tentative advance can be undone.
#[derive(Debug, Clone, PartialEq)]
pub struct TankSnapshot {
    entries: Vec<(usize, f64, f64)>,
}

impl TankSnapshot {
    pub fn capture(network: &Network, state: &HydraulicState) -> Self {
        let entries = network
            .tanks()
            .iter()
            .filter_map(|&id| {
                let ns = state.node(id);
                ns.tank.map(|t| (id.slot(), t.volume, ns.head))
            })
            .collect();
        Self { entries }
    }

    pub fn restore(&self, state: &mut HydraulicState) {
        for &(slot, volume, head) in &self.entries {
            let ns = &mut state.nodes[slot];
            ns.head = head;
            if let Some(t) = ns.tank.as_mut() {
                t.volume = volume;
            }
        }
    }
}
