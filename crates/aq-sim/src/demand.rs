//! Time patterns applied at the start of each period.

use aq_network::{HydraulicState, Network};

/// Set junction demands, reservoir heads and pump speeds for pattern `period`.
///
/// Junction demand is the sum over its categories of base × pattern factor,
/// scaled by `multiplier`. Reservoirs with a head pattern take elevation ×
/// factor. A pump speed pattern overrides the current speed setting.
pub fn apply_patterns(
    network: &Network,
    state: &mut HydraulicState,
    period: i64,
    multiplier: f64,
) {
    for node in network.nodes() {
        let ns = &mut state.nodes[node.id.slot()];
        if node.is_junction() {
            ns.demand = node
                .demands
                .iter()
                .map(|d| d.base * network.pattern_factor(d.pattern, period))
                .sum::<f64>()
                * multiplier;
        } else if let Some(tank) = node.tank().filter(|t| t.is_reservoir()) {
            if tank.head_pattern.is_some() {
                ns.head = node.elevation * network.pattern_factor(tank.head_pattern, period);
            }
        }
    }

    for &id in network.pumps() {
        let Some(link) = network.link(id) else {
            continue;
        };
        let Some(pattern) = link.pump().and_then(|p| p.speed_pattern) else {
            continue;
        };
        let speed = network.pattern_factor(Some(pattern), period);
        state.links[id.slot()].set_setting(link, speed);
    }
}
