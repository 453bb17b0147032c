//! Per-period results of a run.

use aq_controls::ActionEvent;
use aq_core::Seconds;
use aq_network::{HydraulicState, LinkStatus, Network};
use aq_solver::{HydraulicSolution, StatusChange};
use serde::{Deserialize, Serialize};

use crate::energy::EnergyReport;

/// Snapshot of one solved period. Vectors are indexed by node or link slot;
/// `tank_volumes` is parallel to [`Network::tanks`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodResult {
    /// Elapsed time (s).
    pub time: Seconds,
    pub heads: Vec<f64>,
    pub demands: Vec<f64>,
    pub emitter_flows: Vec<f64>,
    pub tank_volumes: Vec<f64>,
    pub flows: Vec<f64>,
    pub statuses: Vec<LinkStatus>,
    pub settings: Vec<Option<f64>>,
    pub iterations: usize,
    pub relative_error: f64,
    pub converged: bool,
    pub status_changes: Vec<StatusChange>,
    /// Control and rule actions applied before this period's solve.
    pub actions: Vec<ActionEvent>,
}

impl PeriodResult {
    pub fn capture(
        network: &Network,
        state: &HydraulicState,
        time: Seconds,
        solution: HydraulicSolution,
        actions: Vec<ActionEvent>,
    ) -> Self {
        Self {
            time,
            heads: state.nodes.iter().map(|n| n.head).collect(),
            demands: state.nodes.iter().map(|n| n.demand).collect(),
            emitter_flows: state.nodes.iter().map(|n| n.emitter_flow).collect(),
            tank_volumes: network
                .tanks()
                .iter()
                .map(|&id| state.node(id).tank.map_or(0.0, |t| t.volume))
                .collect(),
            flows: state.links.iter().map(|l| l.flow).collect(),
            statuses: state.links.iter().map(|l| l.status).collect(),
            settings: state.links.iter().map(|l| l.setting).collect(),
            iterations: solution.iterations,
            relative_error: solution.relative_error,
            converged: solution.converged,
            status_changes: solution.status_changes,
            actions,
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimRecord {
    pub periods: Vec<PeriodResult>,
    pub energy: Option<EnergyReport>,
}

impl SimRecord {
    /// Periods that fall on a report time.
    pub fn report_periods<'a>(
        &'a self,
        report_start: Seconds,
        report_step: Seconds,
    ) -> impl Iterator<Item = &'a PeriodResult> + 'a {
        self.periods.iter().filter(move |p| {
            p.time >= report_start && report_step > 0 && (p.time - report_start) % report_step == 0
        })
    }

    /// Periods whose solve ran out of trials.
    pub fn unconverged(&self) -> impl Iterator<Item = &PeriodResult> {
        self.periods.iter().filter(|p| !p.converged)
    }
}
