//! Iterate-to-convergence loop for one hydraulic period.

use aq_components::emitter_flow_change;
use aq_controls::{Control, pressure_switches};
use aq_core::NodeId;
use aq_network::{HydraulicState, LinkStatus, Network, ValveKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assemble::Assembler;
use crate::config::{DAMPED_RELAXATION, HydraulicConfig};
use crate::error::{SolverError, SolverResult};
use crate::linear::{DenseCholesky, LinearSolver};
use crate::matrix::LinearSystem;
use crate::sparsity::SparsePattern;
use crate::status::{StatusChange, StatusLog, link_status, valve_status};

/// Outcome of one period's solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydraulicSolution {
    /// Trials used
    pub iterations: usize,
    /// Final `Σ|Δq| / Σ|q|`
    pub relative_error: f64,
    /// False when trials ran out first
    pub converged: bool,
    pub status_changes: Vec<StatusChange>,
}

/// Gradient-method solver bound to one network.
pub struct HydraulicSolver<'n> {
    network: &'n Network,
    config: HydraulicConfig,
    pattern: SparsePattern,
    assembler: Assembler<'n>,
    system: LinearSystem,
    linear: Box<dyn LinearSolver>,
}

impl<'n> HydraulicSolver<'n> {
    pub fn new(network: &'n Network, config: HydraulicConfig) -> SolverResult<Self> {
        if config.max_trials == 0 {
            return Err(SolverError::ProblemSetup {
                what: "max_trials must be at least 1".into(),
            });
        }
        if !(config.accuracy > 0.0) {
            return Err(SolverError::ProblemSetup {
                what: format!("accuracy must be positive, got {}", config.accuracy),
            });
        }
        if !(config.emitter_exponent > 0.0) {
            return Err(SolverError::ProblemSetup {
                what: format!(
                    "emitter exponent must be positive, got {}",
                    config.emitter_exponent
                ),
            });
        }
        let pattern = SparsePattern::new(network)?;
        let system = LinearSystem::new(
            pattern.row_count(),
            network.links().len(),
            network.nodes().len(),
        );
        Ok(Self {
            network,
            config,
            assembler: Assembler::new(network, &config),
            pattern,
            system,
            linear: Box::new(DenseCholesky::new()),
        })
    }

    /// Replace the default dense factorization.
    pub fn with_linear_solver(mut self, linear: Box<dyn LinearSolver>) -> Self {
        self.linear = linear;
        self
    }

    pub fn network(&self) -> &'n Network {
        self.network
    }

    pub fn config(&self) -> &HydraulicConfig {
        &self.config
    }

    pub fn pattern(&self) -> &SparsePattern {
        &self.pattern
    }

    /// Solve heads and flows for the current demands, fixed heads and link
    /// settings in `state`. `controls` supplies junction pressure switches.
    ///
    /// Running out of trials is not an error: the solution reports
    /// `converged == false`. The only failure is a singular system that no
    /// valve status change can repair.
    pub fn solve(
        &mut self,
        state: &mut HydraulicState,
        controls: &[Control],
    ) -> SolverResult<HydraulicSolution> {
        let cfg = self.config;
        let tol = cfg.tolerances;
        let mut log = StatusLog::new(cfg.log_status_changes);

        let mut relax = 1.0;
        let mut next_check = cfg.check_freq;
        let mut relerr = 0.0;
        let mut converged = false;
        let mut iter = 0;

        while iter < cfg.max_trials {
            iter += 1;
            self.assembler.assemble(&self.pattern, state, &mut self.system);

            let heads = match self.linear.solve(&self.system, &self.pattern) {
                Ok(x) => x,
                Err(SolverError::Singular { row }) => {
                    let node = self.pattern.row_map().node(row);
                    if self.bad_valve(node, state, &mut log) {
                        continue;
                    }
                    let name = self.node_name(node);
                    warn!(node = %name, links = ?self.pattern.row_links(row), "ill-conditioned system");
                    return Err(SolverError::IllConditioned { node: name });
                }
                Err(e) => return Err(e),
            };
            for (row, id) in self.pattern.row_map().nodes().iter().enumerate() {
                state.nodes[id.slot()].head = heads[row];
            }

            relerr = self.new_flows(state, relax);
            debug!(iter, relerr, "trial");

            relax = 1.0;
            let mut valve_change = false;
            if cfg.damp_limit > 0.0 {
                if relerr <= cfg.damp_limit {
                    relax = DAMPED_RELAXATION;
                    valve_change = valve_status(self.network, state, &tol, &mut log);
                }
            } else {
                valve_change = valve_status(self.network, state, &tol, &mut log);
            }

            if relerr <= cfg.accuracy {
                let link_change = link_status(self.network, state, &tol, &mut log);
                let switch_change = pressure_switches(controls, self.network, state, &tol);
                if !(valve_change || link_change || switch_change) {
                    converged = true;
                    break;
                }
                next_check = iter + cfg.check_freq;
            } else if iter <= cfg.max_check && iter == next_check {
                link_status(self.network, state, &tol, &mut log);
                next_check += cfg.check_freq;
            }
        }

        self.update_tank_status(state);
        if !converged {
            warn!(
                trials = iter,
                relative_error = relerr,
                "hydraulic solution did not converge"
            );
        }

        Ok(HydraulicSolution {
            iterations: iter,
            relative_error: relerr,
            converged,
            status_changes: log.take(),
        })
    }

    /// Update link and emitter flows from new heads; net inflow to
    /// fixed-grade nodes follows. Returns the relative flow change.
    fn new_flows(&self, state: &mut HydraulicState, relax: f64) -> f64 {
        let tol = &self.config.tolerances;
        let mut qsum = 0.0;
        let mut dqsum = 0.0;

        for &id in self.network.tanks() {
            state.nodes[id.slot()].demand = 0.0;
        }

        for link in self.network.links() {
            let (h1, h2) = (state.head(link.from), state.head(link.to));
            let ls = &mut state.links[link.id.slot()];
            let dq = (ls.y - ls.p * (h1 - h2)) * relax;
            ls.flow -= dq;
            qsum += ls.flow.abs();
            dqsum += dq.abs();

            let q = ls.flow;
            if state.nodes[link.from.slot()].tank.is_some() {
                state.nodes[link.from.slot()].demand -= q;
            }
            if state.nodes[link.to.slot()].tank.is_some() {
                state.nodes[link.to.slot()].demand += q;
            }
        }

        for node in self.network.nodes().iter().filter(|n| n.has_emitter()) {
            let ns = &mut state.nodes[node.id.slot()];
            let dq = emitter_flow_change(
                node.emitter,
                self.config.emitter_exponent,
                ns.emitter_flow,
                ns.head,
                node.elevation,
                tol,
            );
            ns.emitter_flow -= dq;
            qsum += ns.emitter_flow.abs();
            dqsum += dq.abs();
        }

        if qsum > self.config.accuracy {
            dqsum / qsum
        } else {
            dqsum
        }
    }

    /// Force the first valve touching `node` out of its active state.
    /// Returns true when a valve changed and the trial can be retried.
    ///
    /// Only the first adjacent valve is looked at, of any kind. A TCV, PBV
    /// or GPV there, or a setpoint valve that is not active, ends the scan.
    fn bad_valve(&self, node: NodeId, state: &mut HydraulicState, log: &mut StatusLog) -> bool {
        let Some(link) = self
            .network
            .valves()
            .iter()
            .filter_map(|&id| self.network.link(id))
            .find(|l| l.from == node || l.to == node)
        else {
            return false;
        };
        let ls = &mut state.links[link.id.slot()];
        if !link.is_control_valve() || ls.status != LinkStatus::Active {
            return false;
        }
        let to = if matches!(link.valve(), Some(ValveKind::Fcv)) {
            LinkStatus::Xfcv
        } else {
            LinkStatus::Xpressure
        };
        warn!(valve = %link.name, node = %self.node_name(node), ?to, "valve cannot deliver its setting");
        log.record(link, ls.status, to);
        ls.status = to;
        true
    }

    fn update_tank_status(&self, state: &mut HydraulicState) {
        let tol = &self.config.tolerances;
        let qzero = tol.qzero;
        for &id in self.network.tanks() {
            let spills = self
                .network
                .node(id)
                .and_then(|n| n.storage_tank())
                .is_some_and(|t| t.can_overflow && state.head(id) >= t.h_max - tol.htol);
            let ns = &mut state.nodes[id.slot()];
            let demand = ns.demand;
            if let Some(tank) = ns.tank.as_mut() {
                tank.status = if demand > qzero && spills {
                    LinkStatus::Overflowing
                } else if demand > qzero {
                    LinkStatus::Filling
                } else if demand < -qzero {
                    LinkStatus::Emptying
                } else {
                    LinkStatus::Closed
                };
            }
        }
    }

    fn node_name(&self, node: NodeId) -> String {
        self.network
            .node(node)
            .map_or_else(|| format!("#{}", node.index()), |n| n.name.clone())
    }
}
