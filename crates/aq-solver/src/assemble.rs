//! Coefficient assembly for one trial solve.
//!
//! Order within a pass:
//! 1. clear the accumulator
//! 2. link coefficients folded into rows and nodal net inflow, skipping
//!    PRV/PSV/FCV that hold a setpoint
//! 3. emitters
//! 4. node demand completion
//! 5. setpoint valves, which need the completed net inflow

use aq_components::{HeadlossModel, emitter_headloss, headloss_model, link_coeffs, valve_coeffs};
use aq_core::Tolerances;
use aq_network::{HydraulicState, Link, LinkState, LinkStatus, Network, ValveKind};
use rayon::prelude::*;
use tracing::debug;

use crate::config::HydraulicConfig;
use crate::matrix::LinearSystem;
use crate::sparsity::{LinkRows, SparsePattern};

/// Valve holding a setpoint; assembled after the nodal balance.
#[inline]
fn holds_setpoint(link: &Link, ls: &LinkState) -> bool {
    link.is_control_valve() && ls.setting.is_some()
}

pub struct Assembler<'n> {
    network: &'n Network,
    model: Box<dyn HeadlossModel>,
    tol: Tolerances,
    emitter_exponent: f64,
    parallel: bool,
}

impl<'n> Assembler<'n> {
    pub fn new(network: &'n Network, config: &HydraulicConfig) -> Self {
        let model = headloss_model(network.headloss_formula(), network.viscosity());
        debug!(
            formula = model.name(),
            parallel = config.parallel_assembly,
            "assembler ready"
        );
        Self {
            network,
            model,
            tol: config.tolerances,
            emitter_exponent: config.emitter_exponent,
            parallel: config.parallel_assembly,
        }
    }

    /// Build the head equations for the current state. Link `p`/`y` are
    /// written back into `state`.
    pub fn assemble(
        &self,
        pattern: &SparsePattern,
        state: &mut HydraulicState,
        system: &mut LinearSystem,
    ) {
        self.link_coefficients(state);
        if self.parallel {
            *system = self.fold_links_parallel(pattern, state, system);
        } else {
            system.clear();
            for k in 0..self.network.links().len() {
                self.fold_link(k, pattern.link(k), state, system);
            }
        }
        self.emitter_coeffs(pattern, state, system);
        self.node_coeffs(pattern, state, system);
        self.valve_coeffs(pattern, state, system);
    }

    /// Per-link `P`/`Y`. Each link writes only its own state slot.
    fn link_coefficients(&self, state: &mut HydraulicState) {
        let network = self.network;
        let model = self.model.as_ref();
        let tol = &self.tol;
        let update = |(ls, link): (&mut LinkState, &Link)| {
            if holds_setpoint(link, ls) {
                return;
            }
            let c = link_coeffs(network, link, ls, model, tol);
            ls.p = c.p;
            ls.y = c.y;
        };
        if self.parallel {
            state
                .links
                .par_iter_mut()
                .zip(network.links().par_iter())
                .for_each(update);
        } else {
            state.links.iter_mut().zip(network.links()).for_each(update);
        }
    }

    fn fold_links_parallel(
        &self,
        pattern: &SparsePattern,
        state: &HydraulicState,
        system: &LinearSystem,
    ) -> LinearSystem {
        let shape = (
            system.rows(),
            self.network.links().len(),
            self.network.nodes().len(),
        );
        let empty = || LinearSystem::new(shape.0, shape.1, shape.2);
        (0..shape.1)
            .into_par_iter()
            .fold(empty, |mut partial, k| {
                self.fold_link(k, pattern.link(k), state, &mut partial);
                partial
            })
            .reduce(empty, |a, b| a.merge(&b))
    }

    fn fold_link(&self, k: usize, rows: LinkRows, state: &HydraulicState, sys: &mut LinearSystem) {
        let link = &self.network.links()[k];
        let ls = &state.links[k];
        if holds_setpoint(link, ls) {
            return;
        }
        sys.add_inflow(link.from.slot(), -ls.flow);
        sys.add_inflow(link.to.slot(), ls.flow);
        fold_branch(k, rows, ls.p, ls.y, state, link, sys);
    }

    fn emitter_coeffs(
        &self,
        pattern: &SparsePattern,
        state: &HydraulicState,
        sys: &mut LinearSystem,
    ) {
        for node in self.network.nodes().iter().filter(|n| n.has_emitter()) {
            let Some(row) = pattern.row_map().row(node.id) else {
                continue;
            };
            let q = state.node(node.id).emitter_flow;
            let (hloss, hgrad) = emitter_headloss(node.emitter, self.emitter_exponent, q, &self.tol);
            sys.add_diag(row, 1.0 / hgrad);
            sys.add_rhs(row, (hloss + node.elevation) / hgrad);
            sys.add_inflow(node.id.slot(), -q);
        }
    }

    /// Subtract junction demand from the net inflow and move it to the RHS.
    fn node_coeffs(&self, pattern: &SparsePattern, state: &HydraulicState, sys: &mut LinearSystem) {
        for (row, &id) in pattern.row_map().nodes().iter().enumerate() {
            let slot = id.slot();
            sys.add_inflow(slot, -state.nodes[slot].demand);
            sys.add_rhs(row, sys.inflow(slot));
        }
    }

    /// PRV, PSV and FCV holding a setpoint.
    fn valve_coeffs(
        &self,
        pattern: &SparsePattern,
        state: &mut HydraulicState,
        sys: &mut LinearSystem,
    ) {
        let cbig = self.tol.cbig;
        for &id in self.network.valves() {
            let Some(link) = self.network.link(id) else {
                continue;
            };
            let k = id.slot();
            let ls = state.links[k];
            let Some(setting) = ls.setting.filter(|_| link.is_control_valve()) else {
                continue;
            };
            let rows = pattern.link(k);
            let (n1, n2) = (link.from.slot(), link.to.slot());
            let active = ls.status == LinkStatus::Active;

            let (p, y) = match link.valve() {
                Some(ValveKind::Prv) if active => {
                    let hset = self.elevation(link.to) + setting;
                    let x2 = sys.inflow(n2);
                    if let Some(j) = rows.to {
                        sys.add_diag(j, cbig);
                        sys.add_rhs(j, cbig * hset);
                    }
                    if let (Some(i), true) = (rows.from, x2 < 0.0) {
                        sys.add_rhs(i, x2);
                    }
                    (0.0, ls.flow + x2)
                }
                Some(ValveKind::Psv) if active => {
                    let hset = self.elevation(link.from) + setting;
                    let x1 = sys.inflow(n1);
                    if let Some(i) = rows.from {
                        sys.add_diag(i, cbig);
                        sys.add_rhs(i, cbig * hset);
                    }
                    if let (Some(j), true) = (rows.to, x1 > 0.0) {
                        sys.add_rhs(j, x1);
                    }
                    (0.0, ls.flow - x1)
                }
                Some(ValveKind::Fcv) if active => {
                    // break the network at the valve; the setting becomes a
                    // demand upstream and a supply downstream
                    let p = 1.0 / cbig;
                    if let Some(i) = rows.from {
                        sys.add_rhs(i, -setting);
                    }
                    if let Some(j) = rows.to {
                        sys.add_rhs(j, setting);
                    }
                    fold_branch(k, rows, p, 0.0, state, link, sys);
                    (p, ls.flow - setting)
                }
                _ => {
                    let c = valve_coeffs(link.minor_loss, ls.status, ls.flow, &self.tol);
                    fold_branch(k, rows, c.p, c.y - ls.flow, state, link, sys);
                    (c.p, c.y)
                }
            };
            state.links[k].p = p;
            state.links[k].y = y;
        }
    }

    fn elevation(&self, node: aq_core::NodeId) -> f64 {
        self.network.node(node).map_or(0.0, |n| n.elevation)
    }
}

/// Fold a branch with slope `p` and RHS term `y` into its end rows. A
/// fixed-grade end moves `p·H` onto the other row.
fn fold_branch(
    k: usize,
    rows: LinkRows,
    p: f64,
    y: f64,
    state: &HydraulicState,
    link: &Link,
    sys: &mut LinearSystem,
) {
    if rows.offdiag().is_some() {
        sys.add_offdiag(k, -p);
    }
    match (rows.from, rows.to) {
        (Some(i), Some(j)) => {
            sys.add_diag(i, p);
            sys.add_rhs(i, y);
            sys.add_diag(j, p);
            sys.add_rhs(j, -y);
        }
        (Some(i), None) => {
            sys.add_diag(i, p);
            sys.add_rhs(i, y + p * state.head(link.to));
        }
        (None, Some(j)) => {
            sys.add_diag(j, p);
            sys.add_rhs(j, -y + p * state.head(link.from));
        }
        (None, None) => {}
    }
}
