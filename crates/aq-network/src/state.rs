//! Per-period hydraulic state arrays.
//!
//! Structural records in [`crate::Network`] never change; everything that
//! evolves during a run lives here, in flat vectors indexed by node or link
//! slot.

use std::f64::consts::PI;

use aq_core::{LinkId, NodeId, Tolerances};
use serde::{Deserialize, Serialize};

use crate::link::{Link, LinkKind, LinkStatus, ValveKind};
use crate::network::Network;

/// Current volume and filling state of a tank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TankState {
    /// Stored volume (ft³); constant for reservoirs.
    pub volume: f64,
    /// `Filling`, `Emptying`, `Overflowing` or `Closed` after the last solve.
    pub status: LinkStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    /// Total head (ft).
    pub head: f64,
    /// Junctions: withdrawal (cfs). Tanks: net inflow, positive when filling.
    pub demand: f64,
    pub emitter_flow: f64,
    pub tank: Option<TankState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkState {
    pub status: LinkStatus,
    /// Flow (cfs), positive from `from` to `to`.
    pub flow: f64,
    /// Pump speed or valve setpoint; `None` leaves the valve uncontrolled.
    pub setting: Option<f64>,
    /// Inverse headloss slope from the last assembly.
    pub p: f64,
    /// Flow correction from the last assembly.
    pub y: f64,
}

impl LinkState {
    /// Force a link open or closed, resetting pump speed and valve setpoints.
    pub fn set_open(&mut self, link: &Link, open: bool) {
        match link.kind {
            LinkKind::Pump(_) => self.setting = Some(if open { 1.0 } else { 0.0 }),
            LinkKind::Valve(ValveKind::Gpv { .. }) => {}
            LinkKind::Valve(_) => self.setting = None,
            LinkKind::Pipe | LinkKind::CheckValve => {}
        }
        self.status = if open {
            LinkStatus::Open
        } else {
            LinkStatus::Closed
        };
    }

    /// Apply a new pump speed or valve setpoint; status follows the setting.
    pub fn set_setting(&mut self, link: &Link, value: f64) {
        match link.kind {
            LinkKind::Pump(_) => {
                self.setting = Some(value);
                if value > 0.0 && self.status.is_closed() {
                    self.status = LinkStatus::Open;
                }
                if value == 0.0 && !self.status.is_closed() {
                    self.status = LinkStatus::Closed;
                }
            }
            LinkKind::Valve(ValveKind::Fcv) => {
                self.setting = Some(value);
                self.status = LinkStatus::Active;
            }
            _ => {
                if self.setting.is_none() && self.status.is_closed() {
                    self.status = LinkStatus::Open;
                }
                self.setting = Some(value);
            }
        }
    }
}

/// Cumulative energy statistics of one pump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PumpEnergy {
    /// Hours online.
    pub online_hours: f64,
    /// Efficiency (fraction) × hours.
    pub efficiency_hours: f64,
    /// kWh per unit flow × hours.
    pub kwh_per_flow: f64,
    pub kwh: f64,
    pub peak_kw: f64,
    pub cost: f64,
}

/// Everything that changes over a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydraulicState {
    pub nodes: Vec<NodeState>,
    pub links: Vec<LinkState>,
    /// Parallel to [`Network::pumps`].
    pub energy: Vec<PumpEnergy>,
    /// Peak total pumping power (kW) over the run.
    pub peak_kw: f64,
}

impl HydraulicState {
    /// State at the start of a run.
    pub fn initial(network: &Network, tol: &Tolerances) -> Self {
        let nodes = network
            .nodes()
            .iter()
            .map(|node| {
                let tank = node.tank().map(|t| TankState {
                    volume: t.v_init,
                    status: LinkStatus::Closed,
                });
                NodeState {
                    head: node.tank().map_or(node.elevation, |t| t.h_init),
                    demand: 0.0,
                    emitter_flow: if node.has_emitter() { 1.0 } else { 0.0 },
                    tank,
                }
            })
            .collect();

        let links = network
            .links()
            .iter()
            .map(|link| initial_link(link, tol))
            .collect();

        Self {
            nodes,
            links,
            energy: vec![PumpEnergy::default(); network.pumps().len()],
            peak_kw: 0.0,
        }
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &NodeState {
        &self.nodes[id.slot()]
    }

    #[inline]
    pub fn link(&self, id: LinkId) -> &LinkState {
        &self.links[id.slot()]
    }

    #[inline]
    pub fn head(&self, id: NodeId) -> f64 {
        self.nodes[id.slot()].head
    }

    /// Total junction demand (cfs).
    pub fn system_demand(&self, network: &Network) -> f64 {
        network
            .nodes()
            .iter()
            .filter(|n| n.is_junction())
            .map(|n| self.nodes[n.id.slot()].demand)
            .sum()
    }
}

fn initial_link(link: &Link, tol: &Tolerances) -> LinkState {
    let mut status = link.initial_status;
    let mut setting = link.initial_setting;

    if let LinkKind::Pump(_) = link.kind {
        if status.is_closed() {
            setting = Some(0.0);
        } else if setting.is_none() {
            setting = Some(1.0);
        }
    }
    if link.is_control_valve() && setting.is_some() {
        status = LinkStatus::Active;
    }

    let flow = if status.is_closed() {
        tol.qzero
    } else {
        match &link.kind {
            LinkKind::Pump(pump) => setting.unwrap_or(1.0) * pump.q0,
            _ => PI * link.diameter * link.diameter / 4.0,
        }
    };

    LinkState {
        status,
        flow,
        setting,
        p: 0.0,
        y: 0.0,
    }
}
