//! Links: a single record with a category tag and category payload.

use aq_core::{CurveId, LinkId, NodeId};
use serde::{Deserialize, Serialize};

use crate::pump::Pump;

/// Discrete operating state of a link.
///
/// The declaration order is a total order that status logic relies on:
///
/// `Xhead < TempClosed < Closed < Open < Active < Xfcv < Xpressure < Filling
/// < Emptying < Overflowing`
///
/// Everything up to and including `Closed` counts as closed (see
/// [`LinkStatus::is_closed`]). The last three values describe tanks;
/// `Overflowing` is a full tank that spills its inflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LinkStatus {
    /// Pump cannot deliver the required head; closed.
    Xhead,
    /// Closed by the solver to protect a full or empty tank.
    TempClosed,
    Closed,
    Open,
    /// Control valve holding its setpoint.
    Active,
    /// FCV cannot pass its target flow.
    Xfcv,
    /// PRV/PSV cannot hold its pressure setting.
    Xpressure,
    Filling,
    Emptying,
    Overflowing,
}

impl LinkStatus {
    #[inline]
    pub fn is_closed(self) -> bool {
        self <= LinkStatus::Closed
    }

    /// Open/closed/active class used by rule premises.
    pub fn class(self) -> LinkStatus {
        if self.is_closed() {
            LinkStatus::Closed
        } else if self == LinkStatus::Active {
            LinkStatus::Active
        } else {
            LinkStatus::Open
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValveKind {
    /// Pressure reducing: setting is downstream pressure head.
    Prv,
    /// Pressure sustaining: setting is upstream pressure head.
    Psv,
    /// Pressure breaker: setting is the headloss across the valve.
    Pbv,
    /// Flow control: setting is the flow.
    Fcv,
    /// Throttle control: setting is a loss coefficient.
    Tcv,
    /// General purpose: headloss vs. flow curve.
    Gpv { curve: CurveId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkKind {
    Pipe,
    /// Pipe that only passes forward flow.
    CheckValve,
    Pump(Pump),
    Valve(ValveKind),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    pub from: NodeId,
    pub to: NodeId,
    /// Diameter (ft).
    pub diameter: f64,
    /// Length (ft); unused for pumps and valves.
    pub length: f64,
    /// Hazen-Williams C, Darcy-Weisbach roughness (ft) or Manning n.
    pub roughness: f64,
    /// Minor loss in head-per-flow² form, `0.02517·K/d⁴`.
    pub minor_loss: f64,
    pub kind: LinkKind,
    pub initial_status: LinkStatus,
    /// Pump speed or valve setpoint; `None` means the valve is fixed open/closed.
    pub initial_setting: Option<f64>,
}

impl Link {
    pub fn pump(&self) -> Option<&Pump> {
        match &self.kind {
            LinkKind::Pump(p) => Some(p),
            _ => None,
        }
    }

    pub fn valve(&self) -> Option<ValveKind> {
        match self.kind {
            LinkKind::Valve(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_pipe(&self) -> bool {
        matches!(self.kind, LinkKind::Pipe | LinkKind::CheckValve)
    }

    /// PRV, PSV or FCV: valves whose active state injects a penalty at a node.
    pub fn is_control_valve(&self) -> bool {
        matches!(
            self.kind,
            LinkKind::Valve(ValveKind::Prv | ValveKind::Psv | ValveKind::Fcv)
        )
    }

    pub fn category(&self) -> &'static str {
        match self.kind {
            LinkKind::Pipe => "pipe",
            LinkKind::CheckValve => "check valve",
            LinkKind::Pump(_) => "pump",
            LinkKind::Valve(ValveKind::Prv) => "PRV",
            LinkKind::Valve(ValveKind::Psv) => "PSV",
            LinkKind::Valve(ValveKind::Pbv) => "PBV",
            LinkKind::Valve(ValveKind::Fcv) => "FCV",
            LinkKind::Valve(ValveKind::Tcv) => "TCV",
            LinkKind::Valve(ValveKind::Gpv { .. }) => "GPV",
        }
    }
}
