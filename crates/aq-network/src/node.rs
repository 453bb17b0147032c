//! Nodes: junctions and fixed-grade nodes (tanks, reservoirs).

use aq_core::{NodeId, PatternId};
use serde::{Deserialize, Serialize};

use crate::tank::Tank;

/// One demand category: a base flow scaled by an optional pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    pub base: f64,
    pub pattern: Option<PatternId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Junction,
    /// Tank or reservoir (zero area). Head is fixed during a solve.
    Tank(Tank),
}

/// A node of the network. Structural fields only; the per-period head,
/// demand and emitter flow live in [`crate::NodeState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Elevation (ft).
    pub elevation: f64,
    pub demands: Vec<Demand>,
    /// Emitter discharge coefficient, flow per (pressure head)^exponent. 0 = none.
    pub emitter: f64,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_junction(&self) -> bool {
        matches!(self.kind, NodeKind::Junction)
    }

    pub fn tank(&self) -> Option<&Tank> {
        match &self.kind {
            NodeKind::Tank(tank) => Some(tank),
            NodeKind::Junction => None,
        }
    }

    /// Tank with storage (not a reservoir).
    pub fn storage_tank(&self) -> Option<&Tank> {
        self.tank().filter(|t| !t.is_reservoir())
    }

    pub fn has_emitter(&self) -> bool {
        self.is_junction() && self.emitter > 0.0
    }
}
