//! The validated, immutable network.

use std::collections::HashMap;

use aq_core::{CurveId, LinkId, NodeId, PatternId};
use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::link::Link;
use crate::node::Node;
use crate::pattern::Pattern;
use crate::tank::Tank;

/// Pipe friction headloss formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeadlossFormula {
    #[default]
    HazenWilliams,
    DarcyWeisbach,
    ChezyManning,
}

/// The network: arena-owned nodes, links, curves and patterns.
///
/// Records are stored in vectors indexed by their IDs; cross references are
/// IDs, never owning pointers. Node→link adjacency is kept in compact
/// offset/flat form.
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) nodes: Vec<Node>,
    pub(crate) links: Vec<Link>,
    pub(crate) curves: Vec<Curve>,
    pub(crate) patterns: Vec<Pattern>,

    /// Node i's links are in node_links[node_link_offsets[i]..node_link_offsets[i+1]].
    pub(crate) node_link_offsets: Vec<usize>,
    pub(crate) node_links: Vec<LinkId>,

    pub(crate) node_names: HashMap<String, NodeId>,
    pub(crate) link_names: HashMap<String, LinkId>,

    /// Pump links, in link order.
    pub(crate) pumps: Vec<LinkId>,
    /// Valve links of every kind, in link order.
    pub(crate) valves: Vec<LinkId>,
    /// Tank and reservoir nodes, in node order.
    pub(crate) tanks: Vec<NodeId>,

    pub(crate) headloss: HeadlossFormula,
    /// Kinematic viscosity (ft²/s) for Darcy-Weisbach.
    pub(crate) viscosity: f64,
}

impl Network {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.slot())
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.slot())
    }

    pub fn curve(&self, id: CurveId) -> Option<&Curve> {
        self.curves.get(id.slot())
    }

    pub fn pattern(&self, id: PatternId) -> Option<&Pattern> {
        self.patterns.get(id.slot())
    }

    /// Links incident to a node (either end).
    pub fn node_links(&self, node_id: NodeId) -> &[LinkId] {
        let idx = node_id.slot();
        if idx >= self.nodes.len() {
            return &[];
        }
        let start = self.node_link_offsets[idx];
        let end = self.node_link_offsets[idx + 1];
        &self.node_links[start..end]
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_names.get(name).copied()
    }

    pub fn find_link(&self, name: &str) -> Option<LinkId> {
        self.link_names.get(name).copied()
    }

    pub fn pumps(&self) -> &[LinkId] {
        &self.pumps
    }

    pub fn valves(&self) -> &[LinkId] {
        &self.valves
    }

    pub fn tanks(&self) -> &[NodeId] {
        &self.tanks
    }

    pub fn junction_count(&self) -> usize {
        self.nodes.len() - self.tanks.len()
    }

    pub fn headloss_formula(&self) -> HeadlossFormula {
        self.headloss
    }

    pub fn viscosity(&self) -> f64 {
        self.viscosity
    }

    /// Volume curve of a tank, if it has one.
    pub fn tank_curve(&self, tank: &Tank) -> Option<&Curve> {
        tank.volume_curve.and_then(|c| self.curve(c))
    }

    /// Pattern multiplier for a given pattern period; 1 without a pattern.
    pub fn pattern_factor(&self, pattern: Option<PatternId>, period: i64) -> f64 {
        pattern
            .and_then(|p| self.pattern(p))
            .map_or(1.0, |p| p.factor(period))
    }
}
