//! Incremental network builder.

use std::collections::HashMap;
use std::f64::consts::PI;

use aq_core::{CurveId, LinkId, NodeId, PatternId, units::constants::MINOR_LOSS_FACTOR};

use crate::curve::Curve;
use crate::error::{NetworkError, NetworkResult};
use crate::link::{Link, LinkKind, LinkStatus, ValveKind};
use crate::network::{HeadlossFormula, Network};
use crate::node::{Demand, Node, NodeKind};
use crate::pattern::Pattern;
use crate::pump::Pump;
use crate::tank::Tank;
use crate::validate;

/// Geometry of a pipe or check valve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipeSpec {
    /// Length (ft).
    pub length: f64,
    /// Diameter (ft).
    pub diameter: f64,
    pub roughness: f64,
    /// Minor loss coefficient K (dimensionless).
    pub minor_loss: f64,
}

impl PipeSpec {
    pub fn new(length: f64, diameter: f64, roughness: f64) -> Self {
        Self {
            length,
            diameter,
            roughness,
            minor_loss: 0.0,
        }
    }

    pub fn with_minor_loss(mut self, k: f64) -> Self {
        self.minor_loss = k;
        self
    }
}

/// A valve: kind, diameter, optional setpoint and minor loss K.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValveSpec {
    pub kind: ValveKind,
    /// Diameter (ft).
    pub diameter: f64,
    pub setting: Option<f64>,
    pub minor_loss: f64,
}

impl ValveSpec {
    pub fn new(kind: ValveKind, diameter: f64) -> Self {
        Self {
            kind,
            diameter,
            setting: None,
            minor_loss: 0.0,
        }
    }

    pub fn with_setting(mut self, setting: f64) -> Self {
        self.setting = Some(setting);
        self
    }

    pub fn with_minor_loss(mut self, k: f64) -> Self {
        self.minor_loss = k;
        self
    }
}

/// Storage tank description; levels are depths above `elevation` (ft).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankSpec {
    pub elevation: f64,
    pub init_level: f64,
    pub min_level: f64,
    pub max_level: f64,
    pub diameter: f64,
    /// Volume below the minimum level (ft³); 0 derives it from the area.
    pub min_volume: f64,
    pub volume_curve: Option<CurveId>,
    pub can_overflow: bool,
}

impl TankSpec {
    pub fn new(elevation: f64, init_level: f64, min_level: f64, max_level: f64, diameter: f64) -> Self {
        Self {
            elevation,
            init_level,
            min_level,
            max_level,
            diameter,
            min_volume: 0.0,
            volume_curve: None,
            can_overflow: false,
        }
    }

    pub fn with_min_volume(mut self, v: f64) -> Self {
        self.min_volume = v;
        self
    }

    pub fn with_volume_curve(mut self, curve: CurveId) -> Self {
        self.volume_curve = Some(curve);
        self
    }

    pub fn with_overflow(mut self, can_overflow: bool) -> Self {
        self.can_overflow = can_overflow;
        self
    }
}

/// Builder for constructing a network incrementally.
///
/// Add curves and patterns first, then nodes and links; `build()` validates
/// and freezes everything into an immutable [`Network`].
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    nodes: Vec<Node>,
    links: Vec<Link>,
    curves: Vec<Curve>,
    patterns: Vec<Pattern>,
    headloss: HeadlossFormula,
    viscosity: Option<f64>,
}

impl NetworkBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headloss(&mut self, formula: HeadlossFormula) -> &mut Self {
        self.headloss = formula;
        self
    }

    /// Kinematic viscosity (ft²/s) used by Darcy-Weisbach.
    pub fn viscosity(&mut self, nu: f64) -> &mut Self {
        self.viscosity = Some(nu);
        self
    }

    pub fn add_curve(&mut self, name: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> CurveId {
        let id = CurveId::from_index(self.curves.len() as u32);
        self.curves.push(Curve {
            id,
            name: name.into(),
            x,
            y,
        });
        id
    }

    pub fn add_pattern(&mut self, name: impl Into<String>, factors: Vec<f64>) -> PatternId {
        let id = PatternId::from_index(self.patterns.len() as u32);
        self.patterns.push(Pattern {
            id,
            name: name.into(),
            factors,
        });
        id
    }

    fn push_node(&mut self, name: String, elevation: f64, kind: NodeKind) -> NodeId {
        let id = NodeId::from_index(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            name,
            elevation,
            demands: Vec::new(),
            emitter: 0.0,
            kind,
        });
        id
    }

    pub fn add_junction(&mut self, name: impl Into<String>, elevation: f64) -> NodeId {
        self.push_node(name.into(), elevation, NodeKind::Junction)
    }

    /// Append a demand category (base flow in cfs) to a junction.
    pub fn add_demand(&mut self, node: NodeId, base: f64, pattern: Option<PatternId>) {
        if let Some(n) = self.nodes.get_mut(node.slot()) {
            n.demands.push(Demand { base, pattern });
        }
    }

    pub fn set_emitter(&mut self, node: NodeId, kc: f64) {
        if let Some(n) = self.nodes.get_mut(node.slot()) {
            n.emitter = kc;
        }
    }

    /// Reservoir with a fixed total head (ft).
    pub fn add_reservoir(&mut self, name: impl Into<String>, head: f64) -> NodeId {
        let tank = Tank {
            area: 0.0,
            h_min: head,
            h_max: head,
            h_init: head,
            v_min: 0.0,
            v_max: 0.0,
            v_init: 0.0,
            volume_curve: None,
            head_pattern: None,
            can_overflow: false,
        };
        self.push_node(name.into(), head, NodeKind::Tank(tank))
    }

    pub fn set_head_pattern(&mut self, node: NodeId, pattern: PatternId) {
        if let Some(NodeKind::Tank(tank)) = self.nodes.get_mut(node.slot()).map(|n| &mut n.kind) {
            tank.head_pattern = Some(pattern);
        }
    }

    /// Storage tank. Volumes come from the volume curve when one is given,
    /// otherwise from the cylinder area.
    pub fn add_tank(&mut self, name: impl Into<String>, spec: TankSpec) -> NetworkResult<NodeId> {
        let name = name.into();
        let invalid = |reason| NetworkError::InvalidTank {
            node: name.clone(),
            reason,
        };
        if spec.min_level > spec.max_level
            || spec.init_level < spec.min_level
            || spec.init_level > spec.max_level
        {
            return Err(invalid("levels must satisfy min <= init <= max"));
        }
        let area = PI * spec.diameter * spec.diameter / 4.0;
        let (v_min, v_max, v_init) = match spec.volume_curve {
            Some(curve_id) => {
                let curve = self.curves.get(curve_id.slot()).ok_or_else(|| {
                    NetworkError::InvalidCurveRef {
                        owner: name.clone(),
                        curve: curve_id,
                    }
                })?;
                if curve.is_empty() {
                    return Err(invalid("volume curve has no points"));
                }
                (
                    curve.interpolate(spec.min_level),
                    curve.interpolate(spec.max_level),
                    curve.interpolate(spec.init_level),
                )
            }
            None => {
                if area <= 0.0 {
                    return Err(invalid("diameter must be positive"));
                }
                let v_min = if spec.min_volume > 0.0 {
                    spec.min_volume
                } else {
                    area * spec.min_level
                };
                (
                    v_min,
                    v_min + area * (spec.max_level - spec.min_level),
                    v_min + area * (spec.init_level - spec.min_level),
                )
            }
        };
        // A curve tank without a diameter still needs a nonzero area to stay
        // distinct from a reservoir.
        let area = if area > 0.0 { area } else { 1.0 };
        let tank = Tank {
            area,
            h_min: spec.elevation + spec.min_level,
            h_max: spec.elevation + spec.max_level,
            h_init: spec.elevation + spec.init_level,
            v_min,
            v_max,
            v_init,
            volume_curve: spec.volume_curve,
            head_pattern: None,
            can_overflow: spec.can_overflow,
        };
        Ok(self.push_node(name, spec.elevation, NodeKind::Tank(tank)))
    }

    #[allow(clippy::too_many_arguments)]
    fn push_link(
        &mut self,
        name: String,
        from: NodeId,
        to: NodeId,
        diameter: f64,
        length: f64,
        roughness: f64,
        k: f64,
        kind: LinkKind,
        setting: Option<f64>,
    ) -> LinkId {
        let id = LinkId::from_index(self.links.len() as u32);
        let minor_loss = if diameter > 0.0 {
            MINOR_LOSS_FACTOR * k / diameter.powi(4)
        } else {
            0.0
        };
        self.links.push(Link {
            id,
            name,
            from,
            to,
            diameter,
            length,
            roughness,
            minor_loss,
            kind,
            initial_status: LinkStatus::Open,
            initial_setting: setting,
        });
        id
    }

    pub fn add_pipe(&mut self, name: impl Into<String>, from: NodeId, to: NodeId, spec: PipeSpec) -> LinkId {
        self.push_link(
            name.into(),
            from,
            to,
            spec.diameter,
            spec.length,
            spec.roughness,
            spec.minor_loss,
            LinkKind::Pipe,
            None,
        )
    }

    /// Pipe that only passes flow from `from` to `to`.
    pub fn add_check_valve(
        &mut self,
        name: impl Into<String>,
        from: NodeId,
        to: NodeId,
        spec: PipeSpec,
    ) -> LinkId {
        self.push_link(
            name.into(),
            from,
            to,
            spec.diameter,
            spec.length,
            spec.roughness,
            spec.minor_loss,
            LinkKind::CheckValve,
            None,
        )
    }

    /// Pump lifting water from `from` to `to`; the head curve is fitted now.
    pub fn add_pump(
        &mut self,
        name: impl Into<String>,
        from: NodeId,
        to: NodeId,
        head_curve: CurveId,
    ) -> NetworkResult<LinkId> {
        let name = name.into();
        let curve = self
            .curves
            .get(head_curve.slot())
            .ok_or_else(|| NetworkError::InvalidCurveRef {
                owner: name.clone(),
                curve: head_curve,
            })?;
        let pump = Pump::from_head_curve(curve)?;
        Ok(self.push_link(name, from, to, 0.0, 0.0, 0.0, 0.0, LinkKind::Pump(pump), Some(1.0)))
    }

    fn pump_mut(&mut self, link: LinkId) -> Option<&mut Pump> {
        match self.links.get_mut(link.slot()).map(|l| &mut l.kind) {
            Some(LinkKind::Pump(p)) => Some(p),
            _ => None,
        }
    }

    pub fn set_pump_efficiency(&mut self, link: LinkId, curve: CurveId) {
        if let Some(p) = self.pump_mut(link) {
            p.efficiency_curve = Some(curve);
        }
    }

    /// Per-pump energy price and optional price pattern.
    pub fn set_pump_price(&mut self, link: LinkId, price: f64, pattern: Option<PatternId>) {
        if let Some(p) = self.pump_mut(link) {
            p.energy_price = price;
            p.price_pattern = pattern;
        }
    }

    pub fn set_pump_speed_pattern(&mut self, link: LinkId, pattern: PatternId) {
        if let Some(p) = self.pump_mut(link) {
            p.speed_pattern = Some(pattern);
        }
    }

    pub fn add_valve(&mut self, name: impl Into<String>, from: NodeId, to: NodeId, spec: ValveSpec) -> LinkId {
        self.push_link(
            name.into(),
            from,
            to,
            spec.diameter,
            0.0,
            0.0,
            spec.minor_loss,
            LinkKind::Valve(spec.kind),
            spec.setting,
        )
    }

    pub fn set_initial_status(&mut self, link: LinkId, status: LinkStatus) {
        if let Some(l) = self.links.get_mut(link.slot()) {
            l.initial_status = status;
        }
    }

    pub fn set_initial_setting(&mut self, link: LinkId, setting: Option<f64>) {
        if let Some(l) = self.links.get_mut(link.slot()) {
            l.initial_setting = setting;
        }
    }

    /// Validate and freeze the network.
    pub fn build(self) -> NetworkResult<Network> {
        validate::validate_structure(&self.nodes, &self.links, &self.curves, &self.patterns)?;

        let (node_link_offsets, node_links) = Self::build_adjacency(&self.nodes, &self.links);

        let node_names: HashMap<String, NodeId> =
            self.nodes.iter().map(|n| (n.name.clone(), n.id)).collect();
        let link_names: HashMap<String, LinkId> =
            self.links.iter().map(|l| (l.name.clone(), l.id)).collect();

        let pumps = self
            .links
            .iter()
            .filter(|l| l.pump().is_some())
            .map(|l| l.id)
            .collect();
        let valves = self
            .links
            .iter()
            .filter(|l| l.valve().is_some())
            .map(|l| l.id)
            .collect();
        let tanks = self
            .nodes
            .iter()
            .filter(|n| n.tank().is_some())
            .map(|n| n.id)
            .collect();

        Ok(Network {
            nodes: self.nodes,
            links: self.links,
            curves: self.curves,
            patterns: self.patterns,
            node_link_offsets,
            node_links,
            node_names,
            link_names,
            pumps,
            valves,
            tanks,
            headloss: self.headloss,
            viscosity: self.viscosity.unwrap_or(1.1e-5),
        })
    }

    /// Compact adjacency: for each node, its incident links in link order.
    fn build_adjacency(nodes: &[Node], links: &[Link]) -> (Vec<usize>, Vec<LinkId>) {
        let mut per_node: Vec<Vec<LinkId>> = vec![Vec::new(); nodes.len()];
        for link in links {
            per_node[link.from.slot()].push(link.id);
            per_node[link.to.slot()].push(link.id);
        }

        let mut offsets = Vec::with_capacity(nodes.len() + 1);
        let mut flat = Vec::with_capacity(links.len() * 2);
        offsets.push(0);
        for list in per_node {
            flat.extend(list);
            offsets.push(flat.len());
        }
        (offsets, flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_assigns_sequential_ids() {
        let mut b = NetworkBuilder::new();
        let r = b.add_reservoir("R", 100.0);
        let j = b.add_junction("J", 0.0);
        let p = b.add_pipe("P", r, j, PipeSpec::new(100.0, 1.0, 100.0));
        assert_eq!(r.index(), 0);
        assert_eq!(j.index(), 1);
        assert_eq!(p.index(), 0);
    }

    #[test]
    fn minor_loss_converted_on_add() {
        let mut b = NetworkBuilder::new();
        let r = b.add_reservoir("R", 100.0);
        let j = b.add_junction("J", 0.0);
        b.add_pipe("P", r, j, PipeSpec::new(100.0, 0.5, 100.0).with_minor_loss(2.0));
        let net = b.build().unwrap();
        let expected = 0.02517 * 2.0 / 0.5_f64.powi(4);
        assert!((net.links()[0].minor_loss - expected).abs() < 1e-12);
    }

    #[test]
    fn cylinder_tank_volumes() {
        let mut b = NetworkBuilder::new();
        let t = b
            .add_tank("T", TankSpec::new(100.0, 10.0, 5.0, 20.0, 10.0))
            .unwrap();
        let j = b.add_junction("J", 0.0);
        b.add_pipe("P", t, j, PipeSpec::new(100.0, 1.0, 100.0));
        let net = b.build().unwrap();
        let tank = net.node(t).unwrap().tank().unwrap();
        let area = PI * 25.0;
        assert!((tank.area - area).abs() < 1e-9);
        assert!((tank.v_min - 5.0 * area).abs() < 1e-9);
        assert!((tank.v_max - 20.0 * area).abs() < 1e-9);
        assert!((tank.h_init - 110.0).abs() < 1e-12);
        assert!(!tank.is_reservoir());
    }

    #[test]
    fn tank_levels_out_of_order_rejected() {
        let mut b = NetworkBuilder::new();
        let err = b
            .add_tank("T", TankSpec::new(0.0, 30.0, 5.0, 20.0, 10.0))
            .unwrap_err();
        assert_eq!(err.code(), 225);
    }

    #[test]
    fn pump_with_missing_curve_rejected() {
        let mut b = NetworkBuilder::new();
        let r = b.add_reservoir("R", 0.0);
        let j = b.add_junction("J", 0.0);
        let err = b.add_pump("PU", r, j, CurveId::from_index(3)).unwrap_err();
        assert_eq!(err.code(), 206);
    }

    #[test]
    fn adjacency_lists_both_ends() {
        let mut b = NetworkBuilder::new();
        let r = b.add_reservoir("R", 100.0);
        let j1 = b.add_junction("J1", 0.0);
        let j2 = b.add_junction("J2", 0.0);
        let p1 = b.add_pipe("P1", r, j1, PipeSpec::new(100.0, 1.0, 100.0));
        let p2 = b.add_pipe("P2", j1, j2, PipeSpec::new(100.0, 1.0, 100.0));
        let net = b.build().unwrap();
        assert_eq!(net.node_links(j1), &[p1, p2]);
        assert_eq!(net.node_links(r), &[p1]);
        assert_eq!(net.node_links(j2), &[p2]);
        assert_eq!(net.find_link("P2"), Some(p2));
        assert_eq!(net.find_node("J1"), Some(j1));
    }
}
