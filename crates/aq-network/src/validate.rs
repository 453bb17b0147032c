//! Network validation logic.

use std::collections::HashSet;

use aq_core::{CurveId, NodeId, PatternId};

use crate::curve::Curve;
use crate::error::{NetworkError, NetworkResult};
use crate::link::{Link, LinkKind, ValveKind};
use crate::node::Node;
use crate::pattern::Pattern;

/// Validate references, geometry, curves and valve placement.
pub(crate) fn validate_structure(
    nodes: &[Node],
    links: &[Link],
    curves: &[Curve],
    patterns: &[Pattern],
) -> NetworkResult<()> {
    check_unique_names("node", nodes.iter().map(|n| n.name.as_str()))?;
    check_unique_names("link", links.iter().map(|l| l.name.as_str()))?;
    check_unique_names("curve", curves.iter().map(|c| c.name.as_str()))?;
    check_unique_names("pattern", patterns.iter().map(|p| p.name.as_str()))?;

    for curve in curves {
        validate_curve(curve)?;
    }

    for node in nodes {
        for demand in &node.demands {
            check_pattern(&node.name, demand.pattern, patterns)?;
        }
        if node.emitter < 0.0 {
            return Err(NetworkError::InvalidArg {
                what: "emitter coefficient",
                value: node.emitter,
            });
        }
        if let Some(tank) = node.tank() {
            check_pattern(&node.name, tank.head_pattern, patterns)?;
            check_curve(&node.name, tank.volume_curve, curves)?;
        }
    }

    if !nodes.iter().any(|n| n.tank().is_some()) {
        return Err(NetworkError::NoFixedGrade);
    }

    for link in links {
        validate_link(link, nodes, curves, patterns)?;
    }

    validate_valve_placement(links)
}

fn check_unique_names<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> NetworkResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(NetworkError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_curve(curve: &Curve) -> NetworkResult<()> {
    let invalid = |reason| NetworkError::InvalidCurve {
        curve: curve.name.clone(),
        reason,
    };
    if curve.x.is_empty() {
        return Err(invalid("curve has no points"));
    }
    if curve.x.len() != curve.y.len() {
        return Err(invalid("x and y lengths differ"));
    }
    if curve.x.windows(2).any(|w| w[1] <= w[0]) {
        return Err(invalid("x values must be strictly increasing"));
    }
    Ok(())
}

fn check_curve(owner: &str, curve: Option<CurveId>, curves: &[Curve]) -> NetworkResult<()> {
    match curve {
        Some(c) if c.slot() >= curves.len() => Err(NetworkError::InvalidCurveRef {
            owner: owner.to_string(),
            curve: c,
        }),
        _ => Ok(()),
    }
}

fn check_pattern(owner: &str, pattern: Option<PatternId>, patterns: &[Pattern]) -> NetworkResult<()> {
    match pattern {
        Some(p) if p.slot() >= patterns.len() => Err(NetworkError::InvalidPatternRef {
            owner: owner.to_string(),
            pattern: p,
        }),
        _ => Ok(()),
    }
}

fn check_node(link: &Link, node: NodeId, nodes: &[Node]) -> NetworkResult<()> {
    if node.slot() >= nodes.len() {
        return Err(NetworkError::InvalidNodeRef {
            link: link.name.clone(),
            node,
        });
    }
    Ok(())
}

fn validate_link(
    link: &Link,
    nodes: &[Node],
    curves: &[Curve],
    patterns: &[Pattern],
) -> NetworkResult<()> {
    check_node(link, link.from, nodes)?;
    check_node(link, link.to, nodes)?;
    if link.from == link.to {
        return Err(NetworkError::SameEndNodes {
            link: link.name.clone(),
        });
    }

    let positive = |what, value: f64| {
        if value > 0.0 && value.is_finite() {
            Ok(())
        } else {
            Err(NetworkError::InvalidArg { what, value })
        }
    };

    match &link.kind {
        LinkKind::Pipe | LinkKind::CheckValve => {
            positive("pipe length", link.length)?;
            positive("pipe diameter", link.diameter)?;
            positive("pipe roughness", link.roughness)?;
        }
        LinkKind::Pump(pump) => {
            check_curve(&link.name, Some(pump.head_curve), curves)?;
            check_curve(&link.name, pump.efficiency_curve, curves)?;
            check_pattern(&link.name, pump.price_pattern, patterns)?;
            check_pattern(&link.name, pump.speed_pattern, patterns)?;
        }
        LinkKind::Valve(kind) => {
            positive("valve diameter", link.diameter)?;
            if matches!(kind, ValveKind::Prv | ValveKind::Psv | ValveKind::Fcv)
                && (nodes[link.from.slot()].tank().is_some() || nodes[link.to.slot()].tank().is_some())
            {
                return Err(NetworkError::ValveAtTank {
                    link: link.name.clone(),
                });
            }
            if let ValveKind::Gpv { curve } = kind {
                check_curve(&link.name, Some(*curve), curves)?;
                if curves[curve.slot()].len() < 2 {
                    return Err(NetworkError::InvalidCurve {
                        curve: curves[curve.slot()].name.clone(),
                        reason: "headloss curve needs at least two points",
                    });
                }
            }
        }
    }
    Ok(())
}

/// Pressure and flow control valves whose setpoints would fight each other.
fn conflicts(existing: (ValveKind, NodeId, NodeId), new: (ValveKind, NodeId, NodeId)) -> bool {
    use ValveKind::{Fcv, Prv, Psv};
    let (vk, vj1, vj2) = existing;
    let (kind, j1, j2) = new;
    match (vk, kind) {
        // shared downstream nodes or in series
        (Prv, Prv) => vj2 == j2 || vj2 == j1 || vj1 == j2,
        // shared upstream nodes or in series
        (Psv, Psv) => vj1 == j1 || vj1 == j2 || vj2 == j1,
        (Psv, Prv) => vj1 == j2,
        (Prv, Psv) => vj2 == j1,
        (Fcv, Psv) => vj2 == j1,
        (Fcv, Prv) => vj1 == j2,
        (Psv, Fcv) => vj1 == j2,
        (Prv, Fcv) => vj2 == j1,
        _ => false,
    }
}

fn validate_valve_placement(links: &[Link]) -> NetworkResult<()> {
    let valves: Vec<(&Link, ValveKind)> = links
        .iter()
        .filter_map(|l| l.valve().map(|v| (l, v)))
        .collect();
    for (i, &(link, kind)) in valves.iter().enumerate() {
        for &(other, other_kind) in &valves[..i] {
            if conflicts((other_kind, other.from, other.to), (kind, link.from, link.to)) {
                return Err(NetworkError::ConflictingValves {
                    link: link.name.clone(),
                    other: other.name.clone(),
                });
            }
        }
    }
    Ok(())
}
