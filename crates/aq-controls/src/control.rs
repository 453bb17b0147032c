//! Simple controls: level, timer and time-of-day triggers.

use aq_core::{
    LinkId, NodeId, Seconds, Tolerances,
    units::constants::SEC_PER_DAY,
};
use aq_network::{HydraulicState, Link, LinkKind, LinkStatus, Network, ValveKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ControlError, ControlResult};

/// Simulation clock seen by controls and rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Clock {
    /// Elapsed simulation time (s).
    pub time: Seconds,
    /// Time of day at which the simulation starts (s).
    pub start_clock: Seconds,
}

impl Clock {
    pub fn new(time: Seconds, start_clock: Seconds) -> Self {
        Self { time, start_clock }
    }

    /// Seconds past midnight.
    pub fn time_of_day(&self) -> Seconds {
        (self.time + self.start_clock).rem_euclid(SEC_PER_DAY)
    }
}

/// What a control or rule does to its link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ControlAction {
    Open,
    Closed,
    /// Pump speed or valve setpoint. On a pipe, 0 closes and anything else opens.
    Setting(f64),
}

/// Trigger of a control, with nodes given by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TriggerSpec {
    /// Node level (above elevation) at or above `level`.
    Above { node: String, level: f64 },
    /// Node level at or below `level`.
    Below { node: String, level: f64 },
    /// Elapsed time equals `at`.
    Timer { at: Seconds },
    /// Time of day equals `at`.
    TimeOfDay { at: Seconds },
}

/// Unresolved simple control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSpec {
    pub link: String,
    pub action: ControlAction,
    pub trigger: TriggerSpec,
    pub enabled: bool,
}

impl ControlSpec {
    pub fn new(link: impl Into<String>, action: ControlAction, trigger: TriggerSpec) -> Self {
        Self {
            link: link.into(),
            action,
            trigger,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Trigger {
    /// Head at or above `grade`.
    HiLevel { node: NodeId, grade: f64 },
    /// Head at or below `grade`.
    LowLevel { node: NodeId, grade: f64 },
    Timer { at: Seconds },
    TimeOfDay { at: Seconds },
}

impl Trigger {
    fn node(&self) -> Option<(NodeId, f64)> {
        match *self {
            Trigger::HiLevel { node, grade } | Trigger::LowLevel { node, grade } => {
                Some((node, grade))
            }
            Trigger::Timer { .. } | Trigger::TimeOfDay { .. } => None,
        }
    }
}

/// A validated simple control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub link: LinkId,
    pub trigger: Trigger,
    /// Status imposed when triggered.
    pub status: LinkStatus,
    /// Setting imposed when triggered (ignored for pipes).
    pub setting: Option<f64>,
    pub enabled: bool,
}

/// Resolve an action into the (status, setting) pair it imposes on `link`.
pub(crate) fn resolve_action(
    link: &Link,
    action: ControlAction,
) -> ControlResult<(LinkStatus, Option<f64>)> {
    if matches!(link.kind, LinkKind::CheckValve) {
        return Err(ControlError::CheckValve {
            link: link.name.clone(),
        });
    }
    let is_pump = matches!(link.kind, LinkKind::Pump(_));
    match action {
        ControlAction::Open => Ok((LinkStatus::Open, is_pump.then_some(1.0))),
        ControlAction::Closed => Ok((LinkStatus::Closed, is_pump.then_some(0.0))),
        ControlAction::Setting(x) => {
            if !x.is_finite() || x < 0.0 {
                return Err(ControlError::IllegalValue {
                    what: "control setting",
                    value: x,
                });
            }
            match link.kind {
                LinkKind::Valve(ValveKind::Gpv { .. }) => Err(ControlError::IllegalValue {
                    what: "GPV setting",
                    value: x,
                }),
                LinkKind::Valve(_) => Ok((LinkStatus::Active, Some(x))),
                LinkKind::Pump(_) => {
                    let status = if x == 0.0 {
                        LinkStatus::Closed
                    } else {
                        LinkStatus::Open
                    };
                    Ok((status, Some(x)))
                }
                _ => {
                    let status = if x == 0.0 {
                        LinkStatus::Closed
                    } else {
                        LinkStatus::Open
                    };
                    Ok((status, None))
                }
            }
        }
    }
}

impl Control {
    /// Validate a spec against the network.
    pub fn new(spec: &ControlSpec, network: &Network) -> ControlResult<Self> {
        let link_id = network
            .find_link(&spec.link)
            .ok_or_else(|| ControlError::UndefinedLink {
                name: spec.link.clone(),
            })?;
        let link = network
            .link(link_id)
            .ok_or_else(|| ControlError::UndefinedLink {
                name: spec.link.clone(),
            })?;
        let (status, setting) = resolve_action(link, spec.action)?;

        let grade = |node: &str, level: f64| -> ControlResult<(NodeId, f64)> {
            if !level.is_finite() {
                return Err(ControlError::IllegalValue {
                    what: "control level",
                    value: level,
                });
            }
            let id = network
                .find_node(node)
                .ok_or_else(|| ControlError::UndefinedNode {
                    name: node.to_string(),
                })?;
            let elevation = network.node(id).map_or(0.0, |n| n.elevation);
            Ok((id, elevation + level))
        };
        let check_time = |at: Seconds, max: Option<Seconds>| {
            if at < 0 || max.is_some_and(|m| at >= m) {
                Err(ControlError::IllegalValue {
                    what: "control time",
                    value: at as f64,
                })
            } else {
                Ok(at)
            }
        };

        let trigger = match &spec.trigger {
            TriggerSpec::Above { node, level } => {
                let (node, grade) = grade(node, *level)?;
                Trigger::HiLevel { node, grade }
            }
            TriggerSpec::Below { node, level } => {
                let (node, grade) = grade(node, *level)?;
                Trigger::LowLevel { node, grade }
            }
            TriggerSpec::Timer { at } => Trigger::Timer {
                at: check_time(*at, None)?,
            },
            TriggerSpec::TimeOfDay { at } => Trigger::TimeOfDay {
                at: check_time(*at, Some(SEC_PER_DAY))?,
            },
        };

        Ok(Self {
            link: link_id,
            trigger,
            status,
            setting,
            enabled: spec.enabled,
        })
    }
}

/// Origin of a link state change applied between solves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionSource {
    /// Index into the control list.
    Control(usize),
    /// Rule label.
    Rule(String),
}

/// A control or rule action that changed a link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub time: Seconds,
    pub link: LinkId,
    pub source: ActionSource,
    pub status: LinkStatus,
    pub setting: Option<f64>,
}

/// Volume a tank holds at `head`; None for junctions.
fn tank_volume(network: &Network, node: NodeId, head: f64) -> Option<f64> {
    let n = network.node(node)?;
    let tank = n.tank()?;
    Some(tank.volume_at(head, n.elevation, network.tank_curve(tank)))
}

/// Evaluate every enabled control at the start of a period and apply those
/// that fire. Junction level controls are left to [`pressure_switches`].
pub fn apply_controls(
    controls: &[Control],
    network: &Network,
    state: &mut HydraulicState,
    clock: Clock,
) -> Vec<ActionEvent> {
    let mut events = Vec::new();
    for (i, control) in controls.iter().enumerate() {
        if !control.enabled {
            continue;
        }
        let fired = match control.trigger {
            Trigger::HiLevel { node, grade } | Trigger::LowLevel { node, grade } => {
                let ns = state.node(node);
                let slack = ns.demand.abs();
                match (
                    tank_volume(network, node, ns.head),
                    tank_volume(network, node, grade),
                ) {
                    (Some(v1), Some(v2)) => match control.trigger {
                        Trigger::LowLevel { .. } => v1 <= v2 + slack,
                        _ => v1 >= v2 - slack,
                    },
                    _ => false,
                }
            }
            Trigger::Timer { at } => clock.time == at,
            Trigger::TimeOfDay { at } => clock.time_of_day() == at,
        };
        if !fired {
            continue;
        }

        let Some(link) = network.link(control.link) else {
            continue;
        };
        let ls = &mut state.links[control.link.slot()];
        let s1 = if ls.status.is_closed() {
            LinkStatus::Closed
        } else {
            LinkStatus::Open
        };
        let k1 = ls.setting;
        let k2 = if link.is_pipe() { k1 } else { control.setting };
        if s1 != control.status || k1 != k2 {
            ls.status = control.status;
            ls.setting = k2;
            info!(
                time = clock.time,
                link = %link.name,
                status = ?control.status,
                setting = ?k2,
                "control {} changed link",
                i + 1
            );
            events.push(ActionEvent {
                time: clock.time,
                link: control.link,
                source: ActionSource::Control(i),
                status: control.status,
                setting: k2,
            });
        }
    }
    events
}

/// Junction level controls evaluated against the latest heads inside the
/// convergence loop. Returns true when any link changed.
pub fn pressure_switches(
    controls: &[Control],
    network: &Network,
    state: &mut HydraulicState,
    tol: &Tolerances,
) -> bool {
    let mut any_change = false;
    for control in controls.iter().filter(|c| c.enabled) {
        let Some((node, grade)) = control.trigger.node() else {
            continue;
        };
        if !network.node(node).is_some_and(|n| n.is_junction()) {
            continue;
        }
        let head = state.head(node);
        let fired = match control.trigger {
            Trigger::LowLevel { .. } => head <= grade + tol.htol,
            _ => head >= grade - tol.htol,
        };
        if !fired {
            continue;
        }
        let Some(link) = network.link(control.link) else {
            continue;
        };
        let ls = &mut state.links[control.link.slot()];
        let change = match link.kind {
            LinkKind::Pipe | LinkKind::CheckValve => ls.status != control.status,
            LinkKind::Pump(_) => ls.setting != control.setting,
            LinkKind::Valve(_) => {
                ls.setting != control.setting
                    || (ls.setting.is_none() && ls.status != control.status)
            }
        };
        if change {
            let from = ls.status;
            ls.status = control.status;
            if !link.is_pipe() {
                ls.setting = control.setting;
            }
            debug!(link = %link.name, ?from, to = ?ls.status, "pressure switch");
            any_change = true;
        }
    }
    any_change
}

/// Seconds until the next control would change a link, capped at `tstep`.
pub fn time_to_trigger(
    controls: &[Control],
    network: &Network,
    state: &HydraulicState,
    clock: Clock,
    tstep: Seconds,
    tol: &Tolerances,
) -> Seconds {
    let mut tstep = tstep;
    for control in controls.iter().filter(|c| c.enabled) {
        let t = match control.trigger {
            Trigger::HiLevel { node, grade } | Trigger::LowLevel { node, grade } => {
                let Some(n) = network.node(node) else { continue };
                let Some(tank) = n.tank() else { continue };
                let ns = state.node(node);
                let q = ns.demand;
                if q.abs() <= tol.qzero {
                    continue;
                }
                let rising = matches!(control.trigger, Trigger::HiLevel { .. });
                if (rising && ns.head < grade && q > 0.0) || (!rising && ns.head > grade && q < 0.0)
                {
                    let volume = ns.tank.map_or(tank.v_init, |t| t.volume);
                    let v = tank.volume_at(grade, n.elevation, network.tank_curve(tank)) - volume;
                    (v / q).round() as Seconds
                } else {
                    0
                }
            }
            Trigger::Timer { at } => {
                if at > clock.time {
                    at - clock.time
                } else {
                    0
                }
            }
            Trigger::TimeOfDay { at } => {
                let t1 = clock.time_of_day();
                if at >= t1 { at - t1 } else { SEC_PER_DAY - t1 + at }
            }
        };
        if t > 0 && t < tstep {
            let Some(link) = network.link(control.link) else {
                continue;
            };
            let ls = state.link(control.link);
            if (!link.is_pipe() && ls.setting != control.setting) || ls.status != control.status {
                tstep = t;
            }
        }
    }
    tstep
}

#[cfg(test)]
mod tests {
    use super::*;
    use aq_network::{NetworkBuilder, PipeSpec, TankSpec, ValveSpec};

    fn network() -> Network {
        let mut b = NetworkBuilder::new();
        let c = b.add_curve("H", vec![1.0], vec![60.0]);
        let r = b.add_reservoir("R", 0.0);
        let j = b.add_junction("J", 0.0);
        let t = b
            .add_tank("T", TankSpec::new(0.0, 10.0, 0.0, 20.0, 10.0))
            .unwrap();
        b.add_pump("PU", r, j, c).unwrap();
        b.add_pipe("P", j, t, PipeSpec::new(100.0, 1.0, 100.0));
        let j2 = b.add_junction("J2", 5.0);
        b.add_check_valve("CV", j, j2, PipeSpec::new(100.0, 1.0, 100.0));
        b.add_valve("V", j2, j, ValveSpec::new(ValveKind::Tcv, 1.0));
        b.build().unwrap()
    }

    #[test]
    fn numeric_pump_setting_sets_status() {
        let net = network();
        let spec = ControlSpec::new("PU", ControlAction::Setting(0.0), TriggerSpec::Timer { at: 3600 });
        let c = Control::new(&spec, &net).unwrap();
        assert_eq!(c.status, LinkStatus::Closed);
        assert_eq!(c.setting, Some(0.0));

        let spec = ControlSpec::new("V", ControlAction::Setting(4.0), TriggerSpec::Timer { at: 0 });
        let c = Control::new(&spec, &net).unwrap();
        assert_eq!(c.status, LinkStatus::Active);

        let spec = ControlSpec::new("P", ControlAction::Setting(0.0), TriggerSpec::Timer { at: 0 });
        let c = Control::new(&spec, &net).unwrap();
        assert_eq!((c.status, c.setting), (LinkStatus::Closed, None));
    }

    #[test]
    fn construction_errors_carry_codes() {
        let net = network();
        let cases = [
            (ControlSpec::new("X", ControlAction::Open, TriggerSpec::Timer { at: 0 }), 204),
            (ControlSpec::new("CV", ControlAction::Open, TriggerSpec::Timer { at: 0 }), 207),
            (
                ControlSpec::new("PU", ControlAction::Setting(-1.0), TriggerSpec::Timer { at: 0 }),
                202,
            ),
            (
                ControlSpec::new(
                    "PU",
                    ControlAction::Open,
                    TriggerSpec::Below { node: "Q".into(), level: 1.0 },
                ),
                203,
            ),
            (
                ControlSpec::new("PU", ControlAction::Open, TriggerSpec::TimeOfDay { at: 90_000 }),
                202,
            ),
        ];
        for (spec, code) in cases {
            assert_eq!(Control::new(&spec, &net).unwrap_err().code(), code, "{spec:?}");
        }
    }

    #[test]
    fn tank_level_control_uses_grade_above_elevation() {
        let net = network();
        let spec = ControlSpec::new(
            "PU",
            ControlAction::Closed,
            TriggerSpec::Above { node: "T".into(), level: 15.0 },
        );
        let c = Control::new(&spec, &net).unwrap();
        assert_eq!(c.trigger, Trigger::HiLevel { node: net.find_node("T").unwrap(), grade: 15.0 });

        let mut state = HydraulicState::initial(&net, &Tolerances::default());
        let t = net.find_node("T").unwrap();
        // below the grade: nothing
        assert!(apply_controls(std::slice::from_ref(&c), &net, &mut state, Clock::default()).is_empty());
        state.nodes[t.slot()].head = 15.5;
        let events = apply_controls(std::slice::from_ref(&c), &net, &mut state, Clock::default());
        assert_eq!(events.len(), 1);
        let pu = net.find_link("PU").unwrap();
        assert_eq!(state.link(pu).status, LinkStatus::Closed);
        assert_eq!(state.link(pu).setting, Some(0.0));
        // firing again changes nothing
        assert!(apply_controls(std::slice::from_ref(&c), &net, &mut state, Clock::default()).is_empty());
    }

    #[test]
    fn time_of_day_wraps_midnight() {
        let net = network();
        let spec = ControlSpec::new("PU", ControlAction::Closed, TriggerSpec::TimeOfDay { at: 3600 });
        let c = Control::new(&spec, &net).unwrap();
        let state = HydraulicState::initial(&net, &Tolerances::default());
        // 23:00 start: one hour until 01:00 is two hours
        let clock = Clock::new(0, 23 * 3600);
        let dt = time_to_trigger(&[c], &net, &state, clock, 86_400, &Tolerances::default());
        assert_eq!(dt, 7200);
    }

    #[test]
    fn time_to_tank_grade() {
        let net = network();
        let t = net.find_node("T").unwrap();
        let spec = ControlSpec::new(
            "PU",
            ControlAction::Closed,
            TriggerSpec::Above { node: "T".into(), level: 12.0 },
        );
        let c = Control::new(&spec, &net).unwrap();
        let mut state = HydraulicState::initial(&net, &Tolerances::default());
        let area = std::f64::consts::PI * 25.0;
        state.nodes[t.slot()].demand = area * 2.0 / 3600.0;
        let dt = time_to_trigger(&[c], &net, &state, Clock::default(), 86_400, &Tolerances::default());
        assert_eq!(dt, 3600);
    }

    #[test]
    fn pressure_switch_on_junction() {
        let net = network();
        let spec = ControlSpec::new(
            "PU",
            ControlAction::Closed,
            TriggerSpec::Above { node: "J".into(), level: 50.0 },
        );
        let c = Control::new(&spec, &net).unwrap();
        let tol = Tolerances::default();
        let mut state = HydraulicState::initial(&net, &tol);
        let j = net.find_node("J").unwrap();
        state.nodes[j.slot()].head = 49.0;
        assert!(!pressure_switches(std::slice::from_ref(&c), &net, &mut state, &tol));
        state.nodes[j.slot()].head = 50.0;
        assert!(pressure_switches(std::slice::from_ref(&c), &net, &mut state, &tol));
        assert!(!pressure_switches(std::slice::from_ref(&c), &net, &mut state, &tol));
    }
}
