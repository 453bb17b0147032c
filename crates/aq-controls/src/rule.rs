//! Rule premises and actions.

use aq_core::{LinkId, NodeId, Seconds, units::constants::SEC_PER_DAY};
use aq_network::{HydraulicState, LinkKind, LinkStatus, Network, NodeKind};
use serde::{Deserialize, Serialize};

use crate::control::{Clock, ControlAction, resolve_action};
use crate::error::{ControlError, ControlResult};

/// Slack applied to every numeric comparison.
const VALUE_TOL: f64 = 1e-3;

/// How a premise joins the result of the premises before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connective {
    /// First premise, or AND with the running result.
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variable {
    Demand,
    Head,
    Grade,
    Level,
    Pressure,
    Flow,
    Status,
    Setting,
    FillTime,
    DrainTime,
    Time,
    ClockTime,
}

impl Variable {
    pub fn name(self) -> &'static str {
        match self {
            Variable::Demand => "DEMAND",
            Variable::Head => "HEAD",
            Variable::Grade => "GRADE",
            Variable::Level => "LEVEL",
            Variable::Pressure => "PRESSURE",
            Variable::Flow => "FLOW",
            Variable::Status => "STATUS",
            Variable::Setting => "SETTING",
            Variable::FillTime => "FILLTIME",
            Variable::DrainTime => "DRAINTIME",
            Variable::Time => "TIME",
            Variable::ClockTime => "CLOCKTIME",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    pub fn symbol(self) -> &'static str {
        match self {
            Relation::Eq => "=",
            Relation::Ne => "<>",
            Relation::Lt => "<",
            Relation::Le => "<=",
            Relation::Gt => ">",
            Relation::Ge => ">=",
        }
    }
}

/// Right-hand side of a premise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// Internal units: ft, cfs, seconds.
    Value(f64),
    /// `Open`, `Closed` or `Active`.
    Status(LinkStatus),
}

/// Premise subject, with elements given by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectSpec {
    System,
    Node(String),
    Link(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Object {
    System,
    Node(NodeId),
    Link(LinkId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiseSpec {
    pub connective: Connective,
    pub object: ObjectSpec,
    pub variable: Variable,
    pub relation: Relation,
    pub operand: Operand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub link: String,
    pub action: ControlAction,
}

/// Unresolved rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub label: String,
    pub priority: f64,
    pub premises: Vec<PremiseSpec>,
    pub then_actions: Vec<ActionSpec>,
    pub else_actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Premise {
    pub connective: Connective,
    pub object: Object,
    pub variable: Variable,
    pub relation: Relation,
    pub operand: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    pub link: LinkId,
    pub action: ControlAction,
}

/// A validated rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub label: String,
    pub priority: f64,
    pub premises: Vec<Premise>,
    pub then_actions: Vec<RuleAction>,
    pub else_actions: Vec<RuleAction>,
}

impl Rule {
    pub fn new(spec: &RuleSpec, network: &Network) -> ControlResult<Self> {
        if spec.premises.is_empty() {
            return Err(ControlError::Malformed {
                what: format!("rule '{}': no premises", spec.label),
            });
        }
        if spec.then_actions.is_empty() {
            return Err(ControlError::Malformed {
                what: format!("rule '{}': no THEN actions", spec.label),
            });
        }
        if !spec.priority.is_finite() {
            return Err(ControlError::IllegalValue {
                what: "rule priority",
                value: spec.priority,
            });
        }
        let premises = spec
            .premises
            .iter()
            .map(|p| resolve_premise(p, network))
            .collect::<ControlResult<Vec<_>>>()?;
        let then_actions = resolve_actions(&spec.then_actions, network)?;
        let else_actions = resolve_actions(&spec.else_actions, network)?;
        Ok(Self {
            label: spec.label.clone(),
            priority: spec.priority,
            premises,
            then_actions,
            else_actions,
        })
    }

    /// Evaluate the premise chain.
    pub fn evaluate(&self, network: &Network, state: &HydraulicState, window: &RuleWindow) -> bool {
        compose(&self.premises, |p| p.check(network, state, window))
    }
}

/// Fold premises left to right. An AND premise is only checked while the
/// running result is true; an OR premise only while it is false.
pub fn compose<F>(premises: &[Premise], mut check: F) -> bool
where
    F: FnMut(&Premise) -> bool,
{
    let mut result = true;
    for p in premises {
        result = match p.connective {
            Connective::And => result && check(p),
            Connective::Or => result || check(p),
        };
    }
    result
}

/// Time interval covered by one rule evaluation: `(time - dt, time]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleWindow {
    pub clock: Clock,
    /// First second of the interval.
    pub t1: Seconds,
}

impl RuleWindow {
    pub fn new(clock: Clock, dt: Seconds) -> Self {
        Self {
            clock,
            t1: clock.time - dt + 1,
        }
    }
}

impl Premise {
    pub fn check(&self, network: &Network, state: &HydraulicState, window: &RuleWindow) -> bool {
        match (self.variable, self.operand) {
            (Variable::Time | Variable::ClockTime, Operand::Value(x)) => self.check_time(window, x),
            (_, Operand::Status(s)) => self.check_status(state, s),
            (_, Operand::Value(x)) => self.check_value(network, state, x),
        }
    }

    fn check_time(&self, window: &RuleWindow, x: f64) -> bool {
        let (t1, t2) = match self.variable {
            Variable::Time => (window.t1, window.clock.time),
            _ => (
                (window.t1 + window.clock.start_clock).rem_euclid(SEC_PER_DAY),
                window.clock.time_of_day(),
            ),
        };
        let x = x as Seconds;
        match self.relation {
            Relation::Lt => t2 < x,
            Relation::Le => t2 <= x,
            Relation::Gt => t2 > x,
            Relation::Ge => t2 >= x,
            Relation::Eq | Relation::Ne => {
                let inside = if t2 < t1 {
                    // interval wraps past midnight
                    x >= t1 || x <= t2
                } else {
                    x >= t1 && x <= t2
                };
                inside == (self.relation == Relation::Eq)
            }
        }
    }

    fn check_status(&self, state: &HydraulicState, wanted: LinkStatus) -> bool {
        let Object::Link(link) = self.object else {
            return false;
        };
        let same = state.link(link).status.class() == wanted.class();
        match self.relation {
            Relation::Eq => same,
            Relation::Ne => !same,
            _ => false,
        }
    }

    fn check_value(&self, network: &Network, state: &HydraulicState, v: f64) -> bool {
        let Some(x) = self.value(network, state) else {
            return false;
        };
        match self.relation {
            Relation::Eq => (x - v).abs() <= VALUE_TOL,
            Relation::Ne => (x - v).abs() >= VALUE_TOL,
            Relation::Lt => x <= v + VALUE_TOL,
            Relation::Le => x <= v - VALUE_TOL,
            Relation::Gt => x >= v - VALUE_TOL,
            Relation::Ge => x >= v + VALUE_TOL,
        }
    }

    /// Current value of the premise's variable; None when undefined.
    fn value(&self, network: &Network, state: &HydraulicState) -> Option<f64> {
        const TINY: f64 = 1e-6;
        match self.object {
            Object::System => match self.variable {
                Variable::Demand => Some(state.system_demand(network)),
                _ => None,
            },
            Object::Node(id) => {
                let node = network.node(id)?;
                let ns = state.node(id);
                match self.variable {
                    Variable::Demand => Some(ns.demand),
                    Variable::Head | Variable::Grade => Some(ns.head),
                    Variable::Level | Variable::Pressure => Some(ns.head - node.elevation),
                    Variable::FillTime | Variable::DrainTime => {
                        let tank = node.storage_tank()?;
                        let volume = ns.tank?.volume;
                        let d = ns.demand;
                        if self.variable == Variable::FillTime {
                            (d > TINY).then(|| (tank.v_max - volume) / d)
                        } else {
                            (d < -TINY).then(|| (tank.v_min - volume) / d)
                        }
                    }
                    _ => None,
                }
            }
            Object::Link(id) => {
                let ls = state.link(id);
                match self.variable {
                    Variable::Flow => Some(ls.flow.abs()),
                    Variable::Setting => ls.setting,
                    _ => None,
                }
            }
        }
    }
}

fn resolve_premise(spec: &PremiseSpec, network: &Network) -> ControlResult<Premise> {
    let var = spec.variable;
    let not_applicable = |object: &str| ControlError::NotApplicable {
        variable: var.name(),
        object: object.to_string(),
    };

    let object = match &spec.object {
        ObjectSpec::System => {
            if !matches!(var, Variable::Demand | Variable::Time | Variable::ClockTime) {
                return Err(not_applicable("SYSTEM"));
            }
            Object::System
        }
        ObjectSpec::Node(name) => {
            let id = network
                .find_node(name)
                .ok_or_else(|| ControlError::UndefinedNode { name: name.clone() })?;
            let is_tank = network
                .node(id)
                .is_some_and(|n| matches!(n.kind, NodeKind::Tank(_)));
            let ok = match var {
                Variable::Demand
                | Variable::Head
                | Variable::Grade
                | Variable::Level
                | Variable::Pressure => true,
                Variable::FillTime | Variable::DrainTime => is_tank,
                _ => false,
            };
            if !ok {
                return Err(not_applicable(name));
            }
            Object::Node(id)
        }
        ObjectSpec::Link(name) => {
            let id = network
                .find_link(name)
                .ok_or_else(|| ControlError::UndefinedLink { name: name.clone() })?;
            if !matches!(var, Variable::Flow | Variable::Status | Variable::Setting) {
                return Err(not_applicable(name));
            }
            Object::Link(id)
        }
    };

    match (var, spec.operand) {
        (Variable::Status, Operand::Status(s)) => {
            if !matches!(s, LinkStatus::Open | LinkStatus::Closed | LinkStatus::Active) {
                return Err(ControlError::Malformed {
                    what: format!("status operand {s:?}"),
                });
            }
            if !matches!(spec.relation, Relation::Eq | Relation::Ne) {
                return Err(ControlError::InvalidOperator {
                    variable: var.name(),
                    relation: spec.relation.symbol(),
                });
            }
        }
        (Variable::Status, Operand::Value(_)) | (_, Operand::Status(_)) => {
            return Err(ControlError::Malformed {
                what: format!("{} premise operand", var.name()),
            });
        }
        (_, Operand::Value(v)) => {
            if !v.is_finite() {
                return Err(ControlError::IllegalValue {
                    what: "premise value",
                    value: v,
                });
            }
            if matches!(var, Variable::Time | Variable::ClockTime) && v < 0.0 {
                return Err(ControlError::IllegalValue {
                    what: "premise time",
                    value: v,
                });
            }
            if var == Variable::ClockTime && v >= SEC_PER_DAY as f64 {
                return Err(ControlError::IllegalValue {
                    what: "clock time",
                    value: v,
                });
            }
        }
    }

    Ok(Premise {
        connective: spec.connective,
        object,
        variable: var,
        relation: spec.relation,
        operand: spec.operand,
    })
}

fn resolve_actions(specs: &[ActionSpec], network: &Network) -> ControlResult<Vec<RuleAction>> {
    specs
        .iter()
        .map(|a| {
            let id = network
                .find_link(&a.link)
                .ok_or_else(|| ControlError::UndefinedLink {
                    name: a.link.clone(),
                })?;
            let link = network
                .link(id)
                .ok_or_else(|| ControlError::UndefinedLink {
                    name: a.link.clone(),
                })?;
            let (status, _) = resolve_action(link, a.action)?;
            // pipes have no setting: a numeric action is a status change
            let action = match (&link.kind, a.action) {
                (LinkKind::Pipe, ControlAction::Setting(_)) => {
                    if status.is_closed() {
                        ControlAction::Closed
                    } else {
                        ControlAction::Open
                    }
                }
                (_, action) => action,
            };
            Ok(RuleAction { link: id, action })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aq_core::Tolerances;
    use aq_network::{NetworkBuilder, PipeSpec, TankSpec};

    fn network() -> Network {
        let mut b = NetworkBuilder::new();
        let r = b.add_reservoir("R", 100.0);
        let j = b.add_junction("J", 10.0);
        let t = b
            .add_tank("T", TankSpec::new(50.0, 5.0, 1.0, 10.0, 10.0))
            .unwrap();
        b.add_pipe("P1", r, j, PipeSpec::new(100.0, 1.0, 100.0));
        b.add_pipe("P2", j, t, PipeSpec::new(100.0, 1.0, 100.0));
        b.add_check_valve("CV", j, t, PipeSpec::new(100.0, 1.0, 100.0));
        b.build().unwrap()
    }

    fn premise(object: ObjectSpec, variable: Variable, relation: Relation, operand: Operand) -> PremiseSpec {
        PremiseSpec {
            connective: Connective::And,
            object,
            variable,
            relation,
            operand,
        }
    }

    fn rule(premises: Vec<PremiseSpec>) -> RuleSpec {
        RuleSpec {
            label: "R1".into(),
            priority: 0.0,
            premises,
            then_actions: vec![ActionSpec {
                link: "P1".into(),
                action: ControlAction::Closed,
            }],
            else_actions: vec![],
        }
    }

    #[test]
    fn validation_codes() {
        let net = network();
        let cases = [
            (
                premise(ObjectSpec::Node("X".into()), Variable::Head, Relation::Gt, Operand::Value(1.0)),
                203,
            ),
            (
                premise(ObjectSpec::Node("J".into()), Variable::Flow, Relation::Gt, Operand::Value(1.0)),
                208,
            ),
            (
                premise(ObjectSpec::Node("J".into()), Variable::FillTime, Relation::Gt, Operand::Value(1.0)),
                208,
            ),
            (
                premise(
                    ObjectSpec::Link("P1".into()),
                    Variable::Status,
                    Relation::Gt,
                    Operand::Status(LinkStatus::Open),
                ),
                210,
            ),
            (
                premise(ObjectSpec::Link("P1".into()), Variable::Status, Relation::Eq, Operand::Value(1.0)),
                201,
            ),
            (
                premise(ObjectSpec::System, Variable::Time, Relation::Ge, Operand::Value(-5.0)),
                202,
            ),
        ];
        for (p, code) in cases {
            assert_eq!(Rule::new(&rule(vec![p.clone()]), &net).unwrap_err().code(), code, "{p:?}");
        }

        let mut cv = rule(vec![premise(
            ObjectSpec::System,
            Variable::Time,
            Relation::Ge,
            Operand::Value(0.0),
        )]);
        cv.then_actions[0].link = "CV".into();
        assert_eq!(Rule::new(&cv, &net).unwrap_err().code(), 207);
        assert_eq!(Rule::new(&rule(vec![]), &net).unwrap_err().code(), 201);
    }

    #[test]
    fn value_comparisons_use_slack() {
        let net = network();
        let tol = Tolerances::default();
        let mut state = HydraulicState::initial(&net, &tol);
        let j = net.find_node("J").unwrap();
        state.nodes[j.slot()].head = 60.0;
        let window = RuleWindow::new(Clock::default(), 60);

        let check = |relation, v| {
            let r = Rule::new(
                &rule(vec![premise(
                    ObjectSpec::Node("J".into()),
                    Variable::Pressure,
                    relation,
                    Operand::Value(v),
                )]),
                &net,
            )
            .unwrap();
            r.evaluate(&net, &state, &window)
        };
        // pressure = 50
        assert!(check(Relation::Eq, 50.0005));
        assert!(!check(Relation::Eq, 50.01));
        assert!(check(Relation::Ne, 50.01));
        assert!(check(Relation::Lt, 50.0));
        assert!(!check(Relation::Le, 50.0));
        assert!(check(Relation::Le, 50.01));
        assert!(check(Relation::Gt, 50.0));
        assert!(!check(Relation::Ge, 50.0));
    }

    #[test]
    fn clock_time_equality_wraps_midnight() {
        let net = network();
        let state = HydraulicState::initial(&net, &Tolerances::default());
        let r = Rule::new(
            &rule(vec![premise(
                ObjectSpec::System,
                Variable::ClockTime,
                Relation::Eq,
                Operand::Value(60.0),
            )]),
            &net,
        )
        .unwrap();
        // interval 23:55..00:05 contains 00:01
        let clock = Clock::new(600, 86_400 - 300);
        assert!(r.evaluate(&net, &state, &RuleWindow::new(clock, 600)));
        let clock = Clock::new(600, 0);
        assert!(!r.evaluate(&net, &state, &RuleWindow::new(clock, 300)));
    }

    #[test]
    fn unset_setting_never_matches() {
        let net = network();
        let state = HydraulicState::initial(&net, &Tolerances::default());
        let r = Rule::new(
            &rule(vec![premise(
                ObjectSpec::Link("P1".into()),
                Variable::Setting,
                Relation::Ge,
                Operand::Value(-100.0),
            )]),
            &net,
        )
        .unwrap();
        assert!(!r.evaluate(&net, &state, &RuleWindow::new(Clock::default(), 1)));
    }

    #[test]
    fn fill_time_needs_inflow() {
        let net = network();
        let mut state = HydraulicState::initial(&net, &Tolerances::default());
        let t = net.find_node("T").unwrap();
        let r = Rule::new(
            &rule(vec![premise(
                ObjectSpec::Node("T".into()),
                Variable::FillTime,
                Relation::Lt,
                Operand::Value(3600.0),
            )]),
            &net,
        )
        .unwrap();
        let window = RuleWindow::new(Clock::default(), 1);
        assert!(!r.evaluate(&net, &state, &window));
        // 5 ft of headroom in a 10 ft tank
        let room = std::f64::consts::PI * 25.0 * 5.0;
        state.nodes[t.slot()].demand = room / 1800.0;
        assert!(r.evaluate(&net, &state, &window));
    }

    #[test]
    fn pipe_setting_action_becomes_status() {
        let net = network();
        let mut spec = rule(vec![premise(
            ObjectSpec::System,
            Variable::Time,
            Relation::Ge,
            Operand::Value(0.0),
        )]);
        spec.then_actions[0].action = ControlAction::Setting(0.0);
        let r = Rule::new(&spec, &net).unwrap();
        assert_eq!(r.then_actions[0].action, ControlAction::Closed);
    }
}
