//! Integration tests for the rule engine.

use aq_controls::{
    ActionSource, ActionSpec, Clock, Connective, ControlAction, Object, ObjectSpec, Operand,
    Premise, PremiseSpec, Relation, RuleEngine, RuleSpec, Variable, rule::compose,
};
use aq_core::Tolerances;
use aq_network::{HydraulicState, LinkStatus, Network, NetworkBuilder, PipeSpec, ValveKind, ValveSpec};
use proptest::prelude::*;

fn network() -> Network {
    let mut b = NetworkBuilder::new();
    let c = b.add_curve("H", vec![1.0], vec![60.0]);
    let r = b.add_reservoir("R", 0.0);
    let j1 = b.add_junction("J1", 0.0);
    let j2 = b.add_junction("J2", 0.0);
    b.add_pump("PU", r, j1, c).unwrap();
    b.add_valve("V", j1, j2, ValveSpec::new(ValveKind::Tcv, 1.0));
    b.add_pipe("P", j2, r, PipeSpec::new(100.0, 1.0, 100.0));
    b.build().unwrap()
}

fn always() -> PremiseSpec {
    PremiseSpec {
        connective: Connective::And,
        object: ObjectSpec::System,
        variable: Variable::Time,
        relation: Relation::Ge,
        operand: Operand::Value(0.0),
    }
}

fn never() -> PremiseSpec {
    PremiseSpec {
        relation: Relation::Lt,
        ..always()
    }
}

fn rule(label: &str, priority: f64, premises: Vec<PremiseSpec>, then: ControlAction) -> RuleSpec {
    RuleSpec {
        label: label.into(),
        priority,
        premises,
        then_actions: vec![ActionSpec {
            link: "PU".into(),
            action: then,
        }],
        else_actions: vec![],
    }
}

#[test]
fn higher_priority_rule_wins() {
    let net = network();
    let pu = net.find_link("PU").unwrap();
    let specs = [
        rule("LOW", 5.0, vec![always()], ControlAction::Setting(0.5)),
        rule("HIGH", 10.0, vec![always()], ControlAction::Setting(0.8)),
    ];
    let engine = RuleEngine::new(&specs, &net).unwrap();
    let mut state = HydraulicState::initial(&net, &Tolerances::default());
    let events = engine.check_rules(&net, &mut state, Clock::default(), 60);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, ActionSource::Rule("HIGH".into()));
    assert_eq!(state.link(pu).setting, Some(0.8));
}

#[test]
fn priority_tie_keeps_first_rule() {
    let net = network();
    let pu = net.find_link("PU").unwrap();
    let specs = [
        rule("A", 5.0, vec![always()], ControlAction::Setting(0.5)),
        rule("B", 5.0, vec![always()], ControlAction::Setting(0.8)),
    ];
    let engine = RuleEngine::new(&specs, &net).unwrap();
    let mut state = HydraulicState::initial(&net, &Tolerances::default());
    engine.check_rules(&net, &mut state, Clock::default(), 60);
    assert_eq!(state.link(pu).setting, Some(0.5));
}

#[test]
fn else_actions_apply_when_premises_fail() {
    let net = network();
    let pu = net.find_link("PU").unwrap();
    let mut spec = rule("R", 1.0, vec![never()], ControlAction::Open);
    spec.else_actions.push(ActionSpec {
        link: "PU".into(),
        action: ControlAction::Closed,
    });
    let engine = RuleEngine::new(&[spec], &net).unwrap();
    let mut state = HydraulicState::initial(&net, &Tolerances::default());
    let events = engine.check_rules(&net, &mut state, Clock::default(), 60);
    assert_eq!(events.len(), 1);
    assert_eq!(state.link(pu).status, LinkStatus::Closed);
    assert_eq!(state.link(pu).setting, Some(0.0));

    // already closed: nothing more to do
    assert!(engine.check_rules(&net, &mut state, Clock::default(), 60).is_empty());
}

#[test]
fn valve_setting_action_opens_unset_closed_valve() {
    let net = network();
    let v = net.find_link("V").unwrap();
    let mut spec = rule("R", 1.0, vec![always()], ControlAction::Setting(4.0));
    spec.then_actions[0].link = "V".into();
    let engine = RuleEngine::new(&[spec], &net).unwrap();
    let mut state = HydraulicState::initial(&net, &Tolerances::default());
    state.links[v.slot()].status = LinkStatus::Closed;
    engine.check_rules(&net, &mut state, Clock::default(), 60);
    assert_eq!(state.link(v).status, LinkStatus::Open);
    assert_eq!(state.link(v).setting, Some(4.0));
}

#[test]
fn duplicate_label_rejected() {
    let net = network();
    let specs = [
        rule("A", 1.0, vec![always()], ControlAction::Open),
        rule("A", 2.0, vec![always()], ControlAction::Closed),
    ];
    assert_eq!(RuleEngine::new(&specs, &net).unwrap_err().code(), 209);
}

/// Premise tagged with its position so evaluation can look up a truth value.
fn bare(connective: Connective, index: usize) -> Premise {
    Premise {
        connective,
        object: Object::System,
        variable: Variable::Time,
        relation: Relation::Ge,
        operand: Operand::Value(index as f64),
    }
}

fn index_of(p: &Premise) -> usize {
    match p.operand {
        Operand::Value(v) => v as usize,
        Operand::Status(_) => unreachable!(),
    }
}

proptest! {
    #[test]
    fn and_chain_is_conjunction(truths in prop::collection::vec(any::<bool>(), 1..8)) {
        let premises: Vec<_> = (0..truths.len()).map(|i| bare(Connective::And, i)).collect();
        let result = compose(&premises, |p| truths[index_of(p)]);
        prop_assert_eq!(result, truths.iter().all(|&t| t));
    }

    #[test]
    fn composition_folds_left_to_right(
        chain in prop::collection::vec((any::<bool>(), any::<bool>()), 1..8)
    ) {
        // (is_or, truth) per premise; the first connective is always AND
        let premises: Vec<_> = chain
            .iter()
            .enumerate()
            .map(|(i, &(or, _))| bare(if or && i > 0 { Connective::Or } else { Connective::And }, i))
            .collect();
        let mut expected = true;
        for (p, &(_, t)) in premises.iter().zip(&chain) {
            expected = match p.connective {
                Connective::And => expected && t,
                Connective::Or => expected || t,
            };
        }
        let result = compose(&premises, |p| chain[index_of(p)].1);
        prop_assert_eq!(result, expected);
    }

    #[test]
    fn trailing_true_or_rescues_failed_chain(n in 1usize..6) {
        let mut premises: Vec<_> = (0..n).map(|i| bare(Connective::And, i)).collect();
        premises.push(bare(Connective::Or, n));
        let result = compose(&premises, |p| index_of(p) == n);
        prop_assert!(result);
    }
}
