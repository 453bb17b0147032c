//! Rule engine: evaluates all rules and applies the winning actions.

use std::collections::HashSet;

use aq_core::Seconds;
use aq_network::{HydraulicState, Network};
use tracing::info;

use crate::control::{ActionEvent, ActionSource, Clock, ControlAction};
use crate::error::{ControlError, ControlResult};
use crate::rule::{Rule, RuleAction, RuleSpec, RuleWindow};

/// Setting changes smaller than this are ignored.
const SETTING_TOL: f64 = 1e-3;

/// Validated rule set.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    pub fn new(specs: &[RuleSpec], network: &Network) -> ControlResult<Self> {
        let mut labels = HashSet::new();
        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            if !labels.insert(spec.label.as_str()) {
                return Err(ControlError::DuplicateRule {
                    label: spec.label.clone(),
                });
            }
            rules.push(Rule::new(spec, network)?);
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Candidate actions for the current state, at most one per link.
    ///
    /// Each rule contributes its THEN actions when its premises hold and its
    /// ELSE actions otherwise. A later rule replaces an earlier action on the
    /// same link only with a strictly higher priority.
    pub fn action_list(
        &self,
        network: &Network,
        state: &HydraulicState,
        window: &RuleWindow,
    ) -> Vec<(usize, RuleAction)> {
        let mut list: Vec<(usize, RuleAction)> = Vec::new();
        for (i, rule) in self.rules.iter().enumerate() {
            let actions = if rule.evaluate(network, state, window) {
                &rule.then_actions
            } else {
                &rule.else_actions
            };
            for action in actions {
                match list.iter_mut().find(|(_, a)| a.link == action.link) {
                    Some(entry) => {
                        if rule.priority > self.rules[entry.0].priority {
                            *entry = (i, *action);
                        }
                    }
                    None => list.push((i, *action)),
                }
            }
        }
        list
    }

    /// Evaluate all rules over the interval ending at `clock.time` of length
    /// `dt` and apply the resulting actions. Returns the actions that
    /// actually changed a link.
    pub fn check_rules(
        &self,
        network: &Network,
        state: &mut HydraulicState,
        clock: Clock,
        dt: Seconds,
    ) -> Vec<ActionEvent> {
        let window = RuleWindow::new(clock, dt);
        let list = self.action_list(network, state, &window);

        let mut events = Vec::new();
        for (rule_idx, action) in list {
            let Some(link) = network.link(action.link) else {
                continue;
            };
            let ls = &mut state.links[action.link.slot()];
            let changed = match action.action {
                ControlAction::Open if ls.status.is_closed() => {
                    ls.set_open(link, true);
                    true
                }
                ControlAction::Closed if !ls.status.is_closed() => {
                    ls.set_open(link, false);
                    true
                }
                ControlAction::Setting(x)
                    if ls.setting.is_none_or(|v| (x - v).abs() > SETTING_TOL) =>
                {
                    ls.set_setting(link, x);
                    true
                }
                _ => false,
            };
            if changed {
                let label = &self.rules[rule_idx].label;
                info!(
                    time = clock.time,
                    rule = %label,
                    link = %link.name,
                    status = ?ls.status,
                    setting = ?ls.setting,
                    "rule action"
                );
                events.push(ActionEvent {
                    time: clock.time,
                    link: action.link,
                    source: ActionSource::Rule(label.clone()),
                    status: ls.status,
                    setting: ls.setting,
                });
            }
        }
        events
    }
}
