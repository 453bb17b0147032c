//! Length of the next hydraulic step.

use aq_controls::{ActionEvent, Clock, Control, RuleEngine, time_to_trigger};
use aq_core::{Seconds, Tolerances};
use aq_network::{HydraulicState, Network};
use tracing::debug;

use crate::options::Schedule;
use crate::tank::{TankSnapshot, advance_tanks};

/// Picks the step to the next event: pattern change, report time, tank
/// limit, control trigger or rule firing, whichever comes first.
#[derive(Debug, Clone, Copy)]
pub struct TimeStepPlanner {
    schedule: Schedule,
    tol: Tolerances,
}

impl TimeStepPlanner {
    pub fn new(schedule: Schedule, tol: Tolerances) -> Self {
        Self { schedule, tol }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Hydraulic step cut at the next pattern period, the next report time
    /// and the end of the run.
    pub fn nominal(&self, htime: Seconds) -> Seconds {
        let s = &self.schedule;
        let remaining = s.duration - htime;
        if remaining <= 0 {
            return 0;
        }
        [s.to_next_period(htime), s.to_next_report(htime), remaining]
            .into_iter()
            .filter(|&t| t > 0)
            .fold(s.hydraulic_step, Seconds::min)
    }

    /// Shorten `tstep` to the time the first tank reaches its empty or full
    /// level at its current net inflow.
    pub fn tank_step(&self, network: &Network, state: &HydraulicState, tstep: Seconds) -> Seconds {
        let mut tstep = tstep;
        for &id in network.tanks() {
            let Some(tank) = network.node(id).and_then(|n| n.storage_tank()) else {
                continue;
            };
            let ns = state.node(id);
            let Some(ts) = ns.tank else {
                continue;
            };
            let q = ns.demand;
            if q.abs() <= self.tol.qzero {
                continue;
            }
            let v = if q > 0.0 && ns.head < tank.h_max {
                tank.v_max - ts.volume
            } else if q < 0.0 && ns.head > tank.h_min {
                tank.v_min - ts.volume
            } else {
                continue;
            };
            let t = (v / q).round() as Seconds;
            if t > 0 && t < tstep {
                tstep = t;
            }
        }
        tstep
    }

    /// Shorten `tstep` to the first rule firing inside it.
    ///
    /// Tanks are advanced in rule-step increments and the rules re-checked at
    /// each one until an action changes a link or the step ends. The tank
    /// advance is then undone; the rule actions stay applied.
    pub fn rule_step(
        &self,
        network: &Network,
        state: &mut HydraulicState,
        rules: &RuleEngine,
        htime: Seconds,
        tstep: Seconds,
    ) -> (Seconds, Vec<ActionEvent>) {
        if rules.is_empty() || tstep <= 0 {
            return (tstep, Vec::new());
        }
        let rstep = self.schedule.rule_step;
        let tmax = htime + tstep;
        let mut dt = rstep.min(tstep);
        let mut dt1 = (rstep - htime.rem_euclid(rstep)).min(tstep);
        if dt1 == 0 {
            dt1 = dt;
        }

        let snapshot = TankSnapshot::capture(network, state);
        let mut t = htime;
        let mut events = Vec::new();
        while dt1 > 0 {
            t += dt1;
            advance_tanks(network, state, dt1);
            events = rules.check_rules(
                network,
                state,
                Clock::new(t, self.schedule.start_clock),
                dt1,
            );
            if !events.is_empty() {
                break;
            }
            dt = dt.min(tmax - t);
            dt1 = dt;
        }
        snapshot.restore(state);
        (t - htime, events)
    }

    /// Step to take from `htime`, together with any rule actions applied
    /// while finding it. Zero only at the end of the run.
    pub fn plan(
        &self,
        network: &Network,
        state: &mut HydraulicState,
        controls: &[Control],
        rules: &RuleEngine,
        htime: Seconds,
    ) -> (Seconds, Vec<ActionEvent>) {
        let mut tstep = self.nominal(htime);
        if tstep == 0 {
            return (0, Vec::new());
        }
        tstep = self.tank_step(network, state, tstep);
        let clock = Clock::new(htime, self.schedule.start_clock);
        tstep = time_to_trigger(controls, network, state, clock, tstep, &self.tol);
        let (tstep, events) = self.rule_step(network, state, rules, htime, tstep);
        debug!(htime, tstep, rule_actions = events.len(), "next hydraulic step");
        (tstep, events)
    }
}
