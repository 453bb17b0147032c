//! Extended-period driver.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use aq_controls::{ActionEvent, Clock, Control, ControlSpec, RuleEngine, RuleSpec, apply_controls};
use aq_core::Seconds;
use aq_network::{HydraulicState, Network};
use aq_solver::HydraulicSolver;
use tracing::{info, warn};

use crate::demand::apply_patterns;
use crate::energy::{EnergyReport, PumpLoad, accumulate_energy, pump_loads};
use crate::error::SimResult;
use crate::options::{Schedule, SimOptions};
use crate::record::{PeriodResult, SimRecord};
use crate::tank::advance_tanks;
use crate::timestep::TimeStepPlanner;

/// Cooperative stop flag, checked between periods.
#[derive(Debug, Clone, Default)]
pub struct HaltHandle(Arc<AtomicBool>);

impl HaltHandle {
    pub fn halt(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_halted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A run over one network: patterns, controls, solve, then step forward.
pub struct Simulation<'n> {
    network: &'n Network,
    options: SimOptions,
    schedule: Schedule,
    planner: TimeStepPlanner,
    solver: HydraulicSolver<'n>,
    controls: Vec<Control>,
    rules: RuleEngine,
    state: HydraulicState,
    htime: Seconds,
    /// Rule actions taken while sizing the last step.
    pending: Vec<ActionEvent>,
    loads: Vec<PumpLoad>,
    halt: HaltHandle,
}

impl<'n> Simulation<'n> {
    pub fn new(
        network: &'n Network,
        options: SimOptions,
        controls: &[ControlSpec],
        rules: &[RuleSpec],
    ) -> SimResult<Self> {
        let schedule = options.schedule()?;
        options.validate(network)?;
        let controls = controls
            .iter()
            .map(|spec| Control::new(spec, network))
            .collect::<Result<Vec<_>, _>>()?;
        let rules = RuleEngine::new(rules, network)?;
        let solver = HydraulicSolver::new(network, options.hydraulics)?;
        let tol = options.hydraulics.tolerances;
        Ok(Self {
            network,
            schedule,
            planner: TimeStepPlanner::new(schedule, tol),
            solver,
            controls,
            rules,
            state: HydraulicState::initial(network, &tol),
            htime: 0,
            pending: Vec::new(),
            loads: Vec::new(),
            halt: HaltHandle::default(),
            options,
        })
    }

    pub fn network(&self) -> &'n Network {
        self.network
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn state(&self) -> &HydraulicState {
        &self.state
    }

    /// Mutable state, for callers that adjust settings between periods.
    pub fn state_mut(&mut self) -> &mut HydraulicState {
        &mut self.state
    }

    /// Elapsed simulation time (s).
    pub fn time(&self) -> Seconds {
        self.htime
    }

    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }

    fn clock(&self) -> Clock {
        Clock::new(self.htime, self.schedule.start_clock)
    }

    /// Solve the period starting at the current time.
    pub fn run_period(&mut self) -> SimResult<PeriodResult> {
        let period = self.schedule.period(self.htime);
        apply_patterns(
            self.network,
            &mut self.state,
            period,
            self.options.demand_multiplier,
        );
        let mut actions = std::mem::take(&mut self.pending);
        let clock = self.clock();
        actions.extend(apply_controls(
            &self.controls,
            self.network,
            &mut self.state,
            clock,
        ));

        let solution = self.solver.solve(&mut self.state, &self.controls)?;
        if !solution.converged {
            warn!(time = self.htime, "period solved without convergence");
        }
        info!(
            time = self.htime,
            iterations = solution.iterations,
            relative_error = solution.relative_error,
            actions = actions.len(),
            "period solved"
        );
        self.loads = pump_loads(
            self.network,
            &self.state,
            &self.options.energy,
            period,
            &self.options.hydraulics.tolerances,
        );
        Ok(PeriodResult::capture(
            self.network,
            &self.state,
            self.htime,
            solution,
            actions,
        ))
    }

    /// Size the next step, charge pump energy over it, move the tanks and
    /// the clock forward. Returns the step taken; zero at the end of the run.
    pub fn advance(&mut self) -> Seconds {
        let tstep = if self.htime < self.schedule.duration {
            let (tstep, events) = self.planner.plan(
                self.network,
                &mut self.state,
                &self.controls,
                &self.rules,
                self.htime,
            );
            self.pending = events;
            tstep
        } else {
            0
        };

        if tstep > 0 || self.schedule.duration == 0 {
            accumulate_energy(
                &mut self.state,
                &self.loads,
                tstep,
                self.schedule.duration,
            );
        }
        if tstep > 0 {
            advance_tanks(self.network, &mut self.state, tstep);
            self.htime += tstep;
        }
        tstep
    }

    /// Run to the end of the horizon, or until halted.
    pub fn run(&mut self) -> SimResult<SimRecord> {
        let mut record = SimRecord::default();
        loop {
            if self.halt.is_halted() {
                info!(time = self.htime, "simulation halted");
                break;
            }
            record.periods.push(self.run_period()?);
            if self.advance() == 0 {
                break;
            }
        }
        record.energy = Some(EnergyReport::new(
            self.network,
            &self.state,
            &self.options.energy,
            self.schedule.duration,
        ));
        Ok(record)
    }
}
