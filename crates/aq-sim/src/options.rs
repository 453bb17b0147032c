//! Simulation time settings and energy options.

use aq_core::{Seconds, Time, hours, minutes, to_seconds};
use aq_network::Network;
use aq_solver::HydraulicConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Energy accounting options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyOptions {
    /// Pump efficiency (%) when a pump has no efficiency curve.
    pub global_efficiency: f64,
    /// Energy price per kWh when a pump has no price of its own.
    pub global_price: f64,
    pub price_pattern: Option<aq_core::PatternId>,
    /// Charge per peak kW over the run.
    pub demand_charge: f64,
    pub specific_gravity: f64,
}

impl Default for EnergyOptions {
    fn default() -> Self {
        Self {
            global_efficiency: 75.0,
            global_price: 0.0,
            price_pattern: None,
            demand_charge: 0.0,
            specific_gravity: 1.0,
        }
    }
}

/// User-facing run options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimOptions {
    /// Total duration; zero runs a single steady period.
    pub duration: Time,
    pub hydraulic_step: Time,
    pub pattern_step: Time,
    /// Offset into the patterns at which the run starts.
    pub pattern_start: Time,
    pub report_step: Time,
    pub report_start: Time,
    /// Interval at which rules are re-checked inside a hydraulic step.
    pub rule_step: Time,
    /// Time of day at which the run starts.
    pub start_clock: Time,
    /// Global multiplier on junction demands.
    pub demand_multiplier: f64,
    pub energy: EnergyOptions,
    pub hydraulics: HydraulicConfig,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            duration: hours(0.0),
            hydraulic_step: hours(1.0),
            pattern_step: hours(1.0),
            pattern_start: hours(0.0),
            report_step: hours(1.0),
            report_start: hours(0.0),
            rule_step: minutes(6.0),
            start_clock: hours(0.0),
            demand_multiplier: 1.0,
            energy: EnergyOptions::default(),
            hydraulics: HydraulicConfig::default(),
        }
    }
}

impl SimOptions {
    /// Resolve the time settings into whole seconds.
    ///
    /// The hydraulic step never exceeds the pattern or report step, and the
    /// rule step never exceeds the hydraulic step.
    pub fn schedule(&self) -> SimResult<Schedule> {
        let duration = to_seconds(self.duration);
        let pattern_step = to_seconds(self.pattern_step);
        let report_step = to_seconds(self.report_step);
        let mut hydraulic_step = to_seconds(self.hydraulic_step);
        let mut rule_step = to_seconds(self.rule_step);

        if duration < 0 {
            return Err(SimError::InvalidArg {
                what: "duration must be non-negative",
            });
        }
        if hydraulic_step <= 0 || pattern_step <= 0 || report_step <= 0 {
            return Err(SimError::InvalidArg {
                what: "hydraulic, pattern and report steps must be positive",
            });
        }
        if rule_step <= 0 {
            return Err(SimError::InvalidArg {
                what: "rule step must be positive",
            });
        }
        if !(self.demand_multiplier >= 0.0) {
            return Err(SimError::InvalidArg {
                what: "demand multiplier must be non-negative",
            });
        }
        if !(self.energy.specific_gravity > 0.0) {
            return Err(SimError::InvalidArg {
                what: "specific gravity must be positive",
            });
        }

        hydraulic_step = hydraulic_step.min(pattern_step).min(report_step);
        rule_step = rule_step.min(hydraulic_step);

        Ok(Schedule {
            duration,
            hydraulic_step,
            pattern_step,
            pattern_start: to_seconds(self.pattern_start).max(0),
            report_step,
            report_start: to_seconds(self.report_start).max(0),
            rule_step,
            start_clock: to_seconds(self.start_clock),
        })
    }

    /// Check references that only the network can resolve.
    pub fn validate(&self, network: &Network) -> SimResult<()> {
        if let Some(p) = self.energy.price_pattern {
            if network.pattern(p).is_none() {
                return Err(SimError::InvalidArg {
                    what: "energy price pattern does not exist",
                });
            }
        }
        Ok(())
    }
}

/// Time settings in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub duration: Seconds,
    pub hydraulic_step: Seconds,
    pub pattern_step: Seconds,
    pub pattern_start: Seconds,
    pub report_step: Seconds,
    pub report_start: Seconds,
    pub rule_step: Seconds,
    pub start_clock: Seconds,
}

impl Schedule {
    /// Pattern period in effect at elapsed time `t`.
    pub fn period(&self, t: Seconds) -> i64 {
        (t + self.pattern_start) / self.pattern_step
    }

    /// Seconds from `t` to the start of the next pattern period.
    pub fn to_next_period(&self, t: Seconds) -> Seconds {
        (self.period(t) + 1) * self.pattern_step - (t + self.pattern_start)
    }

    /// Seconds from `t` to the next report time strictly after `t`.
    pub fn to_next_report(&self, t: Seconds) -> Seconds {
        if t < self.report_start {
            self.report_start - t
        } else {
            let n = (t - self.report_start) / self.report_step + 1;
            self.report_start + n * self.report_step - t
        }
    }

    /// True when `t` falls on a report time.
    pub fn is_report_time(&self, t: Seconds) -> bool {
        t >= self.report_start && (t - self.report_start) % self.report_step == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = SimOptions::default().schedule().unwrap();
        assert_eq!(s.duration, 0);
        assert_eq!(s.hydraulic_step, 3600);
        assert_eq!(s.rule_step, 360);
        assert_eq!(SimOptions::default().energy.global_efficiency, 75.0);
    }

    #[test]
    fn hydraulic_step_clamped_to_pattern_and_report() {
        let opts = SimOptions {
            hydraulic_step: hours(2.0),
            pattern_step: hours(1.5),
            report_step: hours(1.0),
            rule_step: hours(3.0),
            ..SimOptions::default()
        };
        let s = opts.schedule().unwrap();
        assert_eq!(s.hydraulic_step, 3600);
        assert_eq!(s.rule_step, 3600);
    }

    #[test]
    fn rejects_zero_step() {
        let opts = SimOptions {
            pattern_step: hours(0.0),
            ..SimOptions::default()
        };
        assert!(matches!(opts.schedule(), Err(SimError::InvalidArg { .. })));
    }

    #[test]
    fn period_arithmetic() {
        let s = Schedule {
            duration: 86_400,
            hydraulic_step: 3600,
            pattern_step: 7200,
            pattern_start: 1800,
            report_step: 3600,
            report_start: 5400,
            rule_step: 600,
            start_clock: 0,
        };
        assert_eq!(s.period(0), 0);
        assert_eq!(s.period(5400), 1);
        assert_eq!(s.to_next_period(0), 5400);
        assert_eq!(s.to_next_period(5400), 7200);
        assert_eq!(s.to_next_report(0), 5400);
        assert_eq!(s.to_next_report(5400), 3600);
        assert!(s.is_report_time(9000));
        assert!(!s.is_report_time(3600));
    }
}
