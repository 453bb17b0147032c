//! Simple controls and rule-based controls for aqualine.
//!
//! Two independent mechanisms change link status and settings between
//! hydraulic solves:
//!
//! - **Simple controls** fire on a tank level crossing, an elapsed timer or a
//!   time of day. Junction level controls act as pressure switches inside the
//!   convergence loop.
//! - **Rules** evaluate a chain of premises against node, link and system
//!   variables and queue THEN or ELSE actions. Conflicting actions on one
//!   link are resolved by rule priority.
//!
//! Both are built from name-based specs, validated against a
//! [`aq_network::Network`], and never parse text themselves.

pub mod control;
pub mod engine;
pub mod error;
pub mod rule;

pub use control::{
    ActionEvent, ActionSource, Clock, Control, ControlAction, ControlSpec, Trigger, TriggerSpec,
    apply_controls, pressure_switches, time_to_trigger,
};
pub use engine::RuleEngine;
pub use error::{ControlError, ControlResult};
pub use rule::{
    ActionSpec, Connective, Object, ObjectSpec, Operand, Premise, PremiseSpec, Relation, Rule,
    RuleAction, RuleSpec, Variable,
};
