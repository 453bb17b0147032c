//! Error types for control and rule construction.

use aq_core::AqError;
use thiserror::Error;

/// Result type for control and rule construction.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors raised while building a control or rule. Evaluation never fails.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Premise or action is structurally malformed.
    #[error("Malformed {what}")]
    Malformed { what: String },

    /// Numeric value out of range.
    #[error("Illegal value {value} for {what}")]
    IllegalValue { what: &'static str, value: f64 },

    #[error("Undefined node '{name}'")]
    UndefinedNode { name: String },

    #[error("Undefined link '{name}'")]
    UndefinedLink { name: String },

    /// Check valves cannot be controlled.
    #[error("Cannot control check valve '{link}'")]
    CheckValve { link: String },

    /// Variable does not apply to the premise's object.
    #[error("Variable {variable} not applicable to {object}")]
    NotApplicable { variable: &'static str, object: String },

    #[error("Duplicate rule label '{label}'")]
    DuplicateRule { label: String },

    /// Relational operator not supported for the variable.
    #[error("Operator {relation} not supported for {variable}")]
    InvalidOperator {
        variable: &'static str,
        relation: &'static str,
    },
}

impl ControlError {
    /// Numeric code reported for this error.
    pub fn code(&self) -> u16 {
        match self {
            ControlError::Malformed { .. } => 201,
            ControlError::IllegalValue { .. } => 202,
            ControlError::UndefinedNode { .. } => 203,
            ControlError::UndefinedLink { .. } => 204,
            ControlError::CheckValve { .. } => 207,
            ControlError::NotApplicable { .. } => 208,
            ControlError::DuplicateRule { .. } => 209,
            ControlError::InvalidOperator { .. } => 210,
        }
    }
}

impl From<ControlError> for AqError {
    fn from(e: ControlError) -> Self {
        AqError::Model {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_and_code() {
        let err = ControlError::UndefinedLink { name: "P9".into() };
        assert!(err.to_string().contains("P9"));
        assert_eq!(err.code(), 204);
    }

    #[test]
    fn error_conversion() {
        let err: AqError = ControlError::DuplicateRule { label: "R1".into() }.into();
        assert!(matches!(err, AqError::Model { code: 209, .. }));
    }
}
