//! Network construction and validation errors.

use aq_core::{AqError, CurveId, NodeId, PatternId};

pub type NetworkResult<T> = Result<T, NetworkError>;

/// Network construction and validation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// Two records of the same kind share a name.
    DuplicateName { kind: &'static str, name: String },

    /// A link refers to a node that doesn't exist.
    InvalidNodeRef { link: String, node: NodeId },

    /// A record refers to a curve that doesn't exist.
    InvalidCurveRef { owner: String, curve: CurveId },

    /// A record refers to a pattern that doesn't exist.
    InvalidPatternRef { owner: String, pattern: PatternId },

    /// A link starts and ends at the same node.
    SameEndNodes { link: String },

    /// A pressure or flow control valve touches a tank or reservoir.
    ValveAtTank { link: String },

    /// Control valves placed so that their setpoints conflict.
    ConflictingValves { link: String, other: String },

    /// Tank geometry or levels are inconsistent.
    InvalidTank { node: String, reason: &'static str },

    /// Curve points are unusable for their role.
    InvalidCurve { curve: String, reason: &'static str },

    /// Pump head curve can't be fitted.
    InvalidPumpCurve { curve: String, reason: &'static str },

    /// No tank or reservoir anchors the heads.
    NoFixedGrade,

    /// Physical parameter out of range.
    InvalidArg { what: &'static str, value: f64 },

    /// Name not found.
    NotFound { kind: &'static str, name: String },
}

impl NetworkError {
    /// Numeric code reported for this error.
    pub fn code(&self) -> u16 {
        match self {
            NetworkError::DuplicateName { .. } => 215,
            NetworkError::InvalidNodeRef { .. } => 203,
            NetworkError::InvalidCurveRef { .. } => 206,
            NetworkError::InvalidPatternRef { .. } => 205,
            NetworkError::SameEndNodes { .. } => 222,
            NetworkError::ValveAtTank { .. } => 219,
            NetworkError::ConflictingValves { .. } => 220,
            NetworkError::InvalidTank { .. } => 225,
            NetworkError::InvalidCurve { .. } => 230,
            NetworkError::InvalidPumpCurve { .. } => 227,
            NetworkError::NoFixedGrade => 224,
            NetworkError::InvalidArg { .. } => 211,
            NetworkError::NotFound { .. } => 204,
        }
    }
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::DuplicateName { kind, name } => {
                write!(f, "Duplicate {} name '{}'", kind, name)
            }
            NetworkError::InvalidNodeRef { link, node } => {
                write!(f, "Link '{}' refers to non-existent node {}", link, node)
            }
            NetworkError::InvalidCurveRef { owner, curve } => {
                write!(f, "'{}' refers to non-existent curve {}", owner, curve)
            }
            NetworkError::InvalidPatternRef { owner, pattern } => {
                write!(f, "'{}' refers to non-existent pattern {}", owner, pattern)
            }
            NetworkError::SameEndNodes { link } => {
                write!(f, "Link '{}' has the same start and end node", link)
            }
            NetworkError::ValveAtTank { link } => {
                write!(f, "Valve '{}' is connected to a tank or reservoir", link)
            }
            NetworkError::ConflictingValves { link, other } => {
                write!(f, "Valve '{}' conflicts with valve '{}'", link, other)
            }
            NetworkError::InvalidTank { node, reason } => {
                write!(f, "Tank '{}': {}", node, reason)
            }
            NetworkError::InvalidCurve { curve, reason } => {
                write!(f, "Curve '{}': {}", curve, reason)
            }
            NetworkError::InvalidPumpCurve { curve, reason } => {
                write!(f, "Pump curve '{}': {}", curve, reason)
            }
            NetworkError::NoFixedGrade => {
                write!(f, "Network has no tanks or reservoirs")
            }
            NetworkError::InvalidArg { what, value } => {
                write!(f, "Invalid {}: {}", what, value)
            }
            NetworkError::NotFound { kind, name } => {
                write!(f, "{} '{}' not found", kind, name)
            }
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<NetworkError> for AqError {
    fn from(err: NetworkError) -> Self {
        AqError::Model {
            code: err.code(),
            message: err.to_string(),
        }
    }
}
