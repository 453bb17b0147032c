//! Cyclic time patterns of multipliers.

use aq_core::PatternId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub name: String,
    pub factors: Vec<f64>,
}

impl Pattern {
    /// Multiplier for pattern period `period`, wrapping around the pattern length.
    /// An empty pattern is a constant 1.
    pub fn factor(&self, period: i64) -> f64 {
        if self.factors.is_empty() {
            return 1.0;
        }
        let len = self.factors.len() as i64;
        self.factors[period.rem_euclid(len) as usize]
    }
}
