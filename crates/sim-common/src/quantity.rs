//! Model parameters that may carry a unit.

use serde::{Deserialize, Serialize};

/// A numeric parameter written either as `1.5` or as `[1.5, "m"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    WithUnit(f64, String),
    Plain(f64),
}

impl Quantity {
    /// A value in meters, `[v, "m"]`.
    pub fn meters(value: f64) -> Self {
        Quantity::WithUnit(value, "m".to_string())
    }

    pub fn value(&self) -> f64 {
        match self {
            Quantity::WithUnit(v, _) | Quantity::Plain(v) => *v,
        }
    }

    pub fn unit(&self) -> Option<&str> {
        match self {
            Quantity::WithUnit(_, unit) => Some(unit),
            Quantity::Plain(_) => None,
        }
    }
}

impl From<f64> for Quantity {
    fn from(value: f64) -> Self {
        Quantity::Plain(value)
    }
}
