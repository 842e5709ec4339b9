//! Physical mass values tagged with the unit they are expressed in.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Units a weight can be reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Micrograms,
    Milligrams,
    Grams,
    Kilograms,
    Tonnes,
    Pounds,
    Ounces,
}

impl Default for Unit {
    fn default() -> Self {
        Unit::Grams
    }
}

impl Unit {
    /// Grams per one of this unit.
    fn grams(self) -> f64 {
        match self {
            Unit::Micrograms => 1e-6,
            Unit::Milligrams => 1e-3,
            Unit::Grams => 1.0,
            Unit::Kilograms => 1e3,
            Unit::Tonnes => 1e6,
            Unit::Pounds => 453.592_37,
            Unit::Ounces => 28.349_523_125,
        }
    }

    fn abbreviation(self) -> &'static str {
        match self {
            Unit::Micrograms => "ug",
            Unit::Milligrams => "mg",
            Unit::Grams => "g",
            Unit::Kilograms => "kg",
            Unit::Tonnes => "t",
            Unit::Pounds => "lb",
            Unit::Ounces => "oz",
        }
    }
}

/// An immutable weight produced by the calibration layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mass {
    value: f64,
    unit: Unit,
}

impl Mass {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// The same mass expressed in `unit`.
    pub fn convert_to(&self, unit: Unit) -> Mass {
        Mass {
            value: self.value * self.unit.grams() / unit.grams(),
            unit,
        }
    }
}

impl fmt::Display for Mass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.value, self.unit.abbreviation())
    }
}
