//! Unit handling
//!
//! Programs may switch between millimeters (G21) and inches (G20) at any
//! line. Positions and bounding boxes are accumulated in millimeters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Millimeters per inch
pub const MM_PER_INCH: f64 = 25.4;

/// Program units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Millimeters (G21)
    #[default]
    Millimeters,
    /// Inches (G20)
    Inches,
}

impl Units {
    /// Convert a value expressed in these units to millimeters
    pub fn to_mm(self, value: f64) -> f64 {
        match self {
            Self::Millimeters => value,
            Self::Inches => value * MM_PER_INCH,
        }
    }

    /// Convert a millimeter value into these units
    pub fn from_mm(self, value: f64) -> f64 {
        match self {
            Self::Millimeters => value,
            Self::Inches => value / MM_PER_INCH,
        }
    }

    /// G-code word selecting these units
    pub fn gcode(self) -> &'static str {
        match self {
            Self::Millimeters => "G21",
            Self::Inches => "G20",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millimeters => write!(f, "mm"),
            Self::Inches => write!(f, "in"),
        }
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mm" | "metric" | "millimeters" | "g21" => Ok(Self::Millimeters),
            "in" | "inch" | "inches" | "imperial" | "g20" => Ok(Self::Inches),
            _ => Err(format!("Unknown units: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion() {
        assert_eq!(Units::Inches.to_mm(1.0), 25.4);
        assert_eq!(Units::Millimeters.to_mm(3.5), 3.5);
        assert!((Units::Inches.from_mm(50.8) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse() {
        assert_eq!("G20".parse::<Units>(), Ok(Units::Inches));
        assert_eq!("mm".parse::<Units>(), Ok(Units::Millimeters));
        assert!("furlong".parse::<Units>().is_err());
    }
}
