//! Shared enums used across crates.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported CNC controller firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControllerType {
    /// GRBL 1.1 (default, most common)
    #[default]
    Grbl,
    /// grblHAL (enhanced GRBL with an extended setting table)
    GrblHal,
}

impl ControllerType {
    /// Size of the controller's serial receive buffer in bytes
    pub fn rx_buffer_size(self) -> usize {
        match self {
            Self::Grbl => 128,
            Self::GrblHal => 1024,
        }
    }
}

impl std::fmt::Display for ControllerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grbl => write!(f, "GRBL"),
            Self::GrblHal => write!(f, "grblHAL"),
        }
    }
}

impl FromStr for ControllerType {
    type Err = crate::FirmwareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "grbl" => Ok(Self::Grbl),
            "grblhal" | "grbl_hal" | "grbl-hal" => Ok(Self::GrblHal),
            _ => Err(crate::FirmwareError::UnknownFirmware {
                firmware_type: s.to_string(),
            }),
        }
    }
}
