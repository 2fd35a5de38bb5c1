//! Firmware protocol support
//!
//! - `realtime`: single-byte commands
//! - `override_manager`: override step encoding and paced dispatch
//! - `settings`: typed EEPROM setting tables
//! - `profile`: machine profiles and their application order
//! - `grbl`: response and status report parsing

pub mod grbl;
pub mod override_manager;
pub mod profile;
pub mod realtime;
pub mod settings;

pub use gsender_core::ControllerType;
pub use override_manager::{
    encode_override, OverrideDispatcher, OverrideKind, OverrideState, RapidOverrideLevel,
};
pub use profile::{MachineProfile, ProfileApplier};
pub use realtime::RealtimeCommand;
pub use settings::{EepromSettings, GrblSetting, ReportedSettings};
