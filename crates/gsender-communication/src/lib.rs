//! # gsender Communication
//!
//! Everything between a loaded program and the controller's serial port:
//! - `communication`: the byte transport and serial port access
//! - `firmware`: GRBL realtime bytes, overrides, settings, profiles and
//!   response parsing
//! - `streaming`: the Feeder, the job Sender and the flow-controlled
//!   streaming controller

pub mod communication;
pub mod firmware;
pub mod streaming;

pub use communication::{
    list_ports, Communicator, ConnectionParams, LineBuffer, NoOpCommunicator, SerialCommunicator,
    SerialPortInfo,
};
pub use firmware::grbl::{GrblResponse, MachineState, Position, StatusReport};
pub use firmware::{
    encode_override, EepromSettings, GrblSetting, MachineProfile, OverrideDispatcher,
    OverrideKind, OverrideState, ProfileApplier, RapidOverrideLevel, RealtimeCommand,
    ReportedSettings,
};
pub use streaming::{
    Feeder, FeederState, FeederStatus, HoldReason, LineOrigin, Sender, SenderContext,
    SenderState, SenderStatus, StreamController,
};
