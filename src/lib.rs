//! # gsender
//!
//! G-code streaming core for GRBL and grblHAL controllers.
//!
//! ## Architecture
//!
//! The workspace is split into three library crates and this binary crate:
//!
//! 1. **gsender-core** - errors, events, configuration, units
//! 2. **gsender-gcode** - block parsing, modal tracking, bounds, estimates
//! 3. **gsender-communication** - serial transport, GRBL protocol, overrides,
//!    profiles, Feeder/Sender and the streaming controller
//! 4. **gsender** - the session loop and command line interface

pub mod inspect;
pub mod session;

pub use gsender_communication::{
    encode_override, list_ports, Communicator, ConnectionParams, EepromSettings, Feeder,
    GrblResponse, HoldReason, MachineProfile, OverrideDispatcher, OverrideKind, ProfileApplier,
    RealtimeCommand, Sender, SenderState, SenderStatus, SerialCommunicator, SerialPortInfo,
    StatusReport, StreamController,
};
pub use gsender_core::{Config, ControllerType, Error, EventBus, Result, Units};
pub use gsender_gcode::{GcodeBlock, Modal, ModalTracker, Program, TimeEstimator};

pub use inspect::ProgramSummary;
pub use session::{Session, SessionCommand, SessionHandle, SessionOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Human-readable output goes to stderr so command output on stdout stays
/// clean; `json` switches to one JSON object per line. `RUST_LOG` overrides
/// the default `info` level.
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let pretty_layer = (!json).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_line_number(true)
    });
    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty_layer)
        .with(json_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))?;

    Ok(())
}
