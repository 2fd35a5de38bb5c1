//! Error handling for gsender
//!
//! Provides error types for every layer of the streaming core:
//! - Sender errors (job state machine violations, buffer problems)
//! - G-Code errors (program loading)
//! - Connection errors (transport)
//! - Firmware errors (settings, profiles, protocol)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Sender error type
///
/// Represents errors raised by the job sender and the streaming controller,
/// mostly state machine violations and transport-side buffer problems.
#[derive(Error, Debug, Clone)]
pub enum SenderError {
    /// No connection is open to write to
    #[error("Controller not connected")]
    NotConnected,

    /// No program has been loaded
    #[error("No program loaded")]
    NoProgram,

    /// Invalid state transition
    #[error("Invalid state transition from {current} to {requested}")]
    InvalidStateTransition {
        /// The current state name.
        current: String,
        /// The requested state name.
        requested: String,
    },

    /// A single line can never fit in the controller receive buffer
    #[error("Line of {length} bytes exceeds the {capacity} byte receive buffer")]
    LineTooLong {
        /// Length of the offending line including its newline.
        length: usize,
        /// Configured receive buffer size.
        capacity: usize,
    },

    /// An acknowledgment arrived with nothing in flight
    #[error("Unexpected acknowledgment: {response}")]
    UnexpectedAcknowledgment {
        /// The response text that could not be matched.
        response: String,
    },

    /// Lines were lost mid-job, so the job cannot pick up where it stopped
    #[error("Job interrupted by {reason}; cancel or reload the program")]
    JobInterrupted {
        /// What interrupted the job.
        reason: String,
    },

    /// Override dispatch requires a running async runtime
    #[error("Override dispatch unavailable: {reason}")]
    DispatchUnavailable {
        /// Why dispatch could not be scheduled.
        reason: String,
    },
}

/// G-Code error type
///
/// Line-level parse problems never surface as errors; tokens that cannot be
/// read are dropped. These variants cover program-level failures.
#[derive(Error, Debug, Clone)]
pub enum GcodeError {
    /// File could not be read as a G-code program
    #[error("File error: {reason}")]
    FileError {
        /// The reason for the file error.
        reason: String,
    },

    /// Program contains no sendable lines
    #[error("Program is empty")]
    EmptyProgram,
}

/// Connection error type
///
/// Represents errors related to the serial connection to the controller.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Port not found
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The name of the port that was not found.
        port: String,
    },

    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Connection lost
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// Write did not complete
    #[error("Write failed: {reason}")]
    WriteFailed {
        /// The reason the write failed.
        reason: String,
    },

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },
}

/// Firmware error type
///
/// Represents errors specific to firmware settings, profiles and protocol.
#[derive(Error, Debug, Clone)]
pub enum FirmwareError {
    /// Unknown firmware type
    #[error("Unknown firmware type: {firmware_type}")]
    UnknownFirmware {
        /// The unknown firmware type identifier.
        firmware_type: String,
    },

    /// Setting id is not part of the firmware's setting table
    #[error("Setting {setting} not available on {firmware}")]
    SettingNotAvailable {
        /// The setting key as written in the profile.
        setting: String,
        /// The firmware the profile targets.
        firmware: String,
    },

    /// Invalid setting value
    #[error("Invalid setting value for {setting}: {reason}")]
    InvalidSettingValue {
        /// The setting with the invalid value.
        setting: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// Profile could not be read
    #[error("Invalid machine profile: {reason}")]
    InvalidProfile {
        /// The reason the profile is invalid.
        reason: String,
    },

    /// Firmware rejected a line
    #[error("Firmware error {code}: {message}")]
    Rejected {
        /// GRBL error code.
        code: u8,
        /// Decoded message.
        message: String,
    },
}

/// Main error type for gsender
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Sender error
    #[error(transparent)]
    Sender(#[from] SenderError),

    /// G-Code error
    #[error(transparent)]
    Gcode(#[from] GcodeError),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Firmware error
    #[error(transparent)]
    Firmware(#[from] FirmwareError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a sender error
    pub fn is_sender_error(&self) -> bool {
        matches!(self, Error::Sender(_))
    }

    /// Check if this is a firmware error
    pub fn is_firmware_error(&self) -> bool {
        matches!(self, Error::Firmware(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
