//! Event type definitions for the event bus.
//!
//! Events are grouped by the component that raises them. They are cloneable
//! and serializable so a front end can log or forward them unchanged.

use serde::{Deserialize, Serialize};

/// Root event enum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppEvent {
    /// Transport events
    Connection(ConnectionEvent),
    /// Job sender transitions and progress
    Sender(SenderEvent),
    /// Feeder queue transitions
    Feeder(FeederEvent),
    /// Realtime override dispatch
    Override(OverrideEvent),
    /// Firmware messages
    Firmware(FirmwareEvent),
    /// Errors surfaced to the operator
    Error(String),
}

impl AppEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            AppEvent::Connection(_) => EventCategory::Connection,
            AppEvent::Sender(_) => EventCategory::Sender,
            AppEvent::Feeder(_) => EventCategory::Feeder,
            AppEvent::Override(_) => EventCategory::Override,
            AppEvent::Firmware(_) => EventCategory::Firmware,
            AppEvent::Error(_) => EventCategory::Error,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Connection(e) => e.description(),
            AppEvent::Sender(e) => e.description(),
            AppEvent::Feeder(e) => e.description(),
            AppEvent::Override(e) => e.description(),
            AppEvent::Firmware(e) => e.description(),
            AppEvent::Error(message) => format!("Error: {}", message),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Transport events.
    Connection,
    /// Sender events.
    Sender,
    /// Feeder events.
    Feeder,
    /// Override events.
    Override,
    /// Firmware events.
    Firmware,
    /// Error events.
    Error,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Connection => write!(f, "Connection"),
            EventCategory::Sender => write!(f, "Sender"),
            EventCategory::Feeder => write!(f, "Feeder"),
            EventCategory::Override => write!(f, "Override"),
            EventCategory::Firmware => write!(f, "Firmware"),
            EventCategory::Error => write!(f, "Error"),
        }
    }
}

/// Connection-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectionEvent {
    /// Port opened.
    Opened {
        /// Serial port path.
        port: String,
    },
    /// Port closed by the operator.
    Closed {
        /// Serial port path.
        port: String,
    },
    /// Transport failed underneath an open connection.
    Lost {
        /// Failure description.
        reason: String,
    },
}

impl ConnectionEvent {
    /// Get a short description
    pub fn description(&self) -> String {
        match self {
            Self::Opened { port } => format!("Opened {}", port),
            Self::Closed { port } => format!("Closed {}", port),
            Self::Lost { reason } => format!("Connection lost: {}", reason),
        }
    }
}

/// Sender events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SenderEvent {
    /// A program was loaded.
    Loaded {
        /// Program name.
        name: String,
        /// Number of sendable lines.
        total: usize,
    },
    /// Streaming started.
    Started,
    /// Progress changed.
    Progress {
        /// Lines written.
        sent: usize,
        /// Lines acknowledged.
        received: usize,
        /// Total lines.
        total: usize,
    },
    /// The job was held.
    Held {
        /// Hold cause.
        reason: String,
    },
    /// The job resumed.
    Resumed,
    /// An M6 was dispatched.
    ToolChange {
        /// Number of tool changes so far.
        count: usize,
    },
    /// The job finished.
    Finished {
        /// Whether the job was cancelled.
        cancelled: bool,
        /// Elapsed time in milliseconds.
        elapsed_ms: i64,
    },
}

impl SenderEvent {
    /// Get a short description
    pub fn description(&self) -> String {
        match self {
            Self::Loaded { name, total } => format!("Loaded {} ({} lines)", name, total),
            Self::Started => "Job started".to_string(),
            Self::Progress {
                sent,
                received,
                total,
            } => format!("Progress {}/{}/{}", received, sent, total),
            Self::Held { reason } => format!("Job held: {}", reason),
            Self::Resumed => "Job resumed".to_string(),
            Self::ToolChange { count } => format!("Tool change #{}", count),
            Self::Finished { cancelled, .. } if *cancelled => "Job cancelled".to_string(),
            Self::Finished { elapsed_ms, .. } => format!("Job finished in {}ms", elapsed_ms),
        }
    }
}

/// Feeder events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeederEvent {
    /// Dispatch paused.
    Held {
        /// Hold cause.
        reason: String,
    },
    /// Dispatch released.
    Released,
    /// Queue emptied.
    Drained,
}

impl FeederEvent {
    /// Get a short description
    pub fn description(&self) -> String {
        match self {
            Self::Held { reason } => format!("Feeder held: {}", reason),
            Self::Released => "Feeder released".to_string(),
            Self::Drained => "Feeder drained".to_string(),
        }
    }
}

/// Override events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OverrideEvent {
    /// Realtime bytes were scheduled.
    Scheduled {
        /// "feed" or "spindle".
        kind: String,
        /// Requested delta in percent.
        delta: i32,
        /// Number of bytes scheduled.
        steps: usize,
    },
    /// Pending timers were flushed.
    Flushed {
        /// Number of dispatches aborted.
        aborted: usize,
    },
}

impl OverrideEvent {
    /// Get a short description
    pub fn description(&self) -> String {
        match self {
            Self::Scheduled { kind, delta, steps } => {
                format!("{} override {:+}% in {} steps", kind, delta, steps)
            }
            Self::Flushed { aborted } => format!("Flushed {} override dispatches", aborted),
        }
    }
}

/// Firmware events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FirmwareEvent {
    /// Firmware rejected a line.
    Error {
        /// Error code.
        code: u8,
        /// Offending line, when known.
        line: Option<String>,
    },
    /// Firmware entered an alarm.
    Alarm {
        /// Alarm code.
        code: u8,
    },
    /// Machine state reported by a status report.
    State {
        /// State name ("Idle", "Run", ...).
        state: String,
    },
    /// Free-form message (`[MSG:...]`, banner).
    Message {
        /// Message text.
        text: String,
    },
}

impl FirmwareEvent {
    /// Get a short description
    pub fn description(&self) -> String {
        match self {
            Self::Error { code, .. } => format!("error:{}", code),
            Self::Alarm { code } => format!("ALARM:{}", code),
            Self::State { state } => format!("State {}", state),
            Self::Message { text } => text.clone(),
        }
    }
}
