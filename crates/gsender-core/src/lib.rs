//! # gsender Core
//!
//! Core types, errors, events and configuration shared by the gsender crates.
//! Provides the error hierarchy, the typed event bus used to report sender and
//! feeder transitions, unit handling and the on-disk configuration model.

pub mod config;
pub mod error;
pub mod event_bus;
pub mod types;
pub mod units;

pub use config::{Config, ConnectionSettings, MachineSettings, StepOrderSetting, StreamingSettings};

pub use error::{ConnectionError, Error, FirmwareError, GcodeError, Result, SenderError};

pub use event_bus::{
    AppEvent, ConnectionEvent, EventBus, EventBusConfig, EventCategory, EventFilter,
    FeederEvent, FirmwareEvent, OverrideEvent, SenderEvent, SubscriptionId,
};

pub use types::ControllerType;
pub use units::Units;
