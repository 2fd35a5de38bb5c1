//! # Event Bus Module
//!
//! Typed publish/subscribe between the streaming core and whatever front end
//! drives it. Publishers emit `AppEvent` values without knowing subscribers;
//! subscribers filter by category. The bus is an ordinary value shared with
//! `Arc`, so each connection can own its own.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gsender_core::event_bus::{AppEvent, EventBus, EventCategory, EventFilter, SenderEvent};
//!
//! let bus = Arc::new(EventBus::new());
//! let id = bus.subscribe(EventFilter::Categories(vec![EventCategory::Sender]), |event| {
//!     tracing::info!("{}", event.description());
//! });
//! bus.publish(AppEvent::Sender(SenderEvent::Started)).ok();
//! bus.unsubscribe(id);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
