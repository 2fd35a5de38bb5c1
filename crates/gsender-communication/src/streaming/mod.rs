//! Job streaming
//!
//! The [`Feeder`] queues ad-hoc lines, the [`Sender`] tracks the loaded
//! program, and the [`StreamController`] interleaves both onto the
//! transport under character-counting flow control.

pub mod controller;
pub mod feeder;
pub mod sender;

pub use controller::{LineOrigin, StreamController};
pub use feeder::{Feeder, FeederState, FeederStatus, HoldReason};
pub use sender::{Sender, SenderContext, SenderState, SenderStatus};
