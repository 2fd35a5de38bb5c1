//! # gsender G-code
//!
//! Line-level G-code handling for the streaming core:
//! - `block`: word parsing with selector/value indexing
//! - `modal`: modal group tracking
//! - `bounds`: position accumulation and bounding boxes
//! - `program`: loading files into sendable lines
//! - `estimate`: run-time estimation

pub mod block;
pub mod bounds;
pub mod estimate;
pub mod modal;
pub mod program;

pub use block::{Axis, GcodeBlock, PairValue, Word};
pub use bounds::{BoundingBox, PositionTracker};
pub use estimate::TimeEstimator;
pub use modal::{
    CoolantState, CutterCompensation, DistanceMode, FeedRateMode, Modal, ModalTracker,
    MotionMode, Plane, ProgramMode, SpindleState, ToolLengthOffset, WorkCoordinateSystem,
};
pub use program::{Program, ProgramLine};
