//! Feeder
//!
//! Queue for lines that are not part of the loaded program: console input,
//! macros, jog commands. The streaming controller drains it ahead of the
//! program. Holding stops dispatch but not enqueueing, and lines always
//! leave in the order they arrived.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Why dispatch is held
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HoldReason {
    /// Cause, e.g. the line or command that triggered the hold
    pub data: String,
    /// Free-form detail shown to the operator
    pub comment: Option<String>,
}

impl HoldReason {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

impl std::fmt::Display for HoldReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.comment {
            Some(comment) => write!(f, "{} ({})", self.data, comment),
            None => write!(f, "{}", self.data),
        }
    }
}

/// Snapshot of the feeder for display
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeederStatus {
    /// Dispatch is held
    pub hold: bool,
    /// Why dispatch is held
    pub hold_reason: Option<HoldReason>,
    /// Lines waiting for dispatch
    pub queue: usize,
    /// A dispatched line has not been acknowledged yet
    pub pending: bool,
    /// State changed since the last `take_changed`
    pub changed: bool,
}

/// Dispatch state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeederState {
    Idle,
    Holding,
    Dispatching,
}

#[derive(Debug, Default)]
pub struct Feeder {
    queue: VecDeque<String>,
    hold: bool,
    hold_reason: Option<HoldReason>,
    pending: bool,
    changed: bool,
}

impl Feeder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line; allowed while held
    pub fn enqueue(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::trace!("Feeder enqueue: {}", line);
        self.queue.push_back(line);
        self.changed = true;
    }

    /// Append several lines in order
    pub fn enqueue_all<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            self.enqueue(line);
        }
    }

    /// Stop dispatch; repeated holds keep the first reason
    pub fn hold(&mut self, reason: HoldReason) {
        if self.hold {
            return;
        }
        tracing::debug!("Feeder held: {}", reason);
        self.hold = true;
        self.hold_reason = Some(reason);
        self.changed = true;
    }

    /// Resume dispatch; true when queued lines are ready to go
    pub fn unhold(&mut self) -> bool {
        if self.hold {
            tracing::debug!("Feeder released");
            self.hold = false;
            self.hold_reason = None;
            self.changed = true;
        }
        !self.queue.is_empty()
    }

    /// Take the next line for transmission
    ///
    /// `None` while held or when nothing is queued. Marks the feeder as
    /// pending until [`Feeder::ack`].
    pub fn next(&mut self) -> Option<String> {
        if self.hold {
            return None;
        }
        let line = self.queue.pop_front()?;
        self.pending = true;
        self.changed = true;
        Some(line)
    }

    /// The line handed out by `next` was acknowledged
    pub fn ack(&mut self) {
        if self.pending {
            self.pending = false;
            self.changed = true;
        }
    }

    /// Look at the next line without taking it
    pub fn peek(&self) -> Option<&str> {
        if self.hold {
            return None;
        }
        self.queue.front().map(String::as_str)
    }

    /// Drop every queued line
    pub fn clear(&mut self) {
        if !self.queue.is_empty() || self.pending {
            self.changed = true;
        }
        self.queue.clear();
        self.pending = false;
    }

    /// Drop queued lines and release any hold
    pub fn reset(&mut self) {
        self.clear();
        self.hold = false;
        self.hold_reason = None;
        self.changed = true;
    }

    pub fn is_held(&self) -> bool {
        self.hold
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn state(&self) -> FeederState {
        if self.hold {
            FeederState::Holding
        } else if self.queue.is_empty() && !self.pending {
            FeederState::Idle
        } else {
            FeederState::Dispatching
        }
    }

    pub fn status(&self) -> FeederStatus {
        FeederStatus {
            hold: self.hold,
            hold_reason: self.hold_reason.clone(),
            queue: self.queue.len(),
            pending: self.pending,
            changed: self.changed,
        }
    }

    /// Return and clear the changed flag
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}
