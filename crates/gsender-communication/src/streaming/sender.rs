//! Job sender
//!
//! Tracks one loaded program through transmission: which line goes next,
//! how many were sent and acknowledged, the modal state and toolpath bounds
//! of what has been sent, and the timing used for progress display.
//!
//! The sender never writes to the transport. The streaming controller asks
//! for [`Sender::next_line`], writes it, then reports back through
//! [`Sender::on_line_sent`] and [`Sender::on_line_acknowledged`].
//!
//! States: `Idle` after loading, `Running` from the first sent line, `Held`
//! while paused, `Finished` once every line is acknowledged or the job is
//! cancelled. `Finished` only ends with the next `load_program`.
//!
//! A controller reset or lost connection mid-job interrupts it: the job
//! stays `Held`, refuses to resume and waits to be cancelled or reloaded.

use super::feeder::HoldReason;
use crate::firmware::grbl::{Position, StatusReport};
use chrono::{DateTime, Utc};
use gsender_core::{Result, SenderError};
use gsender_gcode::{BoundingBox, GcodeBlock, Modal, ModalTracker, PositionTracker, Program};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderState {
    Idle,
    Running,
    Held,
    Finished,
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Machine and program state visible to the running job
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SenderContext {
    /// User-assigned variables
    pub variables: BTreeMap<String, f64>,
    /// Bounds of the motion sent so far
    pub bounds: BoundingBox,
    /// Last reported machine position, `x,y,z`
    pub mpos: String,
    /// Last reported work position, `x,y,z`
    pub wpos: String,
    /// Modal state after the last sent line
    pub modal: Modal,
    /// Tool selected by the last sent `T` word
    pub tool: Option<u32>,
    /// Controller parameters from bracketed feedback (`G54`, `TLO`, `PRB`, ...)
    pub parameters: BTreeMap<String, String>,
    /// Last programmed feed rate
    pub feed_rate: Option<f64>,
}

/// Progress snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SenderStatus {
    /// Program name
    pub name: String,
    /// Index of the next line to send
    pub sp: usize,
    /// Job is held
    pub hold: bool,
    /// Why the job is held
    pub hold_reason: Option<HoldReason>,
    /// Interpreter and machine state
    pub context: SenderContext,
    /// Program size in bytes
    pub size: usize,
    /// Lines in the program
    pub total: usize,
    /// Lines written to the controller
    pub sent: usize,
    /// Lines acknowledged with `ok` or `error`
    pub received: usize,
    /// When the program was loaded
    pub start_time: Option<DateTime<Utc>>,
    /// When the job finished or was cancelled
    pub finish_time: Option<DateTime<Utc>>,
    /// Milliseconds since start
    pub elapsed_time: i64,
    /// Estimated milliseconds left
    pub remaining_time: i64,
    /// `M6` blocks sent so far
    pub tool_changes: usize,
    /// Estimated total milliseconds, 0 when unknown
    pub estimated_time: i64,
    /// Feed override percentage from the last status report
    pub ov_f: u16,
    /// Program moves a rotary axis
    pub is_rotary_file: bool,
    /// Line number the controller reports executing
    pub current_line_running: Option<u32>,
    pub state: SenderState,
    /// Job was cancelled rather than completed
    pub cancelled: bool,
    /// Job lost lines to a reset or disconnect and cannot resume
    pub interrupted: bool,
}

#[derive(Debug)]
pub struct Sender {
    program: Option<Program>,
    state: SenderState,
    sp: usize,
    sent: usize,
    received: usize,
    hold_reason: Option<HoldReason>,
    modal: ModalTracker,
    position: PositionTracker,
    context: SenderContext,
    start_time: Option<DateTime<Utc>>,
    finish_time: Option<DateTime<Utc>>,
    elapsed_ms: i64,
    remaining_ms: i64,
    estimated: Option<Duration>,
    tool_changes: usize,
    ov_f: u16,
    current_line_running: Option<u32>,
    work_offset: Option<Position>,
    cancelled: bool,
    interrupted: bool,
}

impl Default for Sender {
    fn default() -> Self {
        Self {
            program: None,
            state: SenderState::Idle,
            sp: 0,
            sent: 0,
            received: 0,
            hold_reason: None,
            modal: ModalTracker::new(),
            position: PositionTracker::new(),
            context: SenderContext::default(),
            start_time: None,
            finish_time: None,
            elapsed_ms: 0,
            remaining_ms: 0,
            estimated: None,
            tool_changes: 0,
            ov_f: 100,
            current_line_running: None,
            work_offset: None,
            cancelled: false,
            interrupted: false,
        }
    }
}

impl Sender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was loaded with `program` and reset every counter
    ///
    /// `estimated_time` feeds the remaining-time calculation; without it the
    /// remaining time is extrapolated from progress so far. A program with no
    /// lines is finished as soon as it loads.
    pub fn load_program(&mut self, program: Program, estimated_time: Option<Duration>) {
        tracing::info!(
            "Loaded '{}': {} lines, {} bytes",
            program.name(),
            program.len(),
            program.size()
        );
        let ov_f = self.ov_f;
        *self = Self {
            estimated: estimated_time.filter(|d| !d.is_zero()),
            start_time: Some(Utc::now()),
            ov_f,
            ..Self::default()
        };
        self.remaining_ms = self.estimated.map(duration_ms).unwrap_or(0);
        self.program = Some(program);
        if self.total() == 0 {
            self.finish();
        }
    }

    /// Drop the loaded program
    pub fn unload(&mut self) {
        let ov_f = self.ov_f;
        *self = Self {
            ov_f,
            ..Self::default()
        };
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn total(&self) -> usize {
        self.program.as_ref().map(Program::len).unwrap_or(0)
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn received(&self) -> usize {
        self.received
    }

    pub fn tool_changes(&self) -> usize {
        self.tool_changes
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Parsed block at the send pointer
    pub fn current_block(&self) -> Option<&GcodeBlock> {
        self.program
            .as_ref()?
            .line(self.sp)
            .map(|line| &line.block)
    }

    /// Line at the send pointer, if the job may dispatch it
    pub fn next_line(&self) -> Option<&str> {
        match self.state {
            SenderState::Idle | SenderState::Running => {}
            SenderState::Held | SenderState::Finished => return None,
        }
        self.program
            .as_ref()?
            .line(self.sp)
            .map(|line| line.text.as_str())
    }

    /// Record that the line at the send pointer was written
    pub fn on_line_sent(&mut self) -> Result<()> {
        match self.state {
            SenderState::Idle | SenderState::Running => {}
            other => {
                return Err(SenderError::InvalidStateTransition {
                    current: other.to_string(),
                    requested: "send".to_string(),
                }
                .into())
            }
        }
        let program = self.program.as_ref().ok_or(SenderError::NoProgram)?;
        let line = program.line(self.sp).ok_or(SenderError::InvalidStateTransition {
            current: format!("{} of {} sent", self.sent, program.len()),
            requested: "send".to_string(),
        })?;
        let block = line.block.clone();

        if self.state == SenderState::Idle {
            tracing::debug!("Job started");
            self.state = SenderState::Running;
        }

        self.modal.apply(&block);
        let modal = self.modal.snapshot();
        let touched = self.position.apply(&block, &modal);
        if block.is_simple_motion() {
            let position = self.position.position();
            for axis in touched {
                self.context.bounds.extend(axis, position[axis.index()]);
            }
        }
        if block.is_tool_change() {
            self.on_tool_change();
        }
        if let Some(feed) = block.get_f64("F") {
            self.context.feed_rate = Some(feed);
        }
        self.context.modal = modal;
        self.context.tool = modal.tool;

        self.sp += 1;
        self.sent += 1;
        Ok(())
    }

    /// Record an `ok`/`error` for the oldest unacknowledged line
    ///
    /// Finishes the job once every line is acknowledged.
    pub fn on_line_acknowledged(&mut self) -> Result<()> {
        if self.received >= self.sent {
            return Err(SenderError::UnexpectedAcknowledgment {
                response: format!("{} of {} lines already acknowledged", self.received, self.sent),
            }
            .into());
        }
        self.received += 1;
        self.update_timing();

        let total = self.total();
        if self.sent == total && self.received == total && self.state != SenderState::Finished {
            self.finish();
        }
        Ok(())
    }

    pub fn on_tool_change(&mut self) {
        self.tool_changes += 1;
        tracing::info!("Tool change #{}", self.tool_changes);
    }

    /// Hold the job; a second pause keeps the first reason
    pub fn pause(&mut self, reason: HoldReason) -> Result<()> {
        match self.state {
            SenderState::Held => Ok(()),
            SenderState::Idle | SenderState::Running if self.program.is_some() => {
                tracing::info!("Job held: {}", reason);
                self.state = SenderState::Held;
                self.hold_reason = Some(reason);
                Ok(())
            }
            other => Err(SenderError::InvalidStateTransition {
                current: other.to_string(),
                requested: SenderState::Held.to_string(),
            }
            .into()),
        }
    }

    /// Release a hold; an interrupted job stays held
    pub fn resume(&mut self) -> Result<()> {
        if self.state != SenderState::Held {
            return Err(SenderError::InvalidStateTransition {
                current: self.state.to_string(),
                requested: SenderState::Running.to_string(),
            }
            .into());
        }
        if self.interrupted {
            let reason = self
                .hold_reason
                .as_ref()
                .map(|reason| reason.data.clone())
                .unwrap_or_default();
            return Err(SenderError::JobInterrupted { reason }.into());
        }
        tracing::info!("Job resumed");
        self.state = if self.sent == 0 {
            SenderState::Idle
        } else {
            SenderState::Running
        };
        self.hold_reason = None;
        Ok(())
    }

    /// Stop the clock and freeze the counters
    pub fn finish(&mut self) {
        if self.state == SenderState::Finished {
            return;
        }
        self.update_timing();
        self.finish_time = Some(Utc::now());
        self.remaining_ms = 0;
        self.hold_reason = None;
        self.state = SenderState::Finished;
        tracing::info!(
            "Job finished after {} ms: {}/{} acknowledged{}",
            self.elapsed_ms,
            self.received,
            self.total(),
            if self.cancelled { " (cancelled)" } else { "" }
        );
    }

    /// Finish without sending the rest
    pub fn cancel(&mut self) {
        if self.state == SenderState::Finished {
            return;
        }
        self.cancelled = true;
        self.finish();
    }

    /// Hold a started job for good after its unacknowledged lines were lost
    ///
    /// Returns whether the job was interrupted. A job that has sent nothing
    /// lost nothing and is left alone.
    pub fn interrupt(&mut self, reason: HoldReason) -> bool {
        if self.state == SenderState::Finished || self.sent == 0 {
            return false;
        }
        tracing::warn!(
            "Job interrupted by {} with {} line(s) unacknowledged",
            reason,
            self.sent - self.received
        );
        self.state = SenderState::Held;
        self.hold_reason = Some(reason);
        self.interrupted = true;
        true
    }

    /// Transport dropped
    pub fn connection_lost(&mut self) -> bool {
        self.interrupt(HoldReason::new("connection lost"))
    }

    /// Refresh positions, feed override and running line from a status report
    pub fn update_from_status(&mut self, report: &StatusReport) {
        if report.work_offset.is_some() {
            self.work_offset = report.work_offset;
        }
        if let Some(mpos) = report.machine_position_with(self.work_offset) {
            self.context.mpos = mpos.to_string();
        }
        if let Some(wpos) = report.work_position_with(self.work_offset) {
            self.context.wpos = wpos.to_string();
        }
        if let Some(overrides) = report.overrides {
            self.ov_f = overrides.feed;
        }
        if report.line_number.is_some() {
            self.current_line_running = report.line_number;
        }
        if self.state == SenderState::Running {
            self.update_timing();
        }
    }

    /// Store bracketed feedback such as `[G54:0,0,0]`
    pub fn record_parameter(&mut self, tag: impl Into<String>, value: impl Into<String>) {
        self.context.parameters.insert(tag.into(), value.into());
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: f64) {
        self.context.variables.insert(name.into(), value);
    }

    pub fn context(&self) -> &SenderContext {
        &self.context
    }

    pub fn status(&self) -> SenderStatus {
        let mut elapsed_ms = self.elapsed_ms;
        let mut remaining_ms = self.remaining_ms;
        if matches!(self.state, SenderState::Running | SenderState::Held) {
            elapsed_ms = self.elapsed_now();
            remaining_ms = self.remaining(elapsed_ms);
        }
        SenderStatus {
            name: self
                .program
                .as_ref()
                .map(|p| p.name().to_string())
                .unwrap_or_default(),
            sp: self.sp,
            hold: self.state == SenderState::Held,
            hold_reason: self.hold_reason.clone(),
            context: self.context.clone(),
            size: self.program.as_ref().map(Program::size).unwrap_or(0),
            total: self.total(),
            sent: self.sent,
            received: self.received,
            start_time: self.start_time,
            finish_time: self.finish_time,
            elapsed_time: elapsed_ms,
            remaining_time: remaining_ms,
            tool_changes: self.tool_changes,
            estimated_time: self.estimated.map(duration_ms).unwrap_or(0),
            ov_f: self.ov_f,
            is_rotary_file: self.program.as_ref().is_some_and(Program::is_rotary),
            current_line_running: self.current_line_running,
            state: self.state,
            cancelled: self.cancelled,
            interrupted: self.interrupted,
        }
    }

    fn elapsed_now(&self) -> i64 {
        self.start_time
            .map(|start| (Utc::now() - start).num_milliseconds().max(0))
            .unwrap_or(0)
    }

    fn update_timing(&mut self) {
        self.elapsed_ms = self.elapsed_now();
        self.remaining_ms = self.remaining(self.elapsed_ms);
    }

    fn remaining(&self, elapsed_ms: i64) -> i64 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        let done = self.received as f64 / total as f64;
        let remaining = match self.estimated {
            Some(estimated) => duration_ms(estimated) as f64 * (1.0 - done),
            None if self.received > 0 => elapsed_ms as f64 * (1.0 - done) / done,
            None => 0.0,
        };
        remaining.max(0.0).round() as i64
    }
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
