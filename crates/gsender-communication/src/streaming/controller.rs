//! Streaming controller
//!
//! Owns the transport together with one Feeder/Sender pair and implements
//! GRBL character-counting flow control: a line is only written when its
//! bytes fit in what is left of the controller's receive buffer, and each
//! `ok`/`error` frees the bytes of the oldest line still in flight.
//!
//! # Dispatch order
//! - Nothing is written while the job is held.
//! - A Feeder line waiting for its acknowledgment blocks further dispatch.
//! - Queued Feeder lines go before program lines.
//! - Program lines go in program order.
//! - A line longer than the whole receive buffer is never written: a Feeder
//!   line is dropped with an error event, a program line holds the job.

use super::feeder::{Feeder, HoldReason};
use super::sender::{Sender, SenderState};
use crate::communication::{Communicator, LineBuffer};
use crate::firmware::grbl::{format_alarm, format_error, GrblResponse, MachineState, StatusReport};
use crate::firmware::override_manager::{OverrideDispatcher, OverrideKind, OverrideState};
use crate::firmware::profile::{MachineProfile, ProfileApplier};
use crate::firmware::realtime::RealtimeCommand;
use crate::firmware::settings::ReportedSettings;
use gsender_core::{
    AppEvent, ConnectionEvent, ControllerType, Error, EventBus, FeederEvent, FirmwareEvent,
    Result, SenderError, SenderEvent,
};
use gsender_gcode::{Modal, ModalTracker, Program};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Where a line in flight came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOrigin {
    Feeder,
    Program,
}

#[derive(Debug, Clone)]
struct InFlight {
    text: String,
    /// Bytes occupied in the receive buffer, newline included
    length: usize,
    origin: LineOrigin,
}

/// Flow-controlled line streaming to one controller
pub struct StreamController {
    communicator: Box<dyn Communicator>,
    rx_buffer_size: usize,
    in_flight: VecDeque<InFlight>,
    buffered: usize,
    line_buffer: LineBuffer,
    feeder: Feeder,
    sender: Sender,
    modal: ModalTracker,
    overrides: OverrideState,
    dispatcher: Option<OverrideDispatcher>,
    settings: ReportedSettings,
    firmware: ControllerType,
    last_state: Option<MachineState>,
    events: Option<Arc<EventBus>>,
}

impl StreamController {
    /// Stream through `communicator` into a receive buffer of `rx_buffer_size` bytes
    pub fn new(communicator: Box<dyn Communicator>, rx_buffer_size: usize) -> Self {
        Self {
            communicator,
            rx_buffer_size: rx_buffer_size.max(1),
            in_flight: VecDeque::new(),
            buffered: 0,
            line_buffer: LineBuffer::new(),
            feeder: Feeder::new(),
            sender: Sender::new(),
            modal: ModalTracker::new(),
            overrides: OverrideState::default(),
            dispatcher: None,
            settings: ReportedSettings::new(),
            firmware: ControllerType::default(),
            last_state: None,
            events: None,
        }
    }

    /// Publish transitions on `bus`
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Route override requests through `dispatcher`
    pub fn with_dispatcher(mut self, dispatcher: OverrideDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Firmware the controller announced, or was configured with
    pub fn with_firmware(mut self, firmware: ControllerType) -> Self {
        self.firmware = firmware;
        self
    }

    pub fn communicator(&self) -> &dyn Communicator {
        self.communicator.as_ref()
    }

    pub fn communicator_mut(&mut self) -> &mut dyn Communicator {
        self.communicator.as_mut()
    }

    pub fn feeder(&self) -> &Feeder {
        &self.feeder
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    /// Modal state reconciled from `[GC:...]` reports
    pub fn modal(&self) -> Modal {
        self.modal.snapshot()
    }

    pub fn overrides(&self) -> OverrideState {
        self.overrides
    }

    pub fn reported_settings(&self) -> &ReportedSettings {
        &self.settings
    }

    pub fn firmware(&self) -> ControllerType {
        self.firmware
    }

    pub fn rx_buffer_size(&self) -> usize {
        self.rx_buffer_size
    }

    /// Receive buffer bytes occupied by lines in flight
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    /// Number of lines waiting for `ok`/`error`
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Load a program for streaming; dispatch starts with the next `pump`
    pub fn load_program(&mut self, program: Program, estimated_time: Option<Duration>) {
        let name = program.name().to_string();
        let total = program.len();
        self.sender.load_program(program, estimated_time);
        self.publish(AppEvent::Sender(SenderEvent::Loaded { name, total }));
        if self.sender.state() == SenderState::Finished {
            self.publish_finished();
        }
    }

    /// Queue a line ahead of the program
    pub fn enqueue(&mut self, line: impl Into<String>) {
        self.feeder.enqueue(line);
    }

    /// Queue the commands that apply `profile`
    pub fn apply_profile(&mut self, profile: &MachineProfile) -> usize {
        let commands = ProfileApplier::new(profile).commands();
        let count = commands.len();
        tracing::info!("Applying profile '{}' ({} commands)", profile.name, count);
        self.feeder.enqueue_all(commands);
        count
    }

    fn too_long(&self, length: usize) -> Option<SenderError> {
        (length > self.rx_buffer_size).then(|| SenderError::LineTooLong {
            length,
            capacity: self.rx_buffer_size,
        })
    }

    /// Write as many lines as the receive buffer has room for
    ///
    /// Returns the number of lines written.
    pub fn pump(&mut self) -> Result<usize> {
        if !self.communicator.is_connected() {
            return Err(SenderError::NotConnected.into());
        }

        let mut written = 0;
        loop {
            if self.sender.state() == SenderState::Held || self.feeder.is_pending() {
                break;
            }

            if let Some(length) = self.feeder.peek().map(|line| line.len() + 1) {
                if let Some(error) = self.too_long(length) {
                    if let Some(line) = self.feeder.next() {
                        tracing::warn!("Dropping '{}': {}", line, error);
                    }
                    self.feeder.ack();
                    self.publish(AppEvent::Error(error.to_string()));
                    continue;
                }
                if self.buffered + length > self.rx_buffer_size {
                    break;
                }
                if let Some(line) = self.feeder.next() {
                    self.write_line(line, LineOrigin::Feeder)?;
                    written += 1;
                }
                continue;
            }

            if !self.feeder.is_held() && self.feeder.take_changed() && self.feeder.is_empty() {
                self.publish(AppEvent::Feeder(FeederEvent::Drained));
            }

            let Some(line) = self.sender.next_line().map(str::to_string) else {
                break;
            };
            let length = line.len() + 1;
            if let Some(error) = self.too_long(length) {
                tracing::warn!("Holding job at '{}': {}", line, error);
                self.hold_job(HoldReason::new(line).with_comment(error.to_string()))?;
                break;
            }
            if self.buffered + length > self.rx_buffer_size {
                break;
            }
            self.send_program_line(line)?;
            written += 1;
        }
        Ok(written)
    }

    fn send_program_line(&mut self, line: String) -> Result<()> {
        let starting = self.sender.state() == SenderState::Idle;
        let block = self.sender.current_block().cloned();

        self.write_line(line, LineOrigin::Program)?;
        self.sender.on_line_sent()?;

        if starting {
            self.publish(AppEvent::Sender(SenderEvent::Started));
        }
        if let Some(block) = block {
            if block.is_tool_change() {
                let count = self.sender.tool_changes();
                self.publish(AppEvent::Sender(SenderEvent::ToolChange { count }));
            }
            let pause = ["M0", "M1"].into_iter().find(|word| block.has(word));
            if let Some(word) = pause {
                self.hold_job(HoldReason::new(word).with_comment("program pause"))?;
            }
        }
        Ok(())
    }

    fn write_line(&mut self, line: String, origin: LineOrigin) -> Result<()> {
        if let Err(e) = self.communicator.send_line(&line) {
            self.handle_transport_error(&e);
            return Err(e);
        }
        tracing::trace!("> {}", line);
        let length = line.len() + 1;
        self.buffered += length;
        self.in_flight.push_back(InFlight {
            text: line,
            length,
            origin,
        });
        Ok(())
    }

    /// Write a realtime byte outside the line stream
    pub fn send_realtime(&mut self, command: RealtimeCommand) -> Result<()> {
        if let Err(e) = self.communicator.send_realtime(command.byte()) {
            self.handle_transport_error(&e);
            return Err(e);
        }
        Ok(())
    }

    /// Ask for a status report
    pub fn poll_status(&mut self) -> Result<()> {
        self.send_realtime(RealtimeCommand::StatusReport)
    }

    /// Read from the transport and process every complete line
    pub fn read(&mut self) -> Result<Vec<GrblResponse>> {
        let data = match self.communicator.receive() {
            Ok(data) => data,
            Err(e) => {
                self.handle_transport_error(&e);
                return Err(e);
            }
        };
        let mut responses = Vec::new();
        for line in self.line_buffer.push(&data) {
            if let Some(response) = self.handle_line(&line)? {
                responses.push(response);
            }
        }
        Ok(responses)
    }

    /// Process one received line
    pub fn handle_line(&mut self, line: &str) -> Result<Option<GrblResponse>> {
        let Some(response) = GrblResponse::parse(line) else {
            return Ok(None);
        };
        tracing::trace!("< {}", line.trim());

        match &response {
            GrblResponse::Ok => self.acknowledge(None)?,
            GrblResponse::Error(code) => self.acknowledge(Some(*code))?,
            GrblResponse::Alarm(code) => {
                tracing::warn!("{}", format_alarm(*code));
                self.publish(AppEvent::Firmware(FirmwareEvent::Alarm { code: *code }));
                if matches!(self.sender.state(), SenderState::Idle | SenderState::Running)
                    && self.sender.sent() > 0
                {
                    self.hold_job(HoldReason::new(format!("ALARM:{}", code)))?;
                }
            }
            GrblResponse::Status(report) => self.handle_status(report),
            GrblResponse::Setting { id, value } => self.settings.record(*id, value.clone()),
            GrblResponse::ParserState(words) => {
                self.modal.apply_parser_state(&format!("[GC:{}]", words));
            }
            GrblResponse::Message(text) => {
                tracing::info!("[MSG:{}]", text);
                self.publish(AppEvent::Firmware(FirmwareEvent::Message { text: text.clone() }));
            }
            GrblResponse::Feedback { tag, body } => {
                self.sender.record_parameter(tag.clone(), body.clone());
            }
            GrblResponse::Welcome { firmware, version } => {
                tracing::info!("Controller reset: {} {}", firmware, version);
                self.firmware = *firmware;
                self.clear_in_flight();
                if self.sender.interrupt(HoldReason::new("controller reset")) {
                    self.publish(AppEvent::Sender(SenderEvent::Held {
                        reason: "controller reset".to_string(),
                    }));
                }
                self.publish(AppEvent::Firmware(FirmwareEvent::Message {
                    text: response.to_string(),
                }));
            }
            GrblResponse::Text(text) => tracing::debug!("Unclassified response: {}", text),
        }

        Ok(Some(response))
    }

    fn acknowledge(&mut self, error: Option<u8>) -> Result<()> {
        let Some(line) = self.in_flight.pop_front() else {
            tracing::warn!("Acknowledgment with nothing in flight");
            return Ok(());
        };
        self.buffered = self.buffered.saturating_sub(line.length);

        if let Some(code) = error {
            tracing::warn!("{} for '{}'", format_error(code), line.text);
            self.publish(AppEvent::Firmware(FirmwareEvent::Error {
                code,
                line: Some(line.text.clone()),
            }));
        }

        match line.origin {
            LineOrigin::Feeder => self.feeder.ack(),
            LineOrigin::Program => {
                self.sender.on_line_acknowledged()?;
                self.publish(AppEvent::Sender(SenderEvent::Progress {
                    sent: self.sender.sent(),
                    received: self.sender.received(),
                    total: self.sender.total(),
                }));

                if self.sender.state() == SenderState::Finished {
                    self.publish_finished();
                } else if let Some(code) = error {
                    self.hold_job(HoldReason::new(line.text).with_comment(format_error(code)))?;
                }
            }
        }
        Ok(())
    }

    fn handle_status(&mut self, report: &StatusReport) {
        if let Some(overrides) = report.overrides {
            self.overrides = overrides;
        }
        self.sender.update_from_status(report);
        if self.last_state.as_ref() != Some(&report.state) {
            tracing::debug!("Machine state {}", report.state);
            self.last_state = Some(report.state.clone());
            self.publish(AppEvent::Firmware(FirmwareEvent::State {
                state: report.state.to_string(),
            }));
        }
    }

    fn hold_job(&mut self, reason: HoldReason) -> Result<()> {
        if self.sender.state() == SenderState::Held {
            return Ok(());
        }
        let description = reason.to_string();
        self.sender.pause(reason)?;
        self.publish(AppEvent::Sender(SenderEvent::Held {
            reason: description,
        }));
        Ok(())
    }

    /// Feed hold: stop motion and dispatch
    ///
    /// With a job loaded the Sender is held; otherwise the Feeder is.
    pub fn pause(&mut self, reason: HoldReason) -> Result<()> {
        self.send_realtime(RealtimeCommand::FeedHold)?;
        if self.sender.program().is_some()
            && matches!(self.sender.state(), SenderState::Idle | SenderState::Running)
        {
            self.hold_job(reason)?;
        } else if !self.feeder.is_held() {
            self.publish(AppEvent::Feeder(FeederEvent::Held {
                reason: reason.to_string(),
            }));
            self.feeder.hold(reason);
        }
        Ok(())
    }

    /// Cycle start: release holds and continue dispatch
    ///
    /// An interrupted job stays held and its error is returned once the
    /// Feeder has been released.
    pub fn resume(&mut self) -> Result<usize> {
        self.send_realtime(RealtimeCommand::CycleStart)?;
        if self.feeder.is_held() {
            self.feeder.unhold();
            self.publish(AppEvent::Feeder(FeederEvent::Released));
        }
        if self.sender.state() == SenderState::Held {
            self.sender.resume()?;
            self.publish(AppEvent::Sender(SenderEvent::Resumed));
        }
        self.pump()
    }

    /// Abort the job
    ///
    /// Clears the Feeder, finishes the Sender as cancelled and flushes
    /// pending override steps, then soft-resets the controller to discard
    /// whatever it still buffers. Lines already written cannot be recalled.
    pub fn cancel(&mut self) -> Result<()> {
        self.feeder.clear();
        self.sender.cancel();
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.cancel_all();
        }
        self.clear_in_flight();

        if self.sender.total() > 0 {
            self.publish_finished();
        }

        if self.communicator.is_connected() {
            self.send_realtime(RealtimeCommand::FeedHold)?;
            self.send_realtime(RealtimeCommand::Reset)?;
        }
        Ok(())
    }

    /// Schedule a feed or spindle override change
    pub fn adjust_override(&self, delta: i32, kind: OverrideKind) -> Result<usize> {
        let dispatcher = self.dispatcher.as_ref().ok_or_else(|| SenderError::DispatchUnavailable {
            reason: "no override dispatcher configured".to_string(),
        })?;
        dispatcher.dispatch(delta, kind)
    }

    /// Transport failed or closed underneath the job
    pub fn connection_lost(&mut self, reason: &str) {
        tracing::warn!("Connection lost: {}", reason);
        let interrupted = self.sender.connection_lost();
        self.feeder.hold(HoldReason::new("connection lost"));
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.cancel_all();
        }
        self.clear_in_flight();
        self.line_buffer.clear();
        self.last_state = None;
        self.publish(AppEvent::Connection(ConnectionEvent::Lost {
            reason: reason.to_string(),
        }));
        if interrupted {
            self.publish(AppEvent::Sender(SenderEvent::Held {
                reason: "connection lost".to_string(),
            }));
        }
    }

    /// Close the transport on request
    pub fn disconnect(&mut self) -> Result<()> {
        self.connection_lost("disconnected");
        self.modal.reset();
        self.communicator.disconnect()
    }

    fn handle_transport_error(&mut self, error: &Error) {
        if error.is_connection_error() {
            self.connection_lost(&error.to_string());
        }
    }

    fn clear_in_flight(&mut self) {
        if !self.in_flight.is_empty() {
            tracing::debug!("Dropping {} line(s) in flight", self.in_flight.len());
        }
        self.in_flight.clear();
        self.buffered = 0;
        self.feeder.ack();
    }

    fn publish_finished(&self) {
        let status = self.sender.status();
        self.publish(AppEvent::Sender(SenderEvent::Finished {
            cancelled: status.cancelled,
            elapsed_ms: status.elapsed_time,
        }));
    }

    fn publish(&self, event: AppEvent) {
        tracing::trace!("{}", event.description());
        if let Some(bus) = &self.events {
            let _ = bus.publish(event);
        }
    }
}

impl std::fmt::Debug for StreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamController")
            .field("rx_buffer_size", &self.rx_buffer_size)
            .field("buffered", &self.buffered)
            .field("in_flight", &self.in_flight.len())
            .field("feeder", &self.feeder.state())
            .field("sender", &self.sender.state())
            .finish()
    }
}
