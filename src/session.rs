//! Async streaming session
//!
//! A [`Session`] owns the [`StreamController`] and drives it from a tokio
//! task: it reads controller output, pumps queued lines, polls status on a
//! fixed interval and forwards paced override bytes from the
//! [`OverrideDispatcher`](gsender_communication::OverrideDispatcher) channel. Everything else talks to it through a
//! [`SessionHandle`].

use gsender_communication::{
    HoldReason, OverrideKind, RealtimeCommand, SenderState, StreamController,
};
use gsender_core::{Config, Error, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Timing knobs for the session loop
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Interval between `?` status polls
    pub status_interval: Duration,
    /// Interval between reads of controller output
    pub read_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_millis(250),
            read_interval: Duration::from_millis(5),
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            status_interval: Duration::from_millis(config.streaming.status_poll_ms),
            ..Self::default()
        }
    }
}

/// Requests accepted by a running session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Pause,
    Resume,
    Cancel,
    Override { delta: i32, kind: OverrideKind },
    /// Raw line queued on the Feeder
    Enqueue(String),
}

impl SessionCommand {
    /// Parse an operator console line
    ///
    /// `pause`, `resume` and `cancel` control the job; `feed <delta>` and
    /// `spindle <delta>` adjust overrides; anything else is sent as G-code.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let mut parts = line.split_whitespace();
        let head = parts.next()?.to_ascii_lowercase();
        match head.as_str() {
            "pause" => Some(Self::Pause),
            "resume" => Some(Self::Resume),
            "cancel" => Some(Self::Cancel),
            "feed" | "spindle" => {
                let kind = head.parse().ok()?;
                let delta = parts.next()?.trim_start_matches('+').parse().ok()?;
                Some(Self::Override { delta, kind })
            }
            _ => Some(Self::Enqueue(line.to_string())),
        }
    }
}

/// Cloneable handle for sending commands to a session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    pub fn send(&self, command: SessionCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| Error::other("session has stopped"))
    }

    pub fn pause(&self) -> Result<()> {
        self.send(SessionCommand::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(SessionCommand::Resume)
    }

    pub fn cancel(&self) -> Result<()> {
        self.send(SessionCommand::Cancel)
    }
}

/// Drives a [`StreamController`] until its work is done
pub struct Session {
    controller: StreamController,
    realtime_rx: Option<mpsc::UnboundedReceiver<RealtimeCommand>>,
    commands: Option<mpsc::UnboundedReceiver<SessionCommand>>,
    options: SessionOptions,
}

impl Session {
    pub fn new(controller: StreamController, options: SessionOptions) -> (Self, SessionHandle) {
        let (tx, commands) = mpsc::unbounded_channel();
        (
            Self {
                controller,
                realtime_rx: None,
                commands: Some(commands),
                options,
            },
            SessionHandle { tx },
        )
    }

    /// Forward realtime bytes produced by an [`OverrideDispatcher`](gsender_communication::OverrideDispatcher)
    pub fn with_realtime(mut self, rx: mpsc::UnboundedReceiver<RealtimeCommand>) -> Self {
        self.realtime_rx = Some(rx);
        self
    }

    pub fn controller(&self) -> &StreamController {
        &self.controller
    }

    /// Nothing left to send or acknowledge
    ///
    /// A loaded job must have finished; a Held job keeps the session alive
    /// until it is resumed or cancelled.
    pub fn is_done(&self) -> bool {
        let job_done = match self.controller.sender().program() {
            Some(_) => self.controller.sender().state() == SenderState::Finished,
            None => true,
        };
        job_done
            && self.controller.feeder().is_empty()
            && !self.controller.feeder().is_pending()
            && self.controller.in_flight() == 0
    }

    /// Run until [`Session::is_done`], returning the controller
    ///
    /// A lost connection ends the session with the error after the
    /// controller has recorded the loss.
    pub async fn run(mut self) -> Result<StreamController> {
        let mut status = interval(self.options.status_interval);
        status.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut reads = interval(self.options.read_interval);
        reads.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("Session started");
        self.controller.pump()?;

        loop {
            if self.is_done() {
                break;
            }

            // Operator commands are polled ahead of controller I/O
            tokio::select! {
                biased;
                command = recv(&mut self.commands) => match command {
                    Some(command) => {
                        if let Err(e) = self.handle(command) {
                            if e.is_connection_error() {
                                return Err(self.fail(e));
                            }
                            tracing::warn!("Command rejected: {}", e);
                        }
                    }
                    None => {
                        tracing::debug!("All session handles dropped");
                        self.commands = None;
                    }
                },
                Some(command) = recv(&mut self.realtime_rx) => {
                    if let Err(e) = self.controller.send_realtime(command) {
                        return Err(self.fail(e));
                    }
                }
                _ = reads.tick() => {
                    if let Err(e) = self.service() {
                        return Err(self.fail(e));
                    }
                }
                _ = status.tick() => {
                    if let Err(e) = self.controller.poll_status() {
                        return Err(self.fail(e));
                    }
                }
            }
        }

        tracing::info!("Session finished");
        Ok(self.controller)
    }

    fn service(&mut self) -> Result<()> {
        for response in self.controller.read()? {
            tracing::trace!("<- {}", response);
        }
        self.controller.pump()?;
        Ok(())
    }

    fn handle(&mut self, command: SessionCommand) -> Result<()> {
        tracing::debug!("Session command: {:?}", command);
        match command {
            SessionCommand::Pause => self.controller.pause(HoldReason::new("operator pause"))?,
            SessionCommand::Resume => {
                self.controller.resume()?;
            }
            SessionCommand::Cancel => {
                let cancelled = self.controller.cancel();
                self.discard_realtime();
                cancelled?;
            }
            SessionCommand::Override { delta, kind } => {
                if let Err(e) = self.controller.adjust_override(delta, kind) {
                    tracing::warn!("Override not applied: {}", e);
                }
            }
            SessionCommand::Enqueue(line) => {
                self.controller.enqueue(line);
                self.controller.pump()?;
            }
        }
        Ok(())
    }

    /// Drop override bytes queued before a cancel
    fn discard_realtime(&mut self) {
        let Some(rx) = &mut self.realtime_rx else {
            return;
        };
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!("Discarded {} queued realtime byte(s)", dropped);
        }
    }

    fn fail(&mut self, error: Error) -> Error {
        if error.is_connection_error() {
            self.controller.connection_lost(&error.to_string());
        }
        tracing::error!("Session stopped: {}", error);
        error
    }
}

/// Receive from an optional channel; an absent channel never yields
async fn recv<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsender_communication::{Communicator, ConnectionParams, OverrideDispatcher};
    use gsender_gcode::Program;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Answers every line with `ok` (when enabled) and every `?` with a status report
    #[derive(Clone, Default)]
    struct MockController {
        lines: Arc<Mutex<Vec<String>>>,
        realtime: Arc<Mutex<Vec<u8>>>,
        replies: Arc<Mutex<VecDeque<u8>>>,
        auto_ok: bool,
    }

    impl MockController {
        fn auto_ok() -> Self {
            Self {
                auto_ok: true,
                ..Self::default()
            }
        }
    }

    impl Communicator for MockController {
        fn connect(&mut self, _params: &ConnectionParams) -> Result<()> {
            Ok(())
        }

        fn disconnect(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn send(&mut self, data: &[u8]) -> Result<usize> {
            if data.len() == 1 && data[0] != b'\n' {
                self.realtime.lock().push(data[0]);
                if data[0] == b'?' {
                    self.replies
                        .lock()
                        .extend(b"<Idle|MPos:0.000,0.000,0.000|FS:0,0>\r\n");
                }
                return Ok(1);
            }
            for line in String::from_utf8_lossy(data).lines() {
                self.lines.lock().push(line.to_string());
                if self.auto_ok {
                    self.replies.lock().extend(b"ok\r\n");
                }
            }
            Ok(data.len())
        }

        fn receive(&mut self) -> Result<Vec<u8>> {
            Ok(self.replies.lock().drain(..).collect())
        }
    }

    fn options() -> SessionOptions {
        SessionOptions {
            status_interval: Duration::from_millis(20),
            read_interval: Duration::from_millis(1),
        }
    }

    fn program(count: usize) -> Program {
        let lines: Vec<String> = (0..count).map(|i| format!("G1 X{} F500", i)).collect();
        Program::from_lines("session.nc", lines)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(SessionCommand::parse("pause"), Some(SessionCommand::Pause));
        assert_eq!(SessionCommand::parse(" RESUME "), Some(SessionCommand::Resume));
        assert_eq!(
            SessionCommand::parse("feed +20"),
            Some(SessionCommand::Override {
                delta: 20,
                kind: OverrideKind::Feed
            })
        );
        assert_eq!(
            SessionCommand::parse("spindle -5"),
            Some(SessionCommand::Override {
                delta: -5,
                kind: OverrideKind::Spindle
            })
        );
        assert_eq!(
            SessionCommand::parse("G0 X10"),
            Some(SessionCommand::Enqueue("G0 X10".to_string()))
        );
        assert_eq!(SessionCommand::parse("feed lots"), None);
        assert_eq!(SessionCommand::parse("   "), None);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.streaming.status_poll_ms = 100;
        let options = SessionOptions::from(&config);
        assert_eq!(options.status_interval, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_session_runs_job_to_completion() {
        let mock = MockController::auto_ok();
        let mut controller = StreamController::new(Box::new(mock.clone()), 64);
        controller.load_program(program(50), None);

        let (session, _handle) = Session::new(controller, options());
        let controller = tokio::time::timeout(Duration::from_secs(5), session.run())
            .await
            .expect("session timed out")
            .unwrap();

        let status = controller.sender().status();
        assert_eq!(status.state, SenderState::Finished);
        assert_eq!(status.received, 50);
        assert!(!status.cancelled);
        assert_eq!(mock.lines.lock().len(), 50);
    }

    #[tokio::test]
    async fn test_session_drains_feeder_without_job() {
        let mock = MockController::auto_ok();
        let mut controller = StreamController::new(Box::new(mock.clone()), 128);
        controller.enqueue("$X");
        controller.enqueue("G0 X1");

        let (session, handle) = Session::new(controller, options());
        handle
            .send(SessionCommand::Enqueue("G0 X2".to_string()))
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), session.run())
            .await
            .expect("session timed out")
            .unwrap();

        assert_eq!(*mock.lines.lock(), vec!["$X", "G0 X1", "G0 X2"]);
    }

    #[tokio::test]
    async fn test_empty_program_ends_session() {
        let mock = MockController::auto_ok();
        let mut controller = StreamController::new(Box::new(mock.clone()), 64);
        controller.load_program(Program::from_lines("empty.nc", ["; nothing"]), None);

        let (session, _handle) = Session::new(controller, options());
        let controller = tokio::time::timeout(Duration::from_secs(5), session.run())
            .await
            .expect("session timed out")
            .unwrap();
        assert_eq!(controller.sender().state(), SenderState::Finished);
        assert!(mock.lines.lock().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_stops_unacknowledged_job() {
        let mock = MockController::default();
        let mut controller = StreamController::new(Box::new(mock.clone()), 64);
        controller.load_program(program(20), None);

        let (session, handle) = Session::new(controller, options());
        let run = tokio::spawn(session.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel().unwrap();

        let controller = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("session timed out")
            .unwrap()
            .unwrap();

        let status = controller.sender().status();
        assert!(status.cancelled);
        assert!(status.received < status.total);
        let realtime = mock.realtime.lock().clone();
        assert!(realtime.ends_with(&[b'!', 0x18]));
    }

    #[tokio::test]
    async fn test_cancel_discards_queued_override_bytes() {
        let mock = MockController::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut controller = StreamController::new(Box::new(mock.clone()), 64);
        controller.load_program(program(5), None);
        let (session, _handle) = Session::new(controller, options());
        let mut session = session.with_realtime(rx);

        for _ in 0..3 {
            tx.send(RealtimeCommand::FeedOverridePlusTen).unwrap();
        }
        session.handle(SessionCommand::Cancel).unwrap();

        let rx = session.realtime_rx.as_mut().unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(mock.realtime.lock().as_slice(), &[b'!', 0x18]);
    }

    #[tokio::test]
    async fn test_override_bytes_reach_controller() {
        let mock = MockController::default();
        let (dispatcher, realtime_rx) = OverrideDispatcher::channel();
        let dispatcher = dispatcher.with_step_delay(Duration::from_millis(1));
        let mut controller =
            StreamController::new(Box::new(mock.clone()), 64).with_dispatcher(dispatcher);
        controller.load_program(program(5), None);

        let (session, handle) = Session::new(controller, options());
        let run = tokio::spawn(session.with_realtime(realtime_rx).run());

        handle
            .send(SessionCommand::Override {
                delta: 11,
                kind: OverrideKind::Feed,
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel().unwrap();
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("session timed out")
            .unwrap()
            .unwrap();

        let realtime = mock.realtime.lock().clone();
        assert!(realtime.contains(&0x91));
        assert!(realtime.contains(&0x93));
    }
}
