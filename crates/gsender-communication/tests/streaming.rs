use gsender_communication::{
    Communicator, ConnectionParams, HoldReason, SenderState, StreamController,
};
use gsender_core::{AppEvent, EventBus, EventFilter, Result, SenderEvent};
use gsender_gcode::Program;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Controller double: records written lines and answers each with `ok`
#[derive(Clone, Default)]
struct MockController {
    sent: Arc<Mutex<Vec<String>>>,
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

    fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
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
        if data.len() == 1 && !data.ends_with(b"\n") {
            self.realtime.lock().push(data[0]);
            return Ok(1);
        }
        let text = String::from_utf8_lossy(data);
        for line in text.lines() {
            self.sent.lock().push(line.to_string());
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

fn program(count: usize) -> Program {
    let lines: Vec<String> = (0..count).map(|i| format!("G1 X{} F1000", i)).collect();
    Program::from_lines("job.nc", lines)
}

#[test]
fn test_hundred_line_job_finishes() {
    let mock = MockController::auto_ok();
    let mut ctl = StreamController::new(Box::new(mock.clone()), 128);
    ctl.load_program(program(100), None);

    for _ in 0..1000 {
        ctl.pump().unwrap();
        ctl.read().unwrap();
        if ctl.sender().state() == SenderState::Finished {
            break;
        }
    }

    let status = ctl.sender().status();
    assert_eq!(status.state, SenderState::Finished);
    assert_eq!(status.total, 100);
    assert_eq!(status.sent, 100);
    assert_eq!(status.received, 100);
    assert!(!status.cancelled);
    assert_eq!(ctl.buffered(), 0);

    let sent = mock.sent();
    assert_eq!(sent.len(), 100);
    assert_eq!(sent[0], "G1 X0 F1000");
    assert_eq!(sent[99], "G1 X99 F1000");
}

#[test]
fn test_buffer_never_overflows() {
    let mock = MockController::default();
    let mut ctl = StreamController::new(Box::new(mock.clone()), 64);
    ctl.load_program(program(50), None);

    ctl.pump().unwrap();
    assert!(ctl.buffered() <= 64);
    let first_batch = mock.sent().len();
    assert!(first_batch > 0 && first_batch < 50);

    // Nothing more goes out until something is acknowledged
    assert_eq!(ctl.pump().unwrap(), 0);
    ctl.handle_line("ok").unwrap();
    assert!(ctl.pump().unwrap() >= 1);
    assert!(ctl.buffered() <= 64);
}

#[test]
fn test_pause_keeps_feeder_lines_in_order() {
    let mock = MockController::default();
    let mut ctl = StreamController::new(Box::new(mock.clone()), 128);
    ctl.load_program(program(3), None);
    ctl.pump().unwrap();
    assert_eq!(mock.sent().len(), 3);

    ctl.pause(HoldReason::new("operator")).unwrap();
    ctl.enqueue("G0 Z5");
    ctl.enqueue("M5");
    assert_eq!(ctl.pump().unwrap(), 0);
    assert_eq!(ctl.feeder().len(), 2);
    assert_eq!(mock.realtime.lock().as_slice(), b"!");

    for _ in 0..3 {
        ctl.handle_line("ok").unwrap();
    }
    assert_eq!(ctl.sender().state(), SenderState::Finished);

    // Finished job no longer blocks the queue
    ctl.pump().unwrap();
    ctl.handle_line("ok").unwrap();
    ctl.pump().unwrap();
    let sent = mock.sent();
    assert_eq!(&sent[3..], &["G0 Z5".to_string(), "M5".to_string()]);
}

#[test]
fn test_resume_continues_after_hold() {
    let mock = MockController::default();
    let mut ctl = StreamController::new(Box::new(mock.clone()), 16);
    ctl.load_program(program(4), None);

    ctl.pump().unwrap();
    let before = mock.sent().len();
    ctl.pause(HoldReason::new("operator")).unwrap();
    ctl.handle_line("ok").unwrap();
    assert_eq!(ctl.pump().unwrap(), 0);

    assert!(ctl.resume().unwrap() >= 1);
    assert!(mock.sent().len() > before);
    assert_eq!(mock.realtime.lock().as_slice(), b"!~");
}

#[test]
fn test_events_are_published() {
    let bus = Arc::new(EventBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(EventFilter::All, move |event| sink.lock().push(event.clone()));

    let mock = MockController::auto_ok();
    let mut ctl = StreamController::new(Box::new(mock), 128).with_events(bus.clone());
    ctl.load_program(program(2), None);
    ctl.pump().unwrap();
    ctl.read().unwrap();

    let events = seen.lock().clone();
    assert!(matches!(
        events.first(),
        Some(AppEvent::Sender(SenderEvent::Loaded { total: 2, .. }))
    ));
    assert!(events.contains(&AppEvent::Sender(SenderEvent::Started)));
    assert!(events
        .iter()
        .any(|e| matches!(e, AppEvent::Sender(SenderEvent::Finished { cancelled: false, .. }))));
}

#[test]
fn test_firmware_error_holds_until_resume() {
    let mock = MockController::default();
    // Room for the first two lines only
    let mut ctl = StreamController::new(Box::new(mock.clone()), 16);
    ctl.load_program(Program::from_lines("t", ["G1 X1", "G1 X2 F0", "G1 X3"]), None);
    assert_eq!(ctl.pump().unwrap(), 2);

    ctl.handle_line("ok").unwrap();
    ctl.handle_line("error:22").unwrap();
    assert_eq!(ctl.sender().state(), SenderState::Held);
    assert_eq!(ctl.pump().unwrap(), 0);
    assert_eq!(mock.sent().len(), 2);

    assert_eq!(ctl.resume().unwrap(), 1);
    ctl.handle_line("ok").unwrap();
    let status = ctl.sender().status();
    assert_eq!(status.state, SenderState::Finished);
    assert_eq!(status.received, 3);
    assert_eq!(mock.sent().last().map(String::as_str), Some("G1 X3"));
}
