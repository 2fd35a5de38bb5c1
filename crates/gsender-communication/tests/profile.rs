use gsender_communication::{EepromSettings, MachineProfile, ProfileApplier, StreamController};
use gsender_communication::{Communicator, ConnectionParams};
use gsender_core::{ControllerType, Result};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

fn position(commands: &[String], wanted: &str) -> usize {
    commands
        .iter()
        .position(|c| c == wanted)
        .unwrap_or_else(|| panic!("{} not in {:?}", wanted, commands))
}

#[test]
fn test_limits_precede_homing() {
    let settings = EepromSettings::from_pairs(
        ControllerType::Grbl,
        [("$20", "1"), ("$21", "0"), ("$22", "1"), ("$100", "200")],
    )
    .unwrap();
    let profile = MachineProfile::new("LongMill", "MK2 30x30", settings);
    let commands = ProfileApplier::new(&profile).commands();

    assert!(position(&commands, "$20=1") < position(&commands, "$22=1"));
    assert!(position(&commands, "$21=0") < position(&commands, "$22=1"));
    assert_eq!(commands.last().map(String::as_str), Some("$$"));
    assert_eq!(commands.len(), 5);
}

#[test]
fn test_homing_written_first_is_moved() {
    let settings = EepromSettings::from_pairs(
        ControllerType::Grbl,
        [("$22", "1"), ("$21", "1"), ("$20", "1")],
    )
    .unwrap();
    let profile = MachineProfile::new("Test", "", settings);
    let commands = ProfileApplier::new(&profile).commands();
    assert_eq!(commands, vec!["$21=1", "$20=1", "$22=1", "$$"]);
}

#[test]
fn test_load_profile_from_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{
            "name": "grblHAL router",
            "type": "4x4",
            "firmware": "grblHAL",
            "eepromSettings": {{ "$22": "1", "$20": "1", "$300": "router" }}
        }}"#
    )
    .unwrap();

    let profile = MachineProfile::load(file.path()).unwrap();
    assert_eq!(profile.firmware(), ControllerType::GrblHal);
    assert_eq!(
        ProfileApplier::new(&profile).commands(),
        vec!["$20=1", "$22=1", "$300=router", "$$"]
    );
}

#[test]
fn test_load_missing_profile_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(MachineProfile::load(&dir.path().join("missing.json")).is_err());
}

#[derive(Clone, Default)]
struct Lines(Arc<Mutex<Vec<String>>>);

impl Communicator for Lines {
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
        let text = String::from_utf8_lossy(data);
        self.0.lock().extend(text.lines().map(str::to_string));
        Ok(data.len())
    }
    fn receive(&mut self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_profile_is_streamed_one_command_at_a_time() {
    let settings =
        EepromSettings::from_pairs(ControllerType::Grbl, [("$22", "1"), ("$20", "1")]).unwrap();
    let profile = MachineProfile::new("Test", "", settings);

    let lines = Lines::default();
    let mut ctl = StreamController::new(Box::new(lines.clone()), 128);
    assert_eq!(ctl.apply_profile(&profile), 3);

    for _ in 0..3 {
        assert_eq!(ctl.pump().unwrap(), 1);
        ctl.handle_line("ok").unwrap();
    }
    assert_eq!(*lines.0.lock(), vec!["$20=1", "$22=1", "$$"]);
    assert!(ctl.feeder().is_empty());
}
