//! GRBL realtime commands
//!
//! Single bytes the controller picks out of the serial stream as soon as
//! they arrive; they never occupy receive buffer space and get no `ok`.

/// Realtime command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RealtimeCommand {
    /// Soft reset (Ctrl-X)
    Reset = 0x18,
    StatusReport = b'?',
    CycleStart = b'~',
    FeedHold = b'!',
    JogCancel = 0x85,
    FeedOverrideReset = 0x90,
    FeedOverridePlusTen = 0x91,
    FeedOverrideMinusTen = 0x92,
    FeedOverridePlusOne = 0x93,
    FeedOverrideMinusOne = 0x94,
    RapidOverrideReset = 0x95,
    RapidOverrideHalf = 0x96,
    RapidOverrideQuarter = 0x97,
    SpindleOverrideReset = 0x99,
    SpindleOverridePlusTen = 0x9A,
    SpindleOverrideMinusTen = 0x9B,
    SpindleOverridePlusOne = 0x9C,
    SpindleOverrideMinusOne = 0x9D,
    /// Only honoured in the Hold state
    ToggleSpindleStop = 0x9E,
}

impl RealtimeCommand {
    /// Wire byte
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Decode a wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        use RealtimeCommand::*;
        Some(match byte {
            0x18 => Reset,
            b'?' => StatusReport,
            b'~' => CycleStart,
            b'!' => FeedHold,
            0x85 => JogCancel,
            0x90 => FeedOverrideReset,
            0x91 => FeedOverridePlusTen,
            0x92 => FeedOverrideMinusTen,
            0x93 => FeedOverridePlusOne,
            0x94 => FeedOverrideMinusOne,
            0x95 => RapidOverrideReset,
            0x96 => RapidOverrideHalf,
            0x97 => RapidOverrideQuarter,
            0x99 => SpindleOverrideReset,
            0x9A => SpindleOverridePlusTen,
            0x9B => SpindleOverrideMinusTen,
            0x9C => SpindleOverridePlusOne,
            0x9D => SpindleOverrideMinusOne,
            0x9E => ToggleSpindleStop,
            _ => return None,
        })
    }
}

impl From<RealtimeCommand> for u8 {
    fn from(command: RealtimeCommand) -> Self {
        command.byte()
    }
}
