//! Modal state tracking
//!
//! Modal groups persist from line to line until another word of the same
//! group replaces them. The tracker is a passive accumulator: it applies
//! words in the order they appear and never rejects a block, so when a line
//! carries two words of one group the later word wins.

use crate::block::{GcodeBlock, Word};
use gsender_core::Units;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Motion mode - Group 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionMode {
    /// G0 rapid positioning
    Rapid,
    /// G1 linear interpolation
    Linear,
    /// G2 clockwise arc
    ArcCw,
    /// G3 counter-clockwise arc
    ArcCcw,
    /// G38.2 probe toward, error on miss
    ProbeToward,
    /// G38.3 probe toward
    ProbeTowardNoError,
    /// G38.4 probe away, error on miss
    ProbeAway,
    /// G38.5 probe away
    ProbeAwayNoError,
    /// G80 motion cancel
    Cancel,
}

/// Work coordinate system - Group 12 (G54 - G59)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkCoordinateSystem {
    /// G54
    G54,
    /// G55
    G55,
    /// G56
    G56,
    /// G57
    G57,
    /// G58
    G58,
    /// G59
    G59,
}

/// Plane selection - Group 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plane {
    /// G17
    Xy,
    /// G18
    Zx,
    /// G19
    Yz,
}

/// Distance mode - Group 3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMode {
    /// G90
    Absolute,
    /// G91
    Incremental,
}

/// Feed rate mode - Group 5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedRateMode {
    /// G93
    InverseTime,
    /// G94
    UnitsPerMinute,
    /// G95
    UnitsPerRevolution,
}

/// Cutter radius compensation - Group 7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutterCompensation {
    /// G40
    Off,
    /// G41
    Left,
    /// G42
    Right,
}

/// Tool length offset - Group 8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolLengthOffset {
    /// G43
    Enabled,
    /// G43.1
    Dynamic,
    /// G49
    Cancelled,
}

/// Program flow - Group 4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgramMode {
    /// M0
    Pause,
    /// M1
    OptionalPause,
    /// M2
    End,
    /// M30
    EndAndRewind,
}

/// Spindle state - Group 7 (M)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpindleState {
    /// M3
    Clockwise,
    /// M4
    CounterClockwise,
    /// M5
    Off,
}

/// Coolant state - Group 8 (M)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoolantState {
    /// M7
    Mist,
    /// M8
    Flood,
    /// M9
    Off,
}

/// Interpreter state; `None` until a block sets the field
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Modal {
    /// Motion mode
    pub motion: Option<MotionMode>,
    /// Work coordinate system
    pub wcs: Option<WorkCoordinateSystem>,
    /// Plane selection
    pub plane: Option<Plane>,
    /// Units
    pub units: Option<Units>,
    /// Distance mode
    pub distance: Option<DistanceMode>,
    /// Feed rate mode
    pub feedrate: Option<FeedRateMode>,
    /// Cutter compensation
    pub cutter: Option<CutterCompensation>,
    /// Tool length offset
    pub tlo: Option<ToolLengthOffset>,
    /// Program flow
    pub program: Option<ProgramMode>,
    /// Spindle
    pub spindle: Option<SpindleState>,
    /// Coolant
    pub coolant: Option<CoolantState>,
    /// Active tool number
    pub tool: Option<u32>,
}

impl Modal {
    /// Units in effect, millimeters when never set
    pub fn effective_units(&self) -> Units {
        self.units.unwrap_or_default()
    }

    /// Distance mode in effect, absolute when never set
    pub fn effective_distance(&self) -> DistanceMode {
        self.distance.unwrap_or(DistanceMode::Absolute)
    }

    /// Overwrite whichever field `word` selects; other words are ignored
    fn apply_word(&mut self, word: &Word) {
        match word.key().as_str() {
            "G0" => self.motion = Some(MotionMode::Rapid),
            "G1" => self.motion = Some(MotionMode::Linear),
            "G2" => self.motion = Some(MotionMode::ArcCw),
            "G3" => self.motion = Some(MotionMode::ArcCcw),
            "G38.2" => self.motion = Some(MotionMode::ProbeToward),
            "G38.3" => self.motion = Some(MotionMode::ProbeTowardNoError),
            "G38.4" => self.motion = Some(MotionMode::ProbeAway),
            "G38.5" => self.motion = Some(MotionMode::ProbeAwayNoError),
            "G80" => self.motion = Some(MotionMode::Cancel),
            "G54" => self.wcs = Some(WorkCoordinateSystem::G54),
            "G55" => self.wcs = Some(WorkCoordinateSystem::G55),
            "G56" => self.wcs = Some(WorkCoordinateSystem::G56),
            "G57" => self.wcs = Some(WorkCoordinateSystem::G57),
            "G58" => self.wcs = Some(WorkCoordinateSystem::G58),
            "G59" => self.wcs = Some(WorkCoordinateSystem::G59),
            "G17" => self.plane = Some(Plane::Xy),
            "G18" => self.plane = Some(Plane::Zx),
            "G19" => self.plane = Some(Plane::Yz),
            "G20" => self.units = Some(Units::Inches),
            "G21" => self.units = Some(Units::Millimeters),
            "G90" => self.distance = Some(DistanceMode::Absolute),
            "G91" => self.distance = Some(DistanceMode::Incremental),
            "G93" => self.feedrate = Some(FeedRateMode::InverseTime),
            "G94" => self.feedrate = Some(FeedRateMode::UnitsPerMinute),
            "G95" => self.feedrate = Some(FeedRateMode::UnitsPerRevolution),
            "G40" => self.cutter = Some(CutterCompensation::Off),
            "G41" => self.cutter = Some(CutterCompensation::Left),
            "G42" => self.cutter = Some(CutterCompensation::Right),
            "G43" => self.tlo = Some(ToolLengthOffset::Enabled),
            "G43.1" => self.tlo = Some(ToolLengthOffset::Dynamic),
            "G49" => self.tlo = Some(ToolLengthOffset::Cancelled),
            "M0" => self.program = Some(ProgramMode::Pause),
            "M1" => self.program = Some(ProgramMode::OptionalPause),
            "M2" => self.program = Some(ProgramMode::End),
            "M30" => self.program = Some(ProgramMode::EndAndRewind),
            "M3" => self.spindle = Some(SpindleState::Clockwise),
            "M4" => self.spindle = Some(SpindleState::CounterClockwise),
            "M5" => self.spindle = Some(SpindleState::Off),
            "M7" => self.coolant = Some(CoolantState::Mist),
            "M8" => self.coolant = Some(CoolantState::Flood),
            "M9" => self.coolant = Some(CoolantState::Off),
            "T" => {
                if let Some(tool) = word.as_f64().filter(|t| *t >= 0.0) {
                    self.tool = Some(tool as u32);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for Modal {
    /// Words for every set field, in `$G` report order
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words: Vec<String> = Vec::new();
        if let Some(motion) = self.motion {
            words.push(
                match motion {
                    MotionMode::Rapid => "G0",
                    MotionMode::Linear => "G1",
                    MotionMode::ArcCw => "G2",
                    MotionMode::ArcCcw => "G3",
                    MotionMode::ProbeToward => "G38.2",
                    MotionMode::ProbeTowardNoError => "G38.3",
                    MotionMode::ProbeAway => "G38.4",
                    MotionMode::ProbeAwayNoError => "G38.5",
                    MotionMode::Cancel => "G80",
                }
                .to_string(),
            );
        }
        if let Some(wcs) = self.wcs {
            words.push(format!("{:?}", wcs));
        }
        if let Some(plane) = self.plane {
            words.push(
                match plane {
                    Plane::Xy => "G17",
                    Plane::Zx => "G18",
                    Plane::Yz => "G19",
                }
                .to_string(),
            );
        }
        if let Some(units) = self.units {
            words.push(units.gcode().to_string());
        }
        if let Some(distance) = self.distance {
            words.push(
                match distance {
                    DistanceMode::Absolute => "G90",
                    DistanceMode::Incremental => "G91",
                }
                .to_string(),
            );
        }
        if let Some(feedrate) = self.feedrate {
            words.push(
                match feedrate {
                    FeedRateMode::InverseTime => "G93",
                    FeedRateMode::UnitsPerMinute => "G94",
                    FeedRateMode::UnitsPerRevolution => "G95",
                }
                .to_string(),
            );
        }
        if let Some(cutter) = self.cutter {
            words.push(
                match cutter {
                    CutterCompensation::Off => "G40",
                    CutterCompensation::Left => "G41",
                    CutterCompensation::Right => "G42",
                }
                .to_string(),
            );
        }
        if let Some(tlo) = self.tlo {
            words.push(
                match tlo {
                    ToolLengthOffset::Enabled => "G43",
                    ToolLengthOffset::Dynamic => "G43.1",
                    ToolLengthOffset::Cancelled => "G49",
                }
                .to_string(),
            );
        }
        if let Some(program) = self.program {
            words.push(
                match program {
                    ProgramMode::Pause => "M0",
                    ProgramMode::OptionalPause => "M1",
                    ProgramMode::End => "M2",
                    ProgramMode::EndAndRewind => "M30",
                }
                .to_string(),
            );
        }
        if let Some(spindle) = self.spindle {
            words.push(
                match spindle {
                    SpindleState::Clockwise => "M3",
                    SpindleState::CounterClockwise => "M4",
                    SpindleState::Off => "M5",
                }
                .to_string(),
            );
        }
        if let Some(coolant) = self.coolant {
            words.push(
                match coolant {
                    CoolantState::Mist => "M7",
                    CoolantState::Flood => "M8",
                    CoolantState::Off => "M9",
                }
                .to_string(),
            );
        }
        if let Some(tool) = self.tool {
            words.push(format!("T{}", tool));
        }
        write!(f, "{}", words.join(" "))
    }
}

/// Accumulates modal state from streamed blocks
#[derive(Debug, Clone, Default)]
pub struct ModalTracker {
    modal: Modal,
}

impl ModalTracker {
    /// Create a tracker with every field unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known state, e.g. one reported by the firmware
    pub fn with_modal(modal: Modal) -> Self {
        Self { modal }
    }

    /// Apply every modal word of `block` in word order
    pub fn apply(&mut self, block: &GcodeBlock) {
        for word in block.words() {
            self.modal.apply_word(word);
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Modal {
        self.modal
    }

    /// Forget everything (disconnect or new program)
    pub fn reset(&mut self) {
        self.modal = Modal::default();
    }

    /// Reconcile with a GRBL `[GC:G0 G54 G17 G21 G90 G94 M5 M9 T0 F0 S0]`
    /// parser-state report. Returns false if the line is not one.
    pub fn apply_parser_state(&mut self, line: &str) -> bool {
        let inner = line
            .trim()
            .strip_prefix("[GC:")
            .and_then(|rest| rest.strip_suffix(']'));
        match inner {
            Some(words) => {
                self.apply(&GcodeBlock::parse(words));
                true
            }
            None => false,
        }
    }
}
