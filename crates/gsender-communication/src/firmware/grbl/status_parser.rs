//! GRBL status report parsing
//!
//! Reports look like `<Run|MPos:1.000,2.000,0.000|Bf:15,128|FS:500,0|Ov:100,100,100>`.
//! Fields are optional and appear in any order; unknown fields are ignored.
//! GRBL only includes `WCO` every few reports, so callers keep the last one
//! and pass it to [`StatusReport::work_position_with`].

use crate::firmware::override_manager::OverrideState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Controller state from the first status field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    Idle,
    Run,
    Hold,
    Jog,
    Alarm,
    Door,
    Check,
    Home,
    Sleep,
    /// grblHAL tool change
    Tool,
    Unknown(String),
}

impl MachineState {
    fn parse(name: &str) -> Self {
        match name {
            "Idle" => Self::Idle,
            "Run" => Self::Run,
            "Hold" => Self::Hold,
            "Jog" => Self::Jog,
            "Alarm" => Self::Alarm,
            "Door" => Self::Door,
            "Check" => Self::Check,
            "Home" => Self::Home,
            "Sleep" => Self::Sleep,
            "Tool" => Self::Tool,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Whether the machine is executing motion
    pub fn is_moving(&self) -> bool {
        matches!(self, Self::Run | Self::Jog | Self::Home)
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(name) => write!(f, "{}", name),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Axis position from MPos, WPos or WCO
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Rotary axis, when reported
    pub a: Option<f64>,
}

impl Position {
    /// Parse `x,y,z[,a]`
    pub fn parse(text: &str) -> Option<Self> {
        let coords = text
            .split(',')
            .map(|s| s.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        if coords.len() < 3 {
            return None;
        }
        Some(Self {
            x: coords[0],
            y: coords[1],
            z: coords[2],
            a: coords.get(3).copied(),
        })
    }

    /// `[x, y, z]`
    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    fn offset(self, other: Position, sign: f64) -> Self {
        Self {
            x: self.x + sign * other.x,
            y: self.y + sign * other.y,
            z: self.z + sign * other.z,
            a: match (self.a, other.a) {
                (Some(a), Some(b)) => Some(a + sign * b),
                (a, _) => a,
            },
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3},{:.3},{:.3}", self.x, self.y, self.z)?;
        if let Some(a) = self.a {
            write!(f, ",{:.3}", a)?;
        }
        Ok(())
    }
}

/// Planner and serial buffer availability (`Bf:`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferState {
    /// Free planner blocks
    pub planner_blocks: u16,
    /// Free receive buffer bytes
    pub rx_bytes: u16,
}

/// Parsed `<...>` status report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: MachineState,
    /// Sub-state after the colon, e.g. `Hold:1`
    pub sub_state: Option<u8>,
    pub machine_position: Option<Position>,
    pub work_position: Option<Position>,
    pub work_offset: Option<Position>,
    pub feed_rate: Option<f64>,
    pub spindle_speed: Option<f64>,
    pub buffer: Option<BufferState>,
    pub overrides: Option<OverrideState>,
    /// Line number currently executing (`Ln:`)
    pub line_number: Option<u32>,
    /// Triggered input pins (`Pn:`)
    pub pins: Option<String>,
}

impl StatusReport {
    /// Parse a full status line including the angle brackets
    pub fn parse(line: &str) -> Option<Self> {
        let body = line.trim().strip_prefix('<')?.strip_suffix('>')?;
        let mut fields = body.split('|');

        let state_field = fields.next()?;
        let (state_name, sub_state) = match state_field.split_once(':') {
            Some((name, sub)) => (name, sub.parse().ok()),
            None => (state_field, None),
        };

        let mut report = StatusReport {
            state: MachineState::parse(state_name),
            sub_state,
            machine_position: None,
            work_position: None,
            work_offset: None,
            feed_rate: None,
            spindle_speed: None,
            buffer: None,
            overrides: None,
            line_number: None,
            pins: None,
        };

        for field in fields {
            let Some((key, value)) = field.split_once(':') else {
                continue;
            };
            match key {
                "MPos" => report.machine_position = Position::parse(value),
                "WPos" => report.work_position = Position::parse(value),
                "WCO" => report.work_offset = Position::parse(value),
                "F" => report.feed_rate = value.parse().ok(),
                "FS" => {
                    let mut parts = value.split(',');
                    report.feed_rate = parts.next().and_then(|v| v.parse().ok());
                    report.spindle_speed = parts.next().and_then(|v| v.parse().ok());
                }
                "Bf" => {
                    let parts = parse_numbers::<u16>(value);
                    if let [planner_blocks, rx_bytes] = parts[..] {
                        report.buffer = Some(BufferState {
                            planner_blocks,
                            rx_bytes,
                        });
                    }
                }
                "Ov" => {
                    let parts = parse_numbers::<u16>(value);
                    if let [feed, rapid, spindle] = parts[..] {
                        report.overrides = Some(OverrideState {
                            feed,
                            rapid,
                            spindle,
                        });
                    }
                }
                "Ln" => report.line_number = value.parse().ok(),
                "Pn" => report.pins = Some(value.to_string()),
                _ => {}
            }
        }

        Some(report)
    }

    /// Work position, derived from MPos and `wco` when not reported directly
    pub fn work_position_with(&self, wco: Option<Position>) -> Option<Position> {
        self.work_position.or_else(|| {
            let offset = self.work_offset.or(wco)?;
            Some(self.machine_position?.offset(offset, -1.0))
        })
    }

    /// Machine position, derived from WPos and `wco` when not reported directly
    pub fn machine_position_with(&self, wco: Option<Position>) -> Option<Position> {
        self.machine_position.or_else(|| {
            let offset = self.work_offset.or(wco)?;
            Some(self.work_position?.offset(offset, 1.0))
        })
    }
}

fn parse_numbers<T: std::str::FromStr>(value: &str) -> Vec<T> {
    value.split(',').filter_map(|v| v.trim().parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_idle_report() {
        let report =
            StatusReport::parse("<Idle|MPos:1.000,2.000,-3.500|FS:0,0|WCO:1.000,1.000,0.000>")
                .unwrap();
        assert_eq!(report.state, MachineState::Idle);
        assert_eq!(report.machine_position.unwrap().to_array(), [1.0, 2.0, -3.5]);
        assert_eq!(report.feed_rate, Some(0.0));
        let wpos = report.work_position_with(None).unwrap();
        assert_eq!(wpos.to_array(), [0.0, 1.0, -3.5]);
    }

    #[test]
    fn test_parse_run_report_fields() {
        let report = StatusReport::parse(
            "<Run|WPos:10.000,0.000,1.000,90.000|Bf:15,124|Ln:42|FS:500,12000|Ov:120,50,100|Pn:XP>",
        )
        .unwrap();
        assert_eq!(report.state, MachineState::Run);
        assert!(report.state.is_moving());
        assert_eq!(report.work_position.unwrap().a, Some(90.0));
        assert_eq!(
            report.buffer,
            Some(BufferState {
                planner_blocks: 15,
                rx_bytes: 124
            })
        );
        assert_eq!(report.line_number, Some(42));
        assert_eq!(report.spindle_speed, Some(12000.0));
        assert_eq!(report.overrides.unwrap().feed, 120);
        assert_eq!(report.pins.as_deref(), Some("XP"));
    }

    #[test]
    fn test_sub_state() {
        let report = StatusReport::parse("<Hold:1|MPos:0,0,0>").unwrap();
        assert_eq!(report.state, MachineState::Hold);
        assert_eq!(report.sub_state, Some(1));
    }

    #[test]
    fn test_machine_position_from_cached_offset() {
        let report = StatusReport::parse("<Jog|WPos:5.000,5.000,0.000>").unwrap();
        let wco = Position::parse("10,20,-5");
        let mpos = report.machine_position_with(wco).unwrap();
        assert_eq!(mpos.to_array(), [15.0, 25.0, -5.0]);
    }

    #[test]
    fn test_rejects_non_status() {
        assert!(StatusReport::parse("ok").is_none());
        assert!(StatusReport::parse("<Idle").is_none());
    }

    #[test]
    fn test_unknown_state_is_kept() {
        let report = StatusReport::parse("<Bogus|MPos:0,0,0>").unwrap();
        assert_eq!(report.state, MachineState::Unknown("Bogus".to_string()));
        assert_eq!(report.state.to_string(), "Bogus");
    }

    #[test]
    fn test_position_display() {
        let position = Position::parse("1,2.5,-3").unwrap();
        assert_eq!(position.to_string(), "1.000,2.500,-3.000");
    }
}
