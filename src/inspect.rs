//! Program summaries for the `inspect` command

use gsender_core::MachineSettings;
use gsender_gcode::{Axis, BoundingBox, ModalTracker, PositionTracker, Program, TimeEstimator};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// What a program will do, computed without a controller
#[derive(Debug, Clone, Serialize)]
pub struct ProgramSummary {
    pub name: String,
    pub lines: usize,
    pub size: usize,
    pub tool_changes: usize,
    pub rotary: bool,
    pub bounds: BoundingBox,
    #[serde(with = "seconds")]
    pub estimated_time: Duration,
}

impl ProgramSummary {
    pub fn new(program: &Program, machine: &MachineSettings) -> Self {
        let mut modal = ModalTracker::new();
        let mut position = PositionTracker::new();
        let mut bounds = BoundingBox::new();
        for line in program.lines() {
            modal.apply(&line.block);
            let touched = position.apply(&line.block, &modal.snapshot());
            if line.block.is_simple_motion() || line.block.has("G2") || line.block.has("G3") {
                let current = position.position();
                for axis in touched {
                    bounds.extend(axis, current[axis.index()]);
                }
            }
        }

        Self {
            name: program.name().to_string(),
            lines: program.len(),
            size: program.size(),
            tool_changes: program.tool_change_count(),
            rotary: program.is_rotary(),
            bounds,
            estimated_time: TimeEstimator::new(machine.rapid_rate, machine.default_feed_rate)
                .estimate(program),
        }
    }
}

impl fmt::Display for ProgramSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Program:       {}", self.name)?;
        writeln!(f, "Lines:         {}", self.lines)?;
        writeln!(f, "Size:          {} bytes", self.size)?;
        writeln!(f, "Tool changes:  {}", self.tool_changes)?;
        writeln!(f, "Rotary:        {}", if self.rotary { "yes" } else { "no" })?;
        let secs = self.estimated_time.as_secs();
        writeln!(
            f,
            "Estimated:     {:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        )?;
        for axis in Axis::ALL {
            if self.bounds.has_axis(axis) {
                writeln!(
                    f,
                    "{}:             {:.3} .. {:.3} mm",
                    axis,
                    self.bounds.min(axis),
                    self.bounds.max(axis)
                )?;
            }
        }
        Ok(())
    }
}

mod seconds {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let program = Program::parse(
            "part.nc",
            "G21 G90\nG0 X0 Y0\nG1 X10 Y20 F600 ; cut\nT2 M6\nG1 Z-1\n",
        );
        let summary = ProgramSummary::new(&program, &MachineSettings::default());
        assert_eq!(summary.lines, 5);
        assert_eq!(summary.tool_changes, 1);
        assert!(!summary.rotary);
        assert_eq!(summary.bounds.max(Axis::Y), 20.0);
        assert_eq!(summary.bounds.min(Axis::Z), -1.0);
        assert!(summary.estimated_time > Duration::ZERO);
        assert!(summary.to_string().contains("Tool changes:  1"));
    }
}
