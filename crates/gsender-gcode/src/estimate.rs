//! Run-time estimation
//!
//! Sums move length over feed rate for every motion line. Rapids run at
//! the configured rapid rate, G93 moves take `1/F` minutes, `G4 P` dwells
//! add their seconds. Arcs are measured along their chord, and acceleration
//! is ignored, so the estimate is a lower bound on real machine time.

use crate::block::GcodeBlock;
use crate::bounds::PositionTracker;
use crate::modal::{FeedRateMode, ModalTracker, MotionMode};
use crate::program::Program;
use std::time::Duration;

/// Estimates program duration from geometry and feed rates
#[derive(Debug, Clone, Copy)]
pub struct TimeEstimator {
    rapid_rate: f64,
    default_feed_rate: f64,
}

impl TimeEstimator {
    /// Rates in mm/min
    pub fn new(rapid_rate: f64, default_feed_rate: f64) -> Self {
        Self {
            rapid_rate: rapid_rate.max(f64::EPSILON),
            default_feed_rate: default_feed_rate.max(f64::EPSILON),
        }
    }

    /// Estimated duration of `program`
    pub fn estimate(&self, program: &Program) -> Duration {
        self.estimate_blocks(program.lines().iter().map(|l| &l.block))
    }

    /// Estimated duration of a block sequence
    pub fn estimate_blocks<'a, I>(&self, blocks: I) -> Duration
    where
        I: IntoIterator<Item = &'a GcodeBlock>,
    {
        let mut modal = ModalTracker::new();
        let mut position = PositionTracker::new();
        let mut feed_rate = self.default_feed_rate;
        let mut minutes = 0.0;

        for block in blocks {
            modal.apply(block);
            let state = modal.snapshot();

            if block.has("G4") {
                if let Some(seconds) = block.get_f64("P") {
                    minutes += seconds.max(0.0) / 60.0;
                }
                continue;
            }

            let inverse_time = state.feedrate == Some(FeedRateMode::InverseTime);
            let block_feed = block.get_f64("F").filter(|f| *f > 0.0);
            if let Some(f) = block_feed {
                if !inverse_time {
                    feed_rate = state.effective_units().to_mm(f);
                }
            }

            let start = position.position();
            if position.apply(block, &state).is_empty() {
                continue;
            }
            let distance = position.distance_to(&start);

            let term = match state.motion {
                Some(MotionMode::Rapid) => distance / self.rapid_rate,
                Some(MotionMode::Cancel) => 0.0,
                _ if inverse_time => block_feed.map(|f| 1.0 / f).unwrap_or(0.0),
                _ => distance / feed_rate,
            };
            if term.is_finite() {
                minutes += term;
            } else {
                tracing::debug!("Skipping unmeasurable move: {}", block);
            }
        }

        Duration::try_from_secs_f64(minutes * 60.0).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(lines: &[&str]) -> f64 {
        let program = Program::from_lines("t", lines.iter().copied());
        TimeEstimator::new(6000.0, 600.0)
            .estimate(&program)
            .as_secs_f64()
    }

    #[test]
    fn test_linear_feed() {
        let secs = estimate(&["G21 G90", "G1 X10 F600"]);
        assert!((secs - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rapid_uses_rapid_rate() {
        let secs = estimate(&["G0 X100"]);
        assert!((secs - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dwell_and_inches() {
        let secs = estimate(&["G20 G1 X1 F25.4", "G4 P2"]);
        // 25.4 mm at 645.16 mm/min is 2.362 s, plus the dwell
        assert!((secs - (25.4 / 645.16 * 60.0 + 2.0)).abs() < 1e-6);
    }

    #[test]
    fn test_inverse_time() {
        let secs = estimate(&["G93 G1 X10 F2"]);
        assert!((secs - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_overflowing_words_do_not_panic() {
        let huge = "9".repeat(400);
        let secs = estimate(&["G1 X10 F600", format!("G1 X{} F100", huge).as_str()]);
        assert!((secs - 1.0).abs() < 1e-6);

        // Finite coordinates whose distance overflows
        let big = "9".repeat(300);
        let secs = estimate(&[format!("G1 X{0} Y{0} F600", big).as_str()]);
        assert_eq!(secs, 0.0);
    }

    #[test]
    fn test_no_motion_is_zero() {
        assert_eq!(estimate(&["M3 S1000", "M5"]), 0.0);
    }
}
