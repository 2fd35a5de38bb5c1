//! Position accumulation and bounding boxes
//!
//! Positions are tracked in millimeters. Absolute words replace the axis
//! position; incremental (G91) words add to the last known position.

use crate::block::{Axis, GcodeBlock};
use crate::modal::{DistanceMode, Modal};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounds of the toolpath, in millimeters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum per axis, `+inf` until extended
    pub min: [f64; 3],
    /// Maximum per axis, `-inf` until extended
    pub max: [f64; 3],
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }
}

impl BoundingBox {
    /// Empty bounds
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow to include `value` on `axis`
    pub fn extend(&mut self, axis: Axis, value: f64) {
        let i = axis.index();
        self.min[i] = self.min[i].min(value);
        self.max[i] = self.max[i].max(value);
    }

    /// Whether `axis` has been extended at least once
    pub fn has_axis(&self, axis: Axis) -> bool {
        self.min[axis.index()] <= self.max[axis.index()]
    }

    /// Whether no axis has been extended
    pub fn is_empty(&self) -> bool {
        !Axis::ALL.into_iter().any(|axis| self.has_axis(axis))
    }

    /// Extent along `axis`, zero if untouched
    pub fn size(&self, axis: Axis) -> f64 {
        if self.has_axis(axis) {
            self.max[axis.index()] - self.min[axis.index()]
        } else {
            0.0
        }
    }

    /// Minimum for `axis`
    pub fn min(&self, axis: Axis) -> f64 {
        self.min[axis.index()]
    }

    /// Maximum for `axis`
    pub fn max(&self, axis: Axis) -> f64 {
        self.max[axis.index()]
    }
}

/// Last known tool position, in millimeters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionTracker {
    position: [f64; 3],
}

impl PositionTracker {
    /// Start at the origin
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position
    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    /// Move according to the axis words of `block` under `modal`.
    /// Returns the axes the block touched.
    pub fn apply(&mut self, block: &GcodeBlock, modal: &Modal) -> Vec<Axis> {
        let units = modal.effective_units();
        let incremental = modal.effective_distance() == DistanceMode::Incremental;
        let mut touched = Vec::new();
        for axis in block.get_axes() {
            if let Some(value) = block.axis_value(axis) {
                let value = units.to_mm(value);
                let i = axis.index();
                if incremental {
                    self.position[i] += value;
                } else {
                    self.position[i] = value;
                }
                touched.push(axis);
            }
        }
        touched
    }

    /// Straight-line distance to another position
    pub fn distance_to(&self, other: &[f64; 3]) -> f64 {
        self.position
            .iter()
            .zip(other.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Back to the origin
    pub fn reset(&mut self) {
        self.position = [0.0; 3];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modal::ModalTracker;

    #[test]
    fn test_empty_bounds() {
        let bounds = BoundingBox::new();
        assert!(bounds.is_empty());
        assert_eq!(bounds.min(Axis::X), f64::INFINITY);
        assert_eq!(bounds.max(Axis::X), f64::NEG_INFINITY);
        assert_eq!(bounds.size(Axis::Z), 0.0);
    }

    #[test]
    fn test_extend() {
        let mut bounds = BoundingBox::new();
        bounds.extend(Axis::X, 5.0);
        bounds.extend(Axis::X, -3.0);
        assert!(bounds.has_axis(Axis::X));
        assert!(!bounds.has_axis(Axis::Y));
        assert_eq!(bounds.size(Axis::X), 8.0);
    }

    #[test]
    fn test_incremental_accumulates() {
        let mut modal = ModalTracker::new();
        let mut tracker = PositionTracker::new();
        for line in ["G91", "G1 X10", "G1 X10 Y-5"] {
            let block = GcodeBlock::parse(line);
            modal.apply(&block);
            tracker.apply(&block, &modal.snapshot());
        }
        assert_eq!(tracker.position(), [20.0, -5.0, 0.0]);
    }

    #[test]
    fn test_inches_converted() {
        let mut modal = ModalTracker::new();
        let mut tracker = PositionTracker::new();
        let block = GcodeBlock::parse("G20 G0 X1");
        modal.apply(&block);
        let touched = tracker.apply(&block, &modal.snapshot());
        assert_eq!(touched, vec![Axis::X]);
        assert!((tracker.position()[0] - 25.4).abs() < 1e-9);
    }
}
