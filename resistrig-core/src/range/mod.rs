//! Current-meter range selection
//!
//! Ranges are indexed 1..=11 with full-scale ceilings from 2 pA to 20 mA;
//! index 0 is the instrument's own auto-range sentinel.

pub mod controller;
pub mod ranges;

pub use controller::{RangeController, RangeMode};
pub use ranges::{magnitude, MeasurementRange, RangeOutOfBounds, Reading};
