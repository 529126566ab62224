//! Current measurement

use super::{HardwareError, SourceKind};
use crate::range::MeasurementRange;

/// Trait for the current meter
///
/// Readings are in picoamps. A reading of exactly `0.0` is the meter's
/// overflow sentinel; see [`crate::range::Reading`].
pub trait CurrentMeter {
    /// Read the current flowing through a source, in pA
    fn read_current(&mut self, source: SourceKind) -> Result<f64, HardwareError>;

    /// Select the measurement range (index 0 selects the instrument's own auto mode)
    fn set_range(&mut self, range: MeasurementRange) -> Result<(), HardwareError>;

    /// Enable or disable the ammeter input
    fn set_input_enabled(&mut self, enabled: bool) -> Result<(), HardwareError>;
}
