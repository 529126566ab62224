//! Combined driver capability set

use super::{CurrentMeter, DigitalInput, MeasurementProbe, RelaySwitch, VoltageSource};

/// Trait for reporting the instrument link state
pub trait InstrumentLink {
    /// Whether the instrument/DAQ link is currently up
    fn is_connected(&mut self) -> bool;
}

/// Everything the controller needs from the hardware
///
/// Implemented automatically for any type providing all capabilities.
pub trait HardwareDriver:
    RelaySwitch + DigitalInput + VoltageSource + CurrentMeter + MeasurementProbe + InstrumentLink
{
}

impl<T> HardwareDriver for T where
    T: RelaySwitch + DigitalInput + VoltageSource + CurrentMeter + MeasurementProbe + InstrumentLink
{
}
