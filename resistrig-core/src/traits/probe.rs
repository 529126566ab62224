//! Auxiliary probes sampled by the recorder

use super::HardwareError;

/// Trait for the HV probe and the climate sensors
pub trait MeasurementProbe {
    /// Voltage across the sample in volts, as seen by the HV probe
    fn read_voltage(&mut self) -> Result<f32, HardwareError>;

    /// Sample temperature in degrees Celsius
    fn read_temperature(&mut self) -> Result<f32, HardwareError>;

    /// Relative humidity in percent
    fn read_humidity(&mut self) -> Result<f32, HardwareError>;
}
