//! Voltage sources

use super::HardwareError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The two voltage sources on the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SourceKind {
    /// External high-voltage amplifier (0..=5000 V)
    #[default]
    HvAmp,
    /// Electrometer built-in source (-1000..=1000 V)
    Electrometer,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::HvAmp, SourceKind::Electrometer];

    /// Position in [`SourceKind::ALL`]
    pub const fn index(self) -> usize {
        match self {
            SourceKind::HvAmp => 0,
            SourceKind::Electrometer => 1,
        }
    }

    /// Inclusive set-point limits in volts
    pub const fn voltage_limits(self) -> (i32, i32) {
        match self {
            SourceKind::HvAmp => (0, 5000),
            SourceKind::Electrometer => (-1000, 1000),
        }
    }
}

/// Trait for programmable voltage sources
pub trait VoltageSource {
    /// Set the output voltage of a source
    fn set_voltage(&mut self, source: SourceKind, volts: i32) -> Result<(), HardwareError>;

    /// Enable or disable a source's output stage
    ///
    /// Sources without a separate output switch accept this as a no-op.
    fn set_output_enabled(&mut self, source: SourceKind, enabled: bool)
        -> Result<(), HardwareError>;
}
