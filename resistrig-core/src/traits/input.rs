//! Interlock inputs

use super::HardwareError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The two independent interlock switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InterlockSwitch {
    S1,
    S2,
}

/// Physical switch state, in "closed means safe" terms
///
/// The mapping from pin level to this state depends on the switch wiring
/// and belongs to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SwitchState {
    Closed,
    Open,
}

impl SwitchState {
    pub const fn is_closed(self) -> bool {
        matches!(self, SwitchState::Closed)
    }
}

/// Trait for reading the interlock switches
pub trait DigitalInput {
    /// Read the current state of an interlock switch
    fn read_switch(&mut self, switch: InterlockSwitch) -> Result<SwitchState, HardwareError>;
}
