//! Relay switching

use super::HardwareError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Relays on the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RelayId {
    /// Safety relay (enables the HV path, only with the interlock closed)
    Safety,
    /// Connects the selected source to the sample
    Hv,
    /// Shorts the sample electrodes to ground
    Gnd,
    /// Red/green signal lamp
    Lamp,
}

impl RelayId {
    /// All relays, in bank order
    pub const ALL: [RelayId; 4] = [RelayId::Safety, RelayId::Hv, RelayId::Gnd, RelayId::Lamp];

    /// Position in [`RelayId::ALL`]
    pub const fn index(self) -> usize {
        match self {
            RelayId::Safety => 0,
            RelayId::Hv => 1,
            RelayId::Gnd => 2,
            RelayId::Lamp => 3,
        }
    }
}

/// Relay contact state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RelayState {
    #[default]
    Open,
    Closed,
}

impl RelayState {
    pub const fn is_closed(self) -> bool {
        matches!(self, RelayState::Closed)
    }

    pub const fn from_closed(closed: bool) -> Self {
        if closed {
            RelayState::Closed
        } else {
            RelayState::Open
        }
    }
}

/// Trait for the relay bank
pub trait RelaySwitch {
    /// Drive a relay to the given state
    fn set_relay(&mut self, id: RelayId, state: RelayState) -> Result<(), HardwareError>;

    /// Read back the live state of a relay
    ///
    /// Takes `&mut self` because read-back usually goes over the DAQ link.
    fn relay_state(&mut self, id: RelayId) -> Result<RelayState, HardwareError>;
}
