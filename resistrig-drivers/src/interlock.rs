//! GPIO interlock inputs
//!
//! S1 and S2 are wired either normally-open or normally-closed depending on
//! the switch fitted, so the level that means "closed" is configured per
//! switch.

use embedded_hal::digital::InputPin;
use resistrig_core::traits::{DigitalInput, HardwareError, InterlockSwitch, SwitchState};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pin level that reads as a closed switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Polarity {
    /// Closed switch pulls the input high
    #[default]
    ClosedHigh,
    /// Closed switch pulls the input low
    ClosedLow,
}

impl Polarity {
    fn state(self, high: bool) -> SwitchState {
        let closed = match self {
            Polarity::ClosedHigh => high,
            Polarity::ClosedLow => !high,
        };
        if closed {
            SwitchState::Closed
        } else {
            SwitchState::Open
        }
    }
}

/// The two interlock switches
pub struct GpioInterlock<P> {
    s1: (P, Polarity),
    s2: (P, Polarity),
}

impl<P: InputPin> GpioInterlock<P> {
    pub fn new(s1: P, s1_polarity: Polarity, s2: P, s2_polarity: Polarity) -> Self {
        Self {
            s1: (s1, s1_polarity),
            s2: (s2, s2_polarity),
        }
    }
}

impl<P: InputPin> DigitalInput for GpioInterlock<P> {
    fn read_switch(&mut self, switch: InterlockSwitch) -> Result<SwitchState, HardwareError> {
        let (pin, polarity) = match switch {
            InterlockSwitch::S1 => &mut self.s1,
            InterlockSwitch::S2 => &mut self.s2,
        };
        let high = pin.is_high().map_err(|_| HardwareError::ReadFailed)?;
        Ok(polarity.state(high))
    }
}
