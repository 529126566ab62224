//! GPIO relay board
//!
//! One output pin per relay. The relay coil driver may be active-high or
//! active-low; the pin's output register is the source of truth for the
//! relay state.

use embedded_hal::digital::{PinState, StatefulOutputPin};
use resistrig_core::traits::{HardwareError, RelayId, RelayState, RelaySwitch};

/// Four relays driven from GPIO pins
///
/// Pins are ordered SAFETY, HV, GND, LAMP.
pub struct GpioRelayBoard<P> {
    pins: [P; 4],
    /// If true, relay closed = pin LOW
    inverted: bool,
}

impl<P: StatefulOutputPin> GpioRelayBoard<P> {
    /// Create a relay board with every relay open
    ///
    /// # Arguments
    /// - `pins`: output pins for SAFETY, HV, GND and LAMP
    /// - `inverted`: if true, a relay is closed when its pin is LOW
    pub fn new(pins: [P; 4], inverted: bool) -> Result<Self, HardwareError> {
        let mut board = Self { pins, inverted };
        for id in RelayId::ALL {
            board.set_relay(id, RelayState::Open)?;
        }
        Ok(board)
    }

    /// Create a board with active-high relay drivers
    pub fn new_active_high(pins: [P; 4]) -> Result<Self, HardwareError> {
        Self::new(pins, false)
    }

    /// Create a board with active-low relay drivers
    pub fn new_active_low(pins: [P; 4]) -> Result<Self, HardwareError> {
        Self::new(pins, true)
    }

    /// Release the pins
    pub fn release(self) -> [P; 4] {
        self.pins
    }

    fn level(&self, state: RelayState) -> PinState {
        PinState::from(state.is_closed() != self.inverted)
    }
}

impl<P: StatefulOutputPin> RelaySwitch for GpioRelayBoard<P> {
    fn set_relay(&mut self, id: RelayId, state: RelayState) -> Result<(), HardwareError> {
        let level = self.level(state);
        self.pins[id.index()]
            .set_state(level)
            .map_err(|_| HardwareError::WriteFailed)
    }

    fn relay_state(&mut self, id: RelayId) -> Result<RelayState, HardwareError> {
        let high = self.pins[id.index()]
            .is_set_high()
            .map_err(|_| HardwareError::ReadFailed)?;
        Ok(RelayState::from_closed(high != self.inverted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorType, OutputPin};

    /// Mock GPIO output for testing
    #[derive(Default)]
    struct MockPin {
        high: bool,
        writes: usize,
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            self.writes += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.high = true;
            self.writes += 1;
            Ok(())
        }
    }

    impl StatefulOutputPin for MockPin {
        fn is_set_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high)
        }

        fn is_set_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high)
        }
    }

    fn pins() -> [MockPin; 4] {
        Default::default()
    }

    #[test]
    fn test_active_high_board() {
        let mut board = GpioRelayBoard::new_active_high(pins()).unwrap();

        // Initially open
        for id in RelayId::ALL {
            assert_eq!(board.relay_state(id), Ok(RelayState::Open));
        }

        board.set_relay(RelayId::Hv, RelayState::Closed).unwrap();
        assert_eq!(board.relay_state(RelayId::Hv), Ok(RelayState::Closed));
        assert!(board.pins[RelayId::Hv.index()].high);
        assert_eq!(board.relay_state(RelayId::Gnd), Ok(RelayState::Open));
    }

    #[test]
    fn test_active_low_board() {
        let mut board = GpioRelayBoard::new_active_low(pins()).unwrap();

        // Open relays hold their pins high
        assert!(board.pins.iter().all(|p| p.high));

        board.set_relay(RelayId::Safety, RelayState::Closed).unwrap();
        assert!(!board.pins[RelayId::Safety.index()].high);
        assert_eq!(board.relay_state(RelayId::Safety), Ok(RelayState::Closed));

        board.set_relay(RelayId::Safety, RelayState::Open).unwrap();
        assert_eq!(board.relay_state(RelayId::Safety), Ok(RelayState::Open));
    }

    #[test]
    fn test_release_returns_pins() {
        let board = GpioRelayBoard::new_active_high(pins()).unwrap();
        let pins = board.release();
        assert!(pins.iter().all(|p| p.writes == 1));
    }
}
