//! Shared rig state
//!
//! One owned [`SystemState`] is handed by reference to every component.
//! Relay and source writes go through it so the last commanded state and
//! the UI events never drift apart.

use super::{EventQueue, InvariantViolation, Phase, RigEvent};
use crate::range::MeasurementRange;
use crate::traits::{HardwareError, RelayId, RelayState, RelaySwitch, SourceKind, VoltageSource};

/// Last known state of every relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RelayBank([RelayState; 4]);

impl RelayBank {
    pub fn get(&self, id: RelayId) -> RelayState {
        self.0[id.index()]
    }

    pub fn set(&mut self, id: RelayId, state: RelayState) {
        self.0[id.index()] = state;
    }

    pub fn is_closed(&self, id: RelayId) -> bool {
        self.get(id).is_closed()
    }
}

/// Last commanded set-point of each source (V)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Setpoints([i32; 2]);

impl Setpoints {
    pub fn get(&self, source: SourceKind) -> i32 {
        self.0[source.index()]
    }

    pub fn set(&mut self, source: SourceKind, volts: i32) {
        self.0[source.index()] = volts;
    }

    /// The set-point the rig is currently polarizing with
    ///
    /// The HV amplifier wins when both are non-zero.
    pub fn active(&self) -> i32 {
        let hv = self.get(SourceKind::HvAmp);
        if hv != 0 {
            hv
        } else {
            self.get(SourceKind::Electrometer)
        }
    }
}

/// Rig state shared by the safety monitor, the detectors and the sequencer
#[derive(Debug, Default)]
pub struct SystemState {
    /// Last known relay states
    pub relays: RelayBank,
    /// Last commanded source voltages
    pub setpoints: Setpoints,
    /// Current run phase
    pub phase: Phase,
    /// Active meter range
    pub range: MeasurementRange,
    /// Latched invariant violation; no runs until restart
    pub fault: Option<InvariantViolation>,
    /// Events waiting for the UI
    pub events: EventQueue,
}

impl SystemState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: RigEvent) {
        self.events.push(event);
    }

    /// Drive a relay and record the result
    ///
    /// Errors are logged and returned; the caller decides whether the next
    /// tick's retry is enough.
    pub fn switch_relay<H: RelaySwitch + ?Sized>(
        &mut self,
        hw: &mut H,
        relay: RelayId,
        state: RelayState,
    ) -> Result<(), HardwareError> {
        match hw.set_relay(relay, state) {
            Ok(()) => {
                self.observe_relay(relay, state);
                Ok(())
            }
            Err(e) => {
                warn!("relay {:?} -> {:?} failed: {:?}", relay, state, e);
                Err(e)
            }
        }
    }

    /// Record a relay state seen on a live read
    pub fn observe_relay(&mut self, relay: RelayId, state: RelayState) {
        if self.relays.get(relay) != state {
            self.relays.set(relay, state);
            self.emit(RigEvent::RelayChanged { relay, state });
        }
    }

    /// Program a source voltage and record the set-point
    pub fn set_voltage<H: VoltageSource + ?Sized>(
        &mut self,
        hw: &mut H,
        source: SourceKind,
        volts: i32,
    ) -> Result<(), HardwareError> {
        match hw.set_voltage(source, volts) {
            Ok(()) => {
                self.setpoints.set(source, volts);
                Ok(())
            }
            Err(e) => {
                warn!("{:?} set to {} V failed: {:?}", source, volts, e);
                Err(e)
            }
        }
    }

    /// Drive the rig to its discharged state
    ///
    /// Zeroes both sources, opens HV, then closes GND. Every step is
    /// attempted even if an earlier one fails; returns whether all
    /// succeeded.
    pub fn de_energize<H>(&mut self, hw: &mut H) -> bool
    where
        H: RelaySwitch + VoltageSource + ?Sized,
    {
        let mut ok = true;
        for source in SourceKind::ALL {
            ok &= self.set_voltage(hw, source, 0).is_ok();
        }
        ok &= self.switch_relay(hw, RelayId::Hv, RelayState::Open).is_ok();
        ok &= self.switch_relay(hw, RelayId::Gnd, RelayState::Closed).is_ok();
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRig;

    #[test]
    fn test_switch_relay_emits_on_change_only() {
        let mut hw = MockRig::safe();
        let mut state = SystemState::new();

        state.switch_relay(&mut hw, RelayId::Gnd, RelayState::Closed).unwrap();
        state.switch_relay(&mut hw, RelayId::Gnd, RelayState::Closed).unwrap();

        assert_eq!(
            state.events.pop(),
            Some(RigEvent::RelayChanged {
                relay: RelayId::Gnd,
                state: RelayState::Closed
            })
        );
        assert!(state.events.is_empty());
        assert_eq!(hw.relay_writes(RelayId::Gnd), 2);
    }

    #[test]
    fn test_failed_write_keeps_bank() {
        let mut hw = MockRig::safe();
        hw.fail_writes = true;
        let mut state = SystemState::new();

        assert!(state
            .switch_relay(&mut hw, RelayId::Hv, RelayState::Closed)
            .is_err());
        assert_eq!(state.relays.get(RelayId::Hv), RelayState::Open);
        assert!(state.events.is_empty());
    }

    #[test]
    fn test_de_energize() {
        let mut hw = MockRig::safe();
        hw.relays.set(RelayId::Hv, RelayState::Closed);
        hw.voltages = [1000, 50];
        let mut state = SystemState::new();
        state.relays.set(RelayId::Hv, RelayState::Closed);
        state.setpoints.set(SourceKind::HvAmp, 1000);

        assert!(state.de_energize(&mut hw));
        assert_eq!(hw.voltages, [0, 0]);
        assert_eq!(hw.relays.get(RelayId::Hv), RelayState::Open);
        assert_eq!(hw.relays.get(RelayId::Gnd), RelayState::Closed);
        assert_eq!(state.setpoints.active(), 0);
    }

    #[test]
    fn test_active_setpoint_prefers_hv_amp() {
        let mut setpoints = Setpoints::default();
        setpoints.set(SourceKind::Electrometer, -200);
        assert_eq!(setpoints.active(), -200);
        setpoints.set(SourceKind::HvAmp, 800);
        assert_eq!(setpoints.active(), 800);
    }
}
