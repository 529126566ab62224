//! Mock rig driver shared by the unit tests

use std::vec::Vec;

use crate::range::MeasurementRange;
use crate::state::RelayBank;
use crate::traits::{
    CurrentMeter, DigitalInput, HardwareError, InstrumentLink, InterlockSwitch, MeasurementProbe,
    RelayId, RelayState, RelaySwitch, SourceKind, SwitchState, VoltageSource,
};

/// In-memory rig with write logging and fault switches
pub struct MockRig {
    pub relays: RelayBank,
    pub switches: [SwitchState; 2],
    pub voltages: [i32; 2],
    pub outputs: [bool; 2],
    pub input_enabled: bool,
    pub currents: [f64; 2],
    pub probe_voltage: f32,
    pub range: MeasurementRange,
    pub connected: bool,
    /// Every relay write fails
    pub fail_writes: bool,
    /// Every read fails
    pub fail_reads: bool,
    /// Range writes fail
    pub fail_range: bool,
    /// This relay accepts writes but never moves
    pub stuck: Option<RelayId>,
    pub relay_log: Vec<(RelayId, RelayState)>,
    pub voltage_log: Vec<(SourceKind, i32)>,
    pub range_log: Vec<MeasurementRange>,
}

impl MockRig {
    /// Interlock closed, all relays open, link up
    pub fn safe() -> Self {
        Self {
            relays: RelayBank::default(),
            switches: [SwitchState::Closed; 2],
            voltages: [0; 2],
            outputs: [false; 2],
            input_enabled: false,
            currents: [1.0; 2],
            probe_voltage: 0.0,
            range: MeasurementRange::TOP,
            connected: true,
            fail_writes: false,
            fail_reads: false,
            fail_range: false,
            stuck: None,
            relay_log: Vec::new(),
            voltage_log: Vec::new(),
            range_log: Vec::new(),
        }
    }

    pub fn set_switch(&mut self, switch: InterlockSwitch, state: SwitchState) {
        self.switches[switch as usize] = state;
    }

    pub fn relay_writes(&self, relay: RelayId) -> usize {
        self.relay_log.iter().filter(|(id, _)| *id == relay).count()
    }

    pub fn clear_logs(&mut self) {
        self.relay_log.clear();
        self.voltage_log.clear();
        self.range_log.clear();
    }
}

impl RelaySwitch for MockRig {
    fn set_relay(&mut self, id: RelayId, state: RelayState) -> Result<(), HardwareError> {
        if self.fail_writes || !self.connected {
            return Err(HardwareError::WriteFailed);
        }
        self.relay_log.push((id, state));
        if self.stuck != Some(id) {
            self.relays.set(id, state);
        }
        Ok(())
    }

    fn relay_state(&mut self, id: RelayId) -> Result<RelayState, HardwareError> {
        if self.fail_reads || !self.connected {
            return Err(HardwareError::ReadFailed);
        }
        Ok(self.relays.get(id))
    }
}

impl DigitalInput for MockRig {
    fn read_switch(&mut self, switch: InterlockSwitch) -> Result<SwitchState, HardwareError> {
        if self.fail_reads {
            return Err(HardwareError::ReadFailed);
        }
        Ok(self.switches[switch as usize])
    }
}

impl VoltageSource for MockRig {
    fn set_voltage(&mut self, source: SourceKind, volts: i32) -> Result<(), HardwareError> {
        if self.fail_writes || !self.connected {
            return Err(HardwareError::WriteFailed);
        }
        self.voltage_log.push((source, volts));
        self.voltages[source.index()] = volts;
        Ok(())
    }

    fn set_output_enabled(
        &mut self,
        source: SourceKind,
        enabled: bool,
    ) -> Result<(), HardwareError> {
        if self.fail_writes || !self.connected {
            return Err(HardwareError::WriteFailed);
        }
        self.outputs[source.index()] = enabled;
        Ok(())
    }
}

impl CurrentMeter for MockRig {
    fn read_current(&mut self, source: SourceKind) -> Result<f64, HardwareError> {
        if self.fail_reads || !self.connected {
            return Err(HardwareError::ReadFailed);
        }
        Ok(self.currents[source.index()])
    }

    fn set_range(&mut self, range: MeasurementRange) -> Result<(), HardwareError> {
        if self.fail_range || self.fail_writes || !self.connected {
            return Err(HardwareError::WriteFailed);
        }
        self.range_log.push(range);
        self.range = range;
        Ok(())
    }

    fn set_input_enabled(&mut self, enabled: bool) -> Result<(), HardwareError> {
        if self.fail_writes || !self.connected {
            return Err(HardwareError::WriteFailed);
        }
        self.input_enabled = enabled;
        Ok(())
    }
}

impl MeasurementProbe for MockRig {
    fn read_voltage(&mut self) -> Result<f32, HardwareError> {
        if self.fail_reads || !self.connected {
            return Err(HardwareError::ReadFailed);
        }
        Ok(self.probe_voltage)
    }

    fn read_temperature(&mut self) -> Result<f32, HardwareError> {
        if self.fail_reads || !self.connected {
            return Err(HardwareError::ReadFailed);
        }
        Ok(23.5)
    }

    fn read_humidity(&mut self) -> Result<f32, HardwareError> {
        if self.fail_reads || !self.connected {
            return Err(HardwareError::ReadFailed);
        }
        Ok(41.0)
    }
}

impl InstrumentLink for MockRig {
    fn is_connected(&mut self) -> bool {
        self.connected
    }
}
