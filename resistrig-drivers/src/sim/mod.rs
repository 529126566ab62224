//! Simulated bench rig
//!
//! Implements every capability trait against an in-memory bench: four
//! relays, the two interlock switches, both sources, the electrometer and
//! a dielectric sample. The host runs against it until a vendor driver is
//! plugged in. Faults can be injected for bench testing.

pub mod model;

pub use model::{DielectricModel, SimConfig};

use resistrig_core::range::MeasurementRange;
use resistrig_core::traits::{
    CurrentMeter, DigitalInput, HardwareError, InstrumentLink, InterlockSwitch,
    MeasurementProbe, RelayId, RelayState, RelaySwitch, SourceKind, SwitchState, VoltageSource,
};

use crate::probe::{correct_probe_voltage, PROBE_VOLTS_PER_VOLT};

/// Current drawn per volt once the sample has broken down (pA/V)
const BREAKDOWN_PA_PER_V: f64 = 1.0e9;

/// Fraction of the set-point the probe sees across a broken sample
const BREAKDOWN_VOLTAGE_RATIO: f64 = 0.3;

/// In-memory rig
#[derive(Debug, Clone)]
pub struct SimulatedRig {
    now_ms: u64,
    relays: [RelayState; 4],
    switches: [SwitchState; 2],
    voltages: [i32; 2],
    electrometer_output: bool,
    input_enabled: bool,
    range: MeasurementRange,
    connected: bool,
    broken_down: bool,
    model: DielectricModel,
}

impl SimulatedRig {
    /// Bench with both interlock switches closed and every relay open
    pub fn new(config: SimConfig) -> Self {
        Self {
            now_ms: 0,
            relays: [RelayState::Open; 4],
            switches: [SwitchState::Closed; 2],
            voltages: [0; 2],
            electrometer_output: false,
            input_enabled: false,
            range: MeasurementRange::TOP,
            connected: true,
            broken_down: false,
            model: DielectricModel::new(config),
        }
    }

    /// Move the bench clock forward
    pub fn advance_to(&mut self, now_ms: u64) {
        if now_ms > self.now_ms {
            self.now_ms = now_ms;
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Open or close an interlock switch
    pub fn set_switch(&mut self, switch: InterlockSwitch, state: SwitchState) {
        self.switches[switch_index(switch)] = state;
    }

    /// Drop or restore the instrument link
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Make the sample break down; cleared by [`SimulatedRig::repair`]
    pub fn inject_breakdown(&mut self) {
        self.broken_down = true;
    }

    pub fn repair(&mut self) {
        self.broken_down = false;
    }

    pub fn relay(&self, id: RelayId) -> RelayState {
        self.relays[id.index()]
    }

    pub fn voltage(&self, source: SourceKind) -> i32 {
        self.voltages[source.index()]
    }

    pub fn range(&self) -> MeasurementRange {
        self.range
    }

    fn link(&self) -> Result<(), HardwareError> {
        if self.connected {
            Ok(())
        } else {
            Err(HardwareError::Disconnected)
        }
    }

    /// Source wired to the sample and the voltage it drives
    fn driving(&self) -> (SourceKind, i32) {
        let hv_amp = self.voltages[SourceKind::HvAmp.index()];
        let electrometer = self.voltages[SourceKind::Electrometer.index()];
        if hv_amp != 0 || !self.electrometer_output {
            (SourceKind::HvAmp, hv_amp)
        } else {
            (SourceKind::Electrometer, electrometer)
        }
    }

    /// Voltage across the sample
    fn applied_volts(&self) -> f64 {
        let energized = self.relay(RelayId::Safety).is_closed() && self.relay(RelayId::Hv).is_closed();
        if energized {
            self.driving().1 as f64
        } else {
            0.0
        }
    }

    fn refresh(&mut self) {
        let volts = self.applied_volts();
        self.model.apply(volts, self.now_ms);
    }

    fn sample_current(&self) -> f64 {
        let volts = self.applied_volts();
        if self.broken_down && volts != 0.0 {
            return volts * BREAKDOWN_PA_PER_V;
        }
        self.model
            .current_pa(self.now_ms, self.relay(RelayId::Gnd).is_closed())
    }
}

impl Default for SimulatedRig {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

fn switch_index(switch: InterlockSwitch) -> usize {
    match switch {
        InterlockSwitch::S1 => 0,
        InterlockSwitch::S2 => 1,
    }
}

impl RelaySwitch for SimulatedRig {
    fn set_relay(&mut self, id: RelayId, state: RelayState) -> Result<(), HardwareError> {
        self.relays[id.index()] = state;
        self.refresh();
        Ok(())
    }

    fn relay_state(&mut self, id: RelayId) -> Result<RelayState, HardwareError> {
        Ok(self.relays[id.index()])
    }
}

impl DigitalInput for SimulatedRig {
    fn read_switch(&mut self, switch: InterlockSwitch) -> Result<SwitchState, HardwareError> {
        Ok(self.switches[switch_index(switch)])
    }
}

impl VoltageSource for SimulatedRig {
    fn set_voltage(&mut self, source: SourceKind, volts: i32) -> Result<(), HardwareError> {
        self.link()?;
        let (min, max) = source.voltage_limits();
        if volts < min || volts > max {
            return Err(HardwareError::InvalidResponse);
        }
        self.voltages[source.index()] = volts;
        self.refresh();
        Ok(())
    }

    fn set_output_enabled(
        &mut self,
        source: SourceKind,
        enabled: bool,
    ) -> Result<(), HardwareError> {
        self.link()?;
        if source == SourceKind::Electrometer {
            self.electrometer_output = enabled;
            self.refresh();
        }
        Ok(())
    }
}

impl CurrentMeter for SimulatedRig {
    fn read_current(&mut self, _source: SourceKind) -> Result<f64, HardwareError> {
        self.link()?;
        if !self.input_enabled {
            return Ok(0.0);
        }
        let current = self.sample_current();
        // Saturated fixed range reads the overflow sentinel
        match self.range.ceiling_pa() {
            Some(ceiling) if current.abs() > ceiling => Ok(0.0),
            _ => Ok(current),
        }
    }

    fn set_range(&mut self, range: MeasurementRange) -> Result<(), HardwareError> {
        self.link()?;
        self.range = range;
        Ok(())
    }

    fn set_input_enabled(&mut self, enabled: bool) -> Result<(), HardwareError> {
        self.link()?;
        self.input_enabled = enabled;
        Ok(())
    }
}

impl MeasurementProbe for SimulatedRig {
    fn read_voltage(&mut self) -> Result<f32, HardwareError> {
        self.link()?;
        let mut volts = self.applied_volts();
        if self.broken_down {
            volts *= BREAKDOWN_VOLTAGE_RATIO;
        }
        let analog = (volts as f32) / PROBE_VOLTS_PER_VOLT;
        Ok(correct_probe_voltage(self.driving().0, analog))
    }

    fn read_temperature(&mut self) -> Result<f32, HardwareError> {
        self.link()?;
        Ok(self.model.config().temperature_c)
    }

    fn read_humidity(&mut self) -> Result<f32, HardwareError> {
        self.link()?;
        Ok(self.model.config().humidity_pct)
    }
}

impl InstrumentLink for SimulatedRig {
    fn is_connected(&mut self) -> bool {
        self.connected
    }
}
