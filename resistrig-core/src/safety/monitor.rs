//! Safety monitor implementation
//!
//! Polls the interlock switches and the relay bank and enforces, in order:
//!
//! 1. An open interlock switch opens SAFETY and HV.
//! 2. While the circuit is not fully closed, HV is open and GND is closed.
//!    Checked every tick, not only on edges.
//! 3. The signal lamp is switched only on edges of the "all closed" state.
//! 4. On the falling edge, sources are zeroed and the electrometer output
//!    and input are disabled, once.
//! 5. After a link recovery every relay is opened.
//!
//! Every decision is made from live reads. Write errors are logged and the
//! next tick retries.

use crate::state::{InvariantViolation, RigEvent, SystemState};
use crate::traits::{
    HardwareDriver, HardwareError, InterlockSwitch, RelayId, RelayState, RelaySwitch, SourceKind,
    SwitchState,
};

/// Lamp relay state that shows red (HV possible)
pub const LAMP_RED: RelayState = RelayState::Closed;
/// Lamp relay state that shows green (safe to open the enclosure)
pub const LAMP_GREEN: RelayState = RelayState::Open;

/// Snapshot of the safety-relevant inputs and relays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Aggregate {
    pub s1: SwitchState,
    pub s2: SwitchState,
    pub safety: RelayState,
    pub hv: RelayState,
    pub gnd: RelayState,
    pub lamp_is_red: bool,
}

impl Aggregate {
    /// Read everything from the hardware
    pub fn read<H: HardwareDriver + ?Sized>(hw: &mut H) -> Result<Self, HardwareError> {
        Ok(Self {
            s1: hw.read_switch(InterlockSwitch::S1)?,
            s2: hw.read_switch(InterlockSwitch::S2)?,
            safety: hw.relay_state(RelayId::Safety)?,
            hv: hw.relay_state(RelayId::Hv)?,
            gnd: hw.relay_state(RelayId::Gnd)?,
            lamp_is_red: hw.relay_state(RelayId::Lamp)? == LAMP_RED,
        })
    }

    pub fn interlock_closed(&self) -> bool {
        self.s1.is_closed() && self.s2.is_closed()
    }

    /// S1, S2 and SAFETY all closed
    pub fn all_closed(&self) -> bool {
        self.interlock_closed() && self.safety.is_closed()
    }
}

/// Edge of the "all closed" state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CircuitEdge {
    /// Circuit became fully closed
    Closed,
    /// Circuit was broken
    Opened,
}

/// Outcome of one safety tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SafetyReport {
    /// Circuit state after this tick's actions
    pub all_closed: bool,
    /// Edge seen on this tick, if any
    pub edge: Option<CircuitEdge>,
    /// The link came back on this tick and all relays were opened
    pub reconnected: bool,
    /// Invariant still broken after this tick's actions
    pub violation: Option<InvariantViolation>,
}

/// Interlock and relay invariant enforcement
#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    /// Circuit state at the last edge; `None` until the first tick
    previous_all_closed: Option<bool>,
    /// Lamp write still owed for the last edge
    lamp_pending: bool,
    /// Falling-edge reset still owed
    reset_pending: bool,
    /// Link state on the previous tick
    was_connected: bool,
}

impl Default for SafetyMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyMonitor {
    pub fn new() -> Self {
        Self {
            previous_all_closed: None,
            lamp_pending: false,
            reset_pending: false,
            was_connected: true,
        }
    }

    /// Circuit state as of the last tick
    pub fn all_closed(&self) -> Option<bool> {
        self.previous_all_closed
    }

    /// Run one safety poll
    pub fn tick<H: HardwareDriver + ?Sized>(
        &mut self,
        hw: &mut H,
        state: &mut SystemState,
    ) -> SafetyReport {
        let mut report = SafetyReport::default();
        let mut io_ok = true;

        let connected = hw.is_connected();
        if connected && !self.was_connected {
            info!("instrument link recovered, opening all relays");
            for relay in RelayId::ALL {
                io_ok &= state.switch_relay(hw, relay, RelayState::Open).is_ok();
            }
            self.previous_all_closed = None;
            report.reconnected = true;
        } else if !connected && self.was_connected {
            warn!("instrument link lost");
        }
        self.was_connected = connected;

        let s1 = read_switch(hw, InterlockSwitch::S1, &mut io_ok);
        let s2 = read_switch(hw, InterlockSwitch::S2, &mut io_ok);
        let interlock_closed = s1.is_closed() && s2.is_closed();

        let mut safety = read_relay(hw, state, RelayId::Safety, &mut io_ok);
        let mut hv = read_relay(hw, state, RelayId::Hv, &mut io_ok);
        let mut gnd = read_relay(hw, state, RelayId::Gnd, &mut io_ok);

        if !interlock_closed {
            ensure(hw, state, RelayId::Safety, RelayState::Open, &mut safety, &mut io_ok);
            ensure(hw, state, RelayId::Hv, RelayState::Open, &mut hv, &mut io_ok);
        }

        let all_closed = interlock_closed && safety == Some(RelayState::Closed);
        if !all_closed {
            ensure(hw, state, RelayId::Hv, RelayState::Open, &mut hv, &mut io_ok);
            ensure(hw, state, RelayId::Gnd, RelayState::Closed, &mut gnd, &mut io_ok);
        }

        if self.previous_all_closed != Some(all_closed) {
            let edge = if all_closed {
                CircuitEdge::Closed
            } else {
                CircuitEdge::Opened
            };
            info!("safety circuit edge: {:?}", edge);
            report.edge = Some(edge);
            self.previous_all_closed = Some(all_closed);
            self.lamp_pending = true;
            self.reset_pending = !all_closed;
            state.emit(RigEvent::SafetyCircuitChanged { all_closed });
        }

        if self.lamp_pending {
            let lamp = if all_closed { LAMP_RED } else { LAMP_GREEN };
            match state.switch_relay(hw, RelayId::Lamp, lamp) {
                Ok(()) => self.lamp_pending = false,
                Err(_) => io_ok = false,
            }
        }

        if self.reset_pending {
            if safe_reset(hw, state) {
                self.reset_pending = false;
            } else {
                io_ok = false;
            }
        }

        report.all_closed = all_closed;
        if io_ok {
            report.violation = verify(hw, state, interlock_closed);
            if let Some(violation) = report.violation {
                error!("safety invariant violated: {:?}", violation);
            }
        }
        report
    }
}

fn read_switch<H: HardwareDriver + ?Sized>(
    hw: &mut H,
    switch: InterlockSwitch,
    io_ok: &mut bool,
) -> SwitchState {
    match hw.read_switch(switch) {
        Ok(state) => state,
        Err(e) => {
            // Unknown counts as open
            warn!("interlock {:?} read failed: {:?}", switch, e);
            *io_ok = false;
            SwitchState::Open
        }
    }
}

fn read_relay<H: RelaySwitch + ?Sized>(
    hw: &mut H,
    state: &mut SystemState,
    relay: RelayId,
    io_ok: &mut bool,
) -> Option<RelayState> {
    match hw.relay_state(relay) {
        Ok(live) => {
            state.observe_relay(relay, live);
            Some(live)
        }
        Err(e) => {
            warn!("relay {:?} read failed: {:?}", relay, e);
            *io_ok = false;
            None
        }
    }
}

/// Write `target` unless the live read already shows it
fn ensure<H: RelaySwitch + ?Sized>(
    hw: &mut H,
    state: &mut SystemState,
    relay: RelayId,
    target: RelayState,
    live: &mut Option<RelayState>,
    io_ok: &mut bool,
) {
    if *live == Some(target) {
        return;
    }
    match state.switch_relay(hw, relay, target) {
        Ok(()) => *live = Some(target),
        Err(_) => *io_ok = false,
    }
}

fn safe_reset<H: HardwareDriver + ?Sized>(hw: &mut H, state: &mut SystemState) -> bool {
    info!("safety circuit opened, zeroing sources");
    let mut ok = true;
    for source in SourceKind::ALL {
        ok &= state.set_voltage(hw, source, 0).is_ok();
    }
    if let Err(e) = hw.set_output_enabled(SourceKind::Electrometer, false) {
        warn!("electrometer output disable failed: {:?}", e);
        ok = false;
    }
    if let Err(e) = hw.set_input_enabled(false) {
        warn!("electrometer input disable failed: {:?}", e);
        ok = false;
    }
    ok
}

/// Re-read the relays after this tick's actions
fn verify<H: HardwareDriver + ?Sized>(
    hw: &mut H,
    state: &mut SystemState,
    interlock_closed: bool,
) -> Option<InvariantViolation> {
    let safety = hw.relay_state(RelayId::Safety).ok()?;
    let hv = hw.relay_state(RelayId::Hv).ok()?;
    let gnd = hw.relay_state(RelayId::Gnd).ok()?;
    state.observe_relay(RelayId::Safety, safety);
    state.observe_relay(RelayId::Hv, hv);
    state.observe_relay(RelayId::Gnd, gnd);

    if hv.is_closed() && !safety.is_closed() {
        return Some(InvariantViolation::HvWithoutSafety);
    }
    if safety.is_closed() && !interlock_closed {
        return Some(InvariantViolation::SafetyWithInterlockOpen);
    }
    let all_closed = interlock_closed && safety.is_closed();
    if !all_closed && (hv.is_closed() || !gnd.is_closed()) {
        return Some(InvariantViolation::NotDischarged);
    }
    None
}
