//! Main controller coordinating safety, breakdown detection and the run
//!
//! The controller owns the driver, the sample sink, the shared
//! [`SystemState`] and the scheduler. The host calls [`Controller::poll`]
//! with a monotonic clock; everything else happens in dispatched tasks or
//! in the operator commands.

use crate::config::{RigConfig, RunRequest};
use crate::range::{MeasurementRange, RangeMode};
use crate::recorder::{Sample, SampleSink};
use crate::safety::{BreakdownDetector, BreakdownEvent, CircuitEdge, SafetyMonitor};
use crate::scheduler::{Scheduler, Task};
use crate::sequencer::{
    Context, ManualRelayError, PhaseSequencer, RunError, RunHandle, StartError,
};
use crate::state::{AbortReason, InvariantViolation, Phase, RigEvent, SystemState};
use crate::traits::{
    HardwareDriver, HardwareError, InterlockSwitch, RelayId, RelayState, SourceKind,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why the safety circuit could not be armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SafetyCircuitError {
    /// S1 or S2 is open
    InterlockOpen,
    /// The rig is shut down after an invariant violation
    Faulted,
    /// Switch read or relay write failed
    Hardware(HardwareError),
}

impl From<HardwareError> for SafetyCircuitError {
    fn from(e: HardwareError) -> Self {
        SafetyCircuitError::Hardware(e)
    }
}

/// Borrow the controller's parts as a sequencer context
macro_rules! context {
    ($c:ident) => {
        Context {
            now_ms: $c.scheduler.now_ms(),
            hw: &mut $c.hw,
            sink: &mut $c.sink,
            state: &mut $c.state,
            scheduler: &mut $c.scheduler,
        }
    };
}

/// Rig controller
pub struct Controller<D, S> {
    hw: D,
    sink: S,
    config: RigConfig,
    state: SystemState,
    scheduler: Scheduler,
    safety: SafetyMonitor,
    breakdown: BreakdownDetector,
    sequencer: PhaseSequencer,
    started: bool,
}

impl<D, S> Controller<D, S>
where
    D: HardwareDriver,
    S: SampleSink,
{
    pub fn new(hw: D, sink: S, config: RigConfig) -> Self {
        Self {
            hw,
            sink,
            config,
            state: SystemState::new(),
            scheduler: Scheduler::new(),
            safety: SafetyMonitor::new(),
            breakdown: BreakdownDetector::new(config.breakdown),
            sequencer: PhaseSequencer::new(config.range, config.recorder),
            started: false,
        }
    }

    /// Force every relay open and start the safety and breakdown polls
    ///
    /// Only the first call has any effect.
    pub fn start(&mut self, now_ms: u64) {
        if self.started {
            warn!("controller already started");
            return;
        }
        self.started = true;
        self.scheduler.advance(now_ms);
        info!("controller start, opening all relays");
        for relay in RelayId::ALL {
            let _ = self.state.switch_relay(&mut self.hw, relay, RelayState::Open);
        }
        self.schedule(0, Task::SafetyTick);
        self.schedule(self.config.breakdown.poll_interval_ms as u64, Task::BreakdownTick);
    }

    /// Dispatch every task due at `now_ms`; returns how many ran
    pub fn poll(&mut self, now_ms: u64) -> usize {
        self.scheduler.advance(now_ms);
        let mut dispatched = 0;
        while let Some(task) = self.scheduler.pop_due() {
            self.dispatch(task);
            dispatched += 1;
        }
        dispatched
    }

    /// When [`Controller::poll`] next has work
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    // Operator commands

    /// Validate and start a run
    pub fn start_run(&mut self, request: &RunRequest) -> Result<RunHandle, StartError> {
        if self.state.fault.is_some() {
            return Err(StartError::Faulted);
        }
        if self.breakdown.pending().is_some() {
            return Err(StartError::BreakdownPending);
        }
        let mut ctx = context!(self);
        self.sequencer.start(&mut ctx, request)
    }

    /// Abort the given run
    pub fn abort_run(&mut self, handle: RunHandle) -> Result<(), RunError> {
        let mut ctx = context!(self);
        self.sequencer.abort_run(&mut ctx, handle)
    }

    /// Switch HV or GND by hand during a manual run
    pub fn set_manual_relay(
        &mut self,
        relay: RelayId,
        state: RelayState,
    ) -> Result<(), ManualRelayError> {
        let mut ctx = context!(self);
        self.sequencer.set_manual_relay(&mut ctx, relay, state)
    }

    /// Clear a pending breakdown and resume breakdown polling
    ///
    /// Returns `false` if nothing was pending.
    pub fn acknowledge_breakdown(&mut self) -> bool {
        if !self.breakdown.acknowledge() {
            return false;
        }
        info!("breakdown acknowledged");
        self.schedule(self.config.breakdown.poll_interval_ms as u64, Task::BreakdownTick);
        true
    }

    /// Close the SAFETY relay if both interlock switches are closed
    pub fn arm_safety_circuit(&mut self) -> Result<(), SafetyCircuitError> {
        if self.state.fault.is_some() {
            return Err(SafetyCircuitError::Faulted);
        }
        let s1 = self.hw.read_switch(InterlockSwitch::S1)?;
        let s2 = self.hw.read_switch(InterlockSwitch::S2)?;
        if !(s1.is_closed() && s2.is_closed()) {
            warn!("safety circuit not armed: interlock open");
            return Err(SafetyCircuitError::InterlockOpen);
        }
        self.state
            .switch_relay(&mut self.hw, RelayId::Safety, RelayState::Closed)?;
        info!("safety circuit armed");
        self.on_safety_tick();
        Ok(())
    }

    /// Open the SAFETY relay; an active run is aborted
    pub fn disarm_safety_circuit(&mut self) -> Result<(), SafetyCircuitError> {
        let result = self
            .state
            .switch_relay(&mut self.hw, RelayId::Safety, RelayState::Open);
        info!("safety circuit disarmed");
        self.on_safety_tick();
        result.map_err(SafetyCircuitError::from)
    }

    /// Select auto or manual meter ranging
    pub fn set_range_mode(&mut self, mode: RangeMode) -> Result<(), HardwareError> {
        let mut ctx = context!(self);
        self.sequencer.set_range_mode(&mut ctx, mode)
    }

    /// Controlled shutdown: abort the run, stop every timer, zero and
    /// disable the sources and open every relay
    pub fn shutdown(&mut self) {
        info!("controller shutdown");
        let mut ctx = context!(self);
        self.sequencer.abort(&mut ctx, AbortReason::Operator);
        self.scheduler.cancel_all();
        self.power_down();
        for relay in RelayId::ALL {
            let _ = self.state.switch_relay(&mut self.hw, relay, RelayState::Open);
        }
    }

    // Observers

    /// Take the oldest undelivered UI event
    pub fn pop_event(&mut self) -> Option<RigEvent> {
        self.state.events.pop()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn active_run(&self) -> Option<RunHandle> {
        self.sequencer.active_run()
    }

    /// Most recent sample of the current or last run
    pub fn latest_sample(&self) -> Option<&Sample> {
        self.sequencer.recorder().latest()
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn range(&self) -> MeasurementRange {
        self.state.range
    }

    pub fn range_mode(&self) -> RangeMode {
        self.sequencer.range_controller().mode()
    }

    /// Latched invariant violation
    pub fn fault(&self) -> Option<InvariantViolation> {
        self.state.fault
    }

    /// Breakdown waiting for acknowledgement
    pub fn pending_breakdown(&self) -> Option<&BreakdownEvent> {
        self.breakdown.pending()
    }

    /// Safety circuit state as of the last safety tick
    pub fn safety_circuit_closed(&self) -> Option<bool> {
        self.safety.all_closed()
    }

    pub fn driver(&self) -> &D {
        &self.hw
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.hw
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn schedule(&mut self, delay_ms: u64, task: Task) {
        if self.scheduler.schedule(delay_ms, task).is_err() {
            error!("no timer slot for {:?}", task);
        }
    }

    fn dispatch(&mut self, task: Task) {
        match task {
            Task::SafetyTick => {
                self.on_safety_tick();
                self.schedule(self.config.safety.poll_interval_ms as u64, Task::SafetyTick);
            }
            Task::BreakdownTick => self.on_breakdown_tick(),
            Task::PhaseTimer { run, phase } => {
                let mut ctx = context!(self);
                self.sequencer.on_phase_timer(&mut ctx, run, phase);
            }
            Task::RangeTick => {
                let mut ctx = context!(self);
                self.sequencer.on_range_tick(&mut ctx);
            }
            Task::RecorderTick => {
                let mut ctx = context!(self);
                self.sequencer.on_recorder_tick(&mut ctx);
            }
        }
    }

    fn on_safety_tick(&mut self) {
        let report = self.safety.tick(&mut self.hw, &mut self.state);
        if let Some(violation) = report.violation {
            self.latch_fault(violation);
            return;
        }
        if report.edge == Some(CircuitEdge::Opened) {
            let mut ctx = context!(self);
            self.sequencer.abort(&mut ctx, AbortReason::InterlockOpened);
        }
    }

    fn on_breakdown_tick(&mut self) {
        let now_ms = self.scheduler.now_ms();
        if let Some(event) = self.breakdown.tick(&mut self.hw, &mut self.state, now_ms) {
            self.state.emit(RigEvent::Breakdown(event));
            let mut ctx = context!(self);
            self.sequencer.abort(&mut ctx, AbortReason::Breakdown);
        }
        // Polling resumes on acknowledgement
        if self.breakdown.pending().is_none() {
            self.schedule(self.config.breakdown.poll_interval_ms as u64, Task::BreakdownTick);
        }
    }

    fn latch_fault(&mut self, violation: InvariantViolation) {
        if self.state.fault.is_some() {
            return;
        }
        error!("invariant violation {:?}, shutting down until restart", violation);
        self.state.fault = Some(violation);
        self.state.emit(RigEvent::Fault(violation));

        let mut ctx = context!(self);
        self.sequencer.abort(&mut ctx, AbortReason::InvariantViolation);
        self.power_down();
        let _ = self
            .state
            .switch_relay(&mut self.hw, RelayId::Safety, RelayState::Open);
        let _ = self.state.de_energize(&mut self.hw);
    }

    /// Zero both sources and disable the electrometer output and input
    fn power_down(&mut self) {
        for source in SourceKind::ALL {
            let _ = self.state.set_voltage(&mut self.hw, source, 0);
        }
        if let Err(e) = self.hw.set_output_enabled(SourceKind::Electrometer, false) {
            warn!("electrometer output disable failed: {:?}", e);
        }
        if let Err(e) = self.hw.set_input_enabled(false) {
            warn!("electrometer input disable failed: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRig;
    use crate::recorder::NullSink;
    use crate::safety::Aggregate;
    use crate::traits::SwitchState;
    use proptest::prelude::*;

    type TestController = Controller<MockRig, NullSink>;

    /// Started controller with the safety circuit armed
    fn armed() -> TestController {
        let mut hw = MockRig::safe();
        hw.probe_voltage = 1000.0;
        let mut controller = Controller::new(hw, NullSink, RigConfig::default());
        controller.start(0);
        controller.poll(0);
        controller.arm_safety_circuit().unwrap();
        controller
    }

    fn drain(controller: &mut TestController) -> std::vec::Vec<RigEvent> {
        std::iter::from_fn(|| controller.pop_event()).collect()
    }

    fn relay(controller: &TestController, id: RelayId) -> RelayState {
        controller.driver().relays.get(id)
    }

    #[test]
    fn test_start_opens_relays_and_discharges() {
        let mut hw = MockRig::safe();
        for id in RelayId::ALL {
            hw.relays.set(id, RelayState::Closed);
        }
        let mut controller = Controller::new(hw, NullSink, RigConfig::default());
        controller.start(0);
        controller.poll(0);

        assert_eq!(relay(&controller, RelayId::Safety), RelayState::Open);
        assert_eq!(relay(&controller, RelayId::Hv), RelayState::Open);
        assert_eq!(relay(&controller, RelayId::Gnd), RelayState::Closed);
        assert_eq!(controller.safety_circuit_closed(), Some(false));
        assert_eq!(controller.next_deadline(), Some(500));
    }

    #[test]
    fn test_pdc_relay_trace() {
        let mut controller = armed();
        controller
            .start_run(&RunRequest::pdc(SourceKind::HvAmp, 1000, 5, 5, 5))
            .unwrap();

        let mut t = 0;
        while t <= 20_000 {
            controller.poll(t);
            let gnd = relay(&controller, RelayId::Gnd).is_closed();
            let hv = relay(&controller, RelayId::Hv).is_closed();
            match t {
                0..=4_999 => assert!(gnd && !hv, "t={t}"),
                5_000..=9_999 => assert!(!gnd && hv, "t={t}"),
                10_000..=14_999 => assert!(gnd && !hv, "t={t}"),
                _ => {
                    assert!(gnd && !hv, "t={t}");
                    assert_eq!(controller.driver().voltages, [0, 0], "t={t}");
                }
            }
            t += 100;
        }
        assert_eq!(controller.phase(), Phase::Setup);
        assert!(drain(&mut controller)
            .iter()
            .any(|e| matches!(e, RigEvent::RunFinished { .. })));
    }

    #[test]
    fn test_abort_from_polarize() {
        let mut controller = armed();
        let handle = controller
            .start_run(&RunRequest::pdc(SourceKind::HvAmp, 1000, 5, 5, 5))
            .unwrap();
        controller.poll(7000);
        assert_eq!(controller.phase(), Phase::Polarize);

        controller.abort_run(handle).unwrap();
        assert_eq!(controller.driver().voltages, [0, 0]);
        assert_eq!(relay(&controller, RelayId::Hv), RelayState::Open);
        assert_eq!(relay(&controller, RelayId::Gnd), RelayState::Closed);
        drain(&mut controller);

        let mut t = 7000;
        while t <= 30_000 {
            controller.poll(t);
            t += 250;
        }
        assert!(!drain(&mut controller)
            .iter()
            .any(|e| matches!(e, RigEvent::PhaseChanged { .. })));
    }

    #[test]
    fn test_start_while_active_leaves_run_alone() {
        let mut controller = armed();
        let handle = controller
            .start_run(&RunRequest::manual(SourceKind::HvAmp, 300))
            .unwrap();
        assert_eq!(
            controller.start_run(&RunRequest::pdc(SourceKind::HvAmp, 1000, 5, 5, 5)),
            Err(StartError::AlreadyActive)
        );
        assert_eq!(controller.active_run(), Some(handle));
        assert_eq!(controller.phase(), Phase::Polarize);
        assert_eq!(controller.driver().voltages, [300, 0]);
    }

    #[test]
    fn test_interlock_opening_aborts_run() {
        let mut controller = armed();
        let handle = controller
            .start_run(&RunRequest::pdc(SourceKind::HvAmp, 1000, 5, 5, 5))
            .unwrap();
        controller.poll(6000);
        assert_eq!(relay(&controller, RelayId::Hv), RelayState::Closed);

        controller
            .driver_mut()
            .set_switch(InterlockSwitch::S1, SwitchState::Open);
        controller.poll(6500);

        assert_eq!(relay(&controller, RelayId::Safety), RelayState::Open);
        assert_eq!(relay(&controller, RelayId::Hv), RelayState::Open);
        assert_eq!(relay(&controller, RelayId::Gnd), RelayState::Closed);
        assert_eq!(controller.phase(), Phase::Setup);
        assert!(drain(&mut controller).contains(&RigEvent::RunAborted {
            run: handle.id,
            reason: AbortReason::InterlockOpened
        }));
    }

    #[test]
    fn test_breakdown_blocks_until_acknowledged() {
        let mut controller = armed();
        let handle = controller
            .start_run(&RunRequest::manual(SourceKind::HvAmp, 1000))
            .unwrap();
        controller.driver_mut().probe_voltage = 700.0;
        controller.poll(2000);
        assert_eq!(controller.phase(), Phase::Polarize);
        controller.poll(4000);

        assert_eq!(controller.phase(), Phase::Setup);
        assert_eq!(controller.driver().voltages, [0, 0]);
        assert_eq!(relay(&controller, RelayId::Hv), RelayState::Open);
        let events = drain(&mut controller);
        assert!(events.iter().any(|e| matches!(e, RigEvent::Breakdown(_))));
        assert!(events.contains(&RigEvent::RunAborted {
            run: handle.id,
            reason: AbortReason::Breakdown
        }));

        assert_eq!(
            controller.start_run(&RunRequest::manual(SourceKind::HvAmp, 1000)),
            Err(StartError::BreakdownPending)
        );
        assert!(controller.acknowledge_breakdown());
        assert!(!controller.acknowledge_breakdown());
        controller.driver_mut().probe_voltage = 1000.0;
        assert!(controller
            .start_run(&RunRequest::manual(SourceKind::HvAmp, 1000))
            .is_ok());
    }

    #[test]
    fn test_arm_needs_closed_interlock() {
        let mut controller = armed();
        controller.disarm_safety_circuit().unwrap();
        controller
            .driver_mut()
            .set_switch(InterlockSwitch::S2, SwitchState::Open);
        assert_eq!(
            controller.arm_safety_circuit(),
            Err(SafetyCircuitError::InterlockOpen)
        );
        assert_eq!(relay(&controller, RelayId::Safety), RelayState::Open);
    }

    #[test]
    fn test_disarm_preempts_run() {
        let mut controller = armed();
        assert_eq!(controller.safety_circuit_closed(), Some(true));
        assert_eq!(relay(&controller, RelayId::Lamp), RelayState::Closed);
        let handle = controller
            .start_run(&RunRequest::manual(SourceKind::Electrometer, 100))
            .unwrap();

        controller.disarm_safety_circuit().unwrap();
        assert_eq!(controller.phase(), Phase::Setup);
        assert_eq!(relay(&controller, RelayId::Hv), RelayState::Open);
        assert_eq!(relay(&controller, RelayId::Lamp), RelayState::Open);
        assert!(drain(&mut controller).contains(&RigEvent::RunAborted {
            run: handle.id,
            reason: AbortReason::InterlockOpened
        }));
    }

    #[test]
    fn test_invariant_violation_latches_fault() {
        let mut controller = armed();
        controller.driver_mut().stuck = Some(RelayId::Safety);
        controller
            .driver_mut()
            .set_switch(InterlockSwitch::S1, SwitchState::Open);
        controller.poll(500);

        assert_eq!(
            controller.fault(),
            Some(InvariantViolation::SafetyWithInterlockOpen)
        );
        assert!(drain(&mut controller)
            .contains(&RigEvent::Fault(InvariantViolation::SafetyWithInterlockOpen)));
        assert_eq!(
            controller.start_run(&RunRequest::manual(SourceKind::HvAmp, 100)),
            Err(StartError::Faulted)
        );
        assert_eq!(
            controller.arm_safety_circuit(),
            Err(SafetyCircuitError::Faulted)
        );
        assert_eq!(relay(&controller, RelayId::Hv), RelayState::Open);
        assert_eq!(controller.driver().voltages, [0, 0]);
    }

    #[test]
    fn test_manual_relay_through_controller() {
        let mut controller = armed();
        controller
            .start_run(&RunRequest::manual(SourceKind::HvAmp, 200))
            .unwrap();
        controller
            .set_manual_relay(RelayId::Gnd, RelayState::Closed)
            .unwrap();
        assert_eq!(relay(&controller, RelayId::Hv), RelayState::Open);
        assert_eq!(relay(&controller, RelayId::Gnd), RelayState::Closed);
    }

    #[test]
    fn test_second_start_keeps_poll_rate() {
        let mut controller = armed();
        let pending = controller.scheduler.len();
        let writes = controller.driver().relay_writes(RelayId::Safety);

        controller.start(100);
        assert_eq!(controller.scheduler.len(), pending);
        assert_eq!(controller.driver().relay_writes(RelayId::Safety), writes);
        assert_eq!(relay(&controller, RelayId::Safety), RelayState::Closed);
    }

    #[test]
    fn test_hv_amp_run_ranges_on_electrometer() {
        let mut controller = armed();
        controller.driver_mut().currents = [1.0e6, 5.0];
        controller
            .start_run(&RunRequest::manual(SourceKind::HvAmp, 1000))
            .unwrap();

        let mut now = 0;
        while now < 60_000 {
            now += 500;
            controller.poll(now);
        }

        assert_eq!(controller.latest_sample().and_then(|s| s.current), Some(5.0));
        assert_eq!(controller.range(), MeasurementRange::new(2).unwrap());
        assert_eq!(controller.driver().range, MeasurementRange::new(2).unwrap());
        assert!(controller.active_run().is_some());
    }

    #[test]
    fn test_manual_range_mode() {
        let mut controller = armed();
        let three = MeasurementRange::new(3).unwrap();
        controller.set_range_mode(RangeMode::Manual(three)).unwrap();
        assert_eq!(controller.range(), three);
        assert_eq!(controller.range_mode(), RangeMode::Manual(three));
    }

    #[test]
    fn test_shutdown() {
        let mut controller = armed();
        controller
            .start_run(&RunRequest::manual(SourceKind::Electrometer, 400))
            .unwrap();
        controller.shutdown();

        for id in RelayId::ALL {
            assert_eq!(relay(&controller, id), RelayState::Open);
        }
        assert_eq!(controller.driver().voltages, [0, 0]);
        assert!(!controller.driver().input_enabled);
        assert!(!controller.driver().outputs[SourceKind::Electrometer.index()]);
        assert_eq!(controller.next_deadline(), None);
        assert_eq!(controller.active_run(), None);
    }

    #[derive(Debug, Clone)]
    enum Action {
        Switch(InterlockSwitch, bool),
        StartPdc,
        StartManual,
        Abort,
        Arm,
        Disarm,
        ManualHv,
        ManualGnd,
        Wait(u64),
    }

    fn action() -> impl Strategy<Value = Action> {
        prop_oneof![
            (any::<bool>(), any::<bool>()).prop_map(|(s1, closed)| Action::Switch(
                if s1 {
                    InterlockSwitch::S1
                } else {
                    InterlockSwitch::S2
                },
                closed
            )),
            Just(Action::StartPdc),
            Just(Action::StartManual),
            Just(Action::Abort),
            Just(Action::Arm),
            Just(Action::Disarm),
            Just(Action::ManualHv),
            Just(Action::ManualGnd),
            (1u64..3000).prop_map(Action::Wait),
        ]
    }

    proptest! {
        #[test]
        fn prop_relay_invariants_within_one_tick(
            actions in proptest::collection::vec(action(), 1..40)
        ) {
            let mut controller = armed();
            let mut now = 0u64;

            for action in actions {
                match action {
                    Action::Switch(switch, closed) => controller.driver_mut().set_switch(
                        switch,
                        if closed { SwitchState::Closed } else { SwitchState::Open },
                    ),
                    Action::StartPdc => {
                        let _ = controller
                            .start_run(&RunRequest::pdc(SourceKind::HvAmp, 1000, 1, 1, 1));
                    }
                    Action::StartManual => {
                        let _ = controller.start_run(&RunRequest::manual(SourceKind::HvAmp, 1000));
                    }
                    Action::Abort => {
                        if let Some(handle) = controller.active_run() {
                            let _ = controller.abort_run(handle);
                        }
                    }
                    Action::Arm => {
                        let _ = controller.arm_safety_circuit();
                    }
                    Action::Disarm => {
                        let _ = controller.disarm_safety_circuit();
                    }
                    Action::ManualHv => {
                        let _ = controller.set_manual_relay(RelayId::Hv, RelayState::Closed);
                    }
                    Action::ManualGnd => {
                        let _ = controller.set_manual_relay(RelayId::Gnd, RelayState::Closed);
                    }
                    Action::Wait(ms) => now += ms,
                }

                // One safety period later every invariant holds
                now += 500;
                controller.poll(now);
                let live = Aggregate::read(controller.driver_mut()).unwrap();
                if live.hv.is_closed() {
                    prop_assert!(live.safety.is_closed());
                    prop_assert!(!live.gnd.is_closed());
                }
                if live.safety.is_closed() {
                    prop_assert!(live.interlock_closed());
                }
                if !live.interlock_closed() {
                    prop_assert!(!live.hv.is_closed());
                    prop_assert!(live.gnd.is_closed());
                }
                prop_assert_eq!(controller.fault(), None);
            }
        }
    }
}
