//! Phase sequencer implementation

use super::{Context, ManualRelayError, RunError, StartError};
use crate::config::{MeasurementType, PhaseConfig, RangeConfig, RecorderConfig, RunRequest};
use crate::range::{MeasurementRange, RangeController, RangeMode};
use crate::recorder::{Recorder, Sample, SampleSink};
use crate::safety::Aggregate;
use crate::scheduler::{CancelHandle, Task, MAX_TIMERS};
use crate::state::{AbortReason, Phase, PhaseEvent, RigEvent, RunId};
use crate::traits::{HardwareDriver, HardwareError, RelayId, RelayState, SourceKind};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Timer slots a run needs on top of the always-on polls
const RUN_TIMERS: usize = 3;

/// Handle to an operator-started run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunHandle {
    pub id: RunId,
}

#[derive(Debug)]
struct ActiveRun {
    handle: RunHandle,
    config: PhaseConfig,
    started_ms: u64,
    phase_timer: Option<CancelHandle>,
    range_timer: Option<CancelHandle>,
    recorder_timer: Option<CancelHandle>,
}

impl ActiveRun {
    /// Offset from the run start at which `phase` ends, if it ends by itself
    fn phase_end_ms(&self, phase: Phase) -> Option<u64> {
        let dwell = |p| self.config.dwell_ms(p);
        match phase {
            Phase::ShortCircuit => dwell(Phase::ShortCircuit),
            Phase::Polarize => Some(dwell(Phase::ShortCircuit)? + dwell(Phase::Polarize)?),
            Phase::Depolarize => Some(
                dwell(Phase::ShortCircuit)? + dwell(Phase::Polarize)? + dwell(Phase::Depolarize)?,
            ),
            _ => None,
        }
    }
}

/// Run state machine driver
#[derive(Debug)]
pub struct PhaseSequencer {
    range: RangeController,
    recorder: Recorder,
    range_period_ms: u64,
    active: Option<ActiveRun>,
    next_run: RunId,
}

impl PhaseSequencer {
    pub fn new(range: RangeConfig, recorder: RecorderConfig) -> Self {
        Self {
            range: RangeController::new(range),
            recorder: Recorder::new(recorder),
            range_period_ms: range.poll_interval_ms as u64,
            active: None,
            next_run: 1,
        }
    }

    /// Handle of the run in progress
    pub fn active_run(&self) -> Option<RunHandle> {
        self.active.as_ref().map(|run| run.handle)
    }

    pub fn active_config(&self) -> Option<&PhaseConfig> {
        self.active.as_ref().map(|run| &run.config)
    }

    pub fn range_controller(&self) -> &RangeController {
        &self.range
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Select auto or manual ranging
    pub fn set_range_mode<H, S>(
        &mut self,
        ctx: &mut Context<'_, H, S>,
        mode: RangeMode,
    ) -> Result<(), HardwareError>
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        self.range.set_mode(ctx.hw, ctx.state, mode)
    }

    /// Validate a request and start the run
    ///
    /// Rejections leave the rig and any active run untouched.
    pub fn start<H, S>(
        &mut self,
        ctx: &mut Context<'_, H, S>,
        request: &RunRequest,
    ) -> Result<RunHandle, StartError>
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        if self.active.is_some() || ctx.state.phase != Phase::Setup {
            warn!("start rejected: a run is already active");
            return Err(StartError::AlreadyActive);
        }
        let config = request.validate()?;
        if MAX_TIMERS.saturating_sub(ctx.scheduler.len()) < RUN_TIMERS {
            return Err(StartError::SchedulerFull);
        }

        let handle = RunHandle { id: self.next_run };
        self.next_run = self.next_run.wrapping_add(1);
        info!(
            "run {} start: {} at {} V on {:?}",
            handle.id,
            config.kind().as_str(),
            config.voltage(),
            config.source()
        );

        if let Err(e) = ctx.hw.set_input_enabled(true) {
            warn!("meter input enable failed: {:?}", e);
        }
        self.recorder.arm(ctx.sink, handle.id, &config, ctx.now_ms);
        // A failed initial range write is logged by the range controller
        if let Err(e) = self
            .range
            .arm(ctx.hw, ctx.state, ctx.now_ms, &config.boundaries_ms())
        {
            debug!("run {} keeps range {:?}: {:?}", handle.id, ctx.state.range, e);
        }
        let recorder_timer = ctx
            .scheduler
            .schedule(self.recorder.interval_ms(), Task::RecorderTick)
            .ok();
        let range_timer = ctx
            .scheduler
            .schedule(self.range_period_ms, Task::RangeTick)
            .ok();

        let kind = config.kind();
        self.active = Some(ActiveRun {
            handle,
            config,
            started_ms: ctx.now_ms,
            phase_timer: None,
            range_timer,
            recorder_timer,
        });
        self.step(ctx, PhaseEvent::Start(kind));
        Ok(handle)
    }

    /// Operator abort of a specific run
    pub fn abort_run<H, S>(
        &mut self,
        ctx: &mut Context<'_, H, S>,
        handle: RunHandle,
    ) -> Result<(), RunError>
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        match self.active_run() {
            None => Err(RunError::NoActiveRun),
            Some(active) if active != handle => Err(RunError::StaleHandle),
            Some(_) => {
                self.abort_with(ctx, AbortReason::Operator);
                Ok(())
            }
        }
    }

    /// Abort whatever run is active; returns the aborted run
    pub fn abort<H, S>(
        &mut self,
        ctx: &mut Context<'_, H, S>,
        reason: AbortReason,
    ) -> Option<RunHandle>
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        let handle = self.active_run()?;
        self.abort_with(ctx, reason);
        Some(handle)
    }

    /// A phase timer fired
    ///
    /// Timers of runs or phases that are already over are ignored.
    pub fn on_phase_timer<H, S>(&mut self, ctx: &mut Context<'_, H, S>, run: RunId, phase: Phase)
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        let Some(active) = self.active.as_mut() else {
            trace!("phase timer for run {} after run end", run);
            return;
        };
        if active.handle.id != run || ctx.state.phase != phase {
            trace!("stale phase timer for run {} {:?}", run, phase);
            return;
        }
        active.phase_timer = None;
        let kind = active.config.kind();
        self.step(ctx, PhaseEvent::Elapsed(kind));
    }

    /// Range poll; returns the new range if it changed
    pub fn on_range_tick<H, S>(&mut self, ctx: &mut Context<'_, H, S>) -> Option<MeasurementRange>
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        self.active.as_ref()?;
        let timer = ctx
            .scheduler
            .schedule(self.range_period_ms, Task::RangeTick)
            .ok();
        if let Some(active) = self.active.as_mut() {
            active.range_timer = timer;
        }
        self.range
            .tick(ctx.hw, ctx.state, ctx.now_ms, self.recorder.latest_reading())
    }

    /// Recorder poll; returns the sample taken
    pub fn on_recorder_tick<H, S>(&mut self, ctx: &mut Context<'_, H, S>) -> Option<Sample>
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        self.active.as_ref()?;
        let timer = ctx
            .scheduler
            .schedule(self.recorder.interval_ms(), Task::RecorderTick)
            .ok();
        if let Some(active) = self.active.as_mut() {
            active.recorder_timer = timer;
        }
        self.recorder.sample(ctx.hw, ctx.sink, ctx.state, ctx.now_ms)
    }

    /// Switch HV or GND by hand during a manual run
    ///
    /// Closing one of the pair opens the other first; HV only closes with
    /// the safety circuit closed.
    pub fn set_manual_relay<H, S>(
        &mut self,
        ctx: &mut Context<'_, H, S>,
        relay: RelayId,
        target: RelayState,
    ) -> Result<(), ManualRelayError>
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        let manual = self
            .active
            .as_ref()
            .is_some_and(|run| run.config.kind() == MeasurementType::Manual);
        if !manual || ctx.state.phase != Phase::Polarize {
            return Err(ManualRelayError::NotManualPhase);
        }
        let partner = match relay {
            RelayId::Hv => RelayId::Gnd,
            RelayId::Gnd => RelayId::Hv,
            other => return Err(ManualRelayError::InvalidRelay(other)),
        };

        if target.is_closed() {
            if relay == RelayId::Hv && !Aggregate::read(ctx.hw)?.all_closed() {
                return Err(ManualRelayError::SafetyCircuitOpen);
            }
            ctx.state.switch_relay(ctx.hw, partner, RelayState::Open)?;
        }
        ctx.state.switch_relay(ctx.hw, relay, target)?;
        info!("manual relay {:?} -> {:?}", relay, target);
        Ok(())
    }

    fn step<H, S>(&mut self, ctx: &mut Context<'_, H, S>, event: PhaseEvent)
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        let Some(run) = self.active_run() else {
            return;
        };
        let from = ctx.state.phase;
        let to = from.transition(event);
        if to == from {
            return;
        }
        info!("run {} phase {:?} -> {:?}", run.id, from, to);
        ctx.state.phase = to;
        ctx.state.emit(RigEvent::PhaseChanged {
            run: run.id,
            from,
            to,
        });

        let entered = match to {
            Phase::ShortCircuit => self.enter_short_circuit(ctx),
            Phase::Polarize => self.enter_polarize(ctx),
            Phase::Depolarize => self.enter_depolarize(ctx),
            Phase::Finished => {
                self.conclude(ctx, None);
                Ok(())
            }
            Phase::Setup | Phase::Aborted => Ok(()),
        };
        if let Err(reason) = entered {
            self.abort_with(ctx, reason);
        }
    }

    fn enter_short_circuit<H, S>(&mut self, ctx: &mut Context<'_, H, S>) -> Result<(), AbortReason>
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        ctx.state
            .switch_relay(ctx.hw, RelayId::Hv, RelayState::Open)
            .map_err(|_| AbortReason::HardwareFault)?;
        ctx.state
            .switch_relay(ctx.hw, RelayId::Gnd, RelayState::Closed)
            .map_err(|_| AbortReason::HardwareFault)?;
        self.schedule_phase_end(ctx, Phase::ShortCircuit)
    }

    fn enter_polarize<H, S>(&mut self, ctx: &mut Context<'_, H, S>) -> Result<(), AbortReason>
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        let Some((source, voltage)) = self
            .active
            .as_ref()
            .map(|run| (run.config.source(), run.config.voltage()))
        else {
            return Ok(());
        };

        match Aggregate::read(ctx.hw) {
            Ok(aggregate) if aggregate.all_closed() => {}
            Ok(_) => {
                warn!("safety circuit not closed, refusing to polarize");
                return Err(AbortReason::SafetyCircuitOpen);
            }
            Err(e) => {
                warn!("safety circuit read failed: {:?}", e);
                return Err(AbortReason::HardwareFault);
            }
        }

        ctx.state
            .switch_relay(ctx.hw, RelayId::Gnd, RelayState::Open)
            .map_err(|_| AbortReason::HardwareFault)?;
        if source == SourceKind::Electrometer {
            ctx.hw
                .set_output_enabled(SourceKind::Electrometer, true)
                .map_err(|_| AbortReason::HardwareFault)?;
        }
        ctx.state
            .set_voltage(ctx.hw, source, voltage)
            .map_err(|_| AbortReason::HardwareFault)?;
        ctx.state
            .switch_relay(ctx.hw, RelayId::Hv, RelayState::Closed)
            .map_err(|_| AbortReason::HardwareFault)?;
        self.schedule_phase_end(ctx, Phase::Polarize)
    }

    fn enter_depolarize<H, S>(&mut self, ctx: &mut Context<'_, H, S>) -> Result<(), AbortReason>
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        if !ctx.state.de_energize(ctx.hw) {
            return Err(AbortReason::HardwareFault);
        }
        self.schedule_phase_end(ctx, Phase::Depolarize)
    }

    fn schedule_phase_end<H, S>(
        &mut self,
        ctx: &mut Context<'_, H, S>,
        phase: Phase,
    ) -> Result<(), AbortReason>
    where
        H: ?Sized,
        S: ?Sized,
    {
        let Some(run) = self.active.as_mut() else {
            return Ok(());
        };
        // Manual runs have no phase end
        let Some(offset) = run.phase_end_ms(phase) else {
            return Ok(());
        };
        let task = Task::PhaseTimer {
            run: run.handle.id,
            phase,
        };
        match ctx.scheduler.schedule_at(run.started_ms + offset, task) {
            Ok(timer) => {
                run.phase_timer = Some(timer);
                Ok(())
            }
            Err(_) => {
                error!("no timer slot for the end of {:?}", phase);
                Err(AbortReason::TimerUnavailable)
            }
        }
    }

    fn abort_with<H, S>(&mut self, ctx: &mut Context<'_, H, S>, reason: AbortReason)
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        let Some(run) = self.active_run() else {
            return;
        };
        warn!("run {} aborted: {:?}", run.id, reason);
        let from = ctx.state.phase;
        let to = from.transition(PhaseEvent::Abort);
        if to != from {
            ctx.state.phase = to;
            ctx.state.emit(RigEvent::PhaseChanged {
                run: run.id,
                from,
                to,
            });
        }
        self.conclude(ctx, Some(reason));
    }

    /// Common end of a run: stop everything, discharge, notify, reset
    fn conclude<H, S>(&mut self, ctx: &mut Context<'_, H, S>, reason: Option<AbortReason>)
    where
        H: HardwareDriver + ?Sized,
        S: SampleSink + ?Sized,
    {
        let Some(run) = self.active.take() else {
            return;
        };
        for timer in [run.phase_timer, run.range_timer, run.recorder_timer]
            .into_iter()
            .flatten()
        {
            ctx.scheduler.cancel(timer);
        }
        self.range.disarm();
        self.recorder.disarm(ctx.sink);

        if !ctx.state.de_energize(ctx.hw) {
            warn!("run {} end: discharge incomplete, safety tick will retry", run.handle.id);
        }
        if let Err(e) = ctx.hw.set_output_enabled(SourceKind::Electrometer, false) {
            warn!("electrometer output disable failed: {:?}", e);
        }

        let id = run.handle.id;
        match reason {
            None => {
                info!("run {} finished", id);
                ctx.state.emit(RigEvent::RunFinished { run: id });
            }
            Some(reason) => ctx.state.emit(RigEvent::RunAborted { run: id, reason }),
        }

        let from = ctx.state.phase;
        let to = from.transition(PhaseEvent::Reset);
        if to != from {
            ctx.state.phase = to;
            ctx.state.emit(RigEvent::PhaseChanged { run: id, from, to });
        }
    }
}

impl Default for PhaseSequencer {
    fn default() -> Self {
        Self::new(RangeConfig::default(), RecorderConfig::default())
    }
}
