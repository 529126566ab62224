//! Cooperative control loop
//!
//! One thread owns the controller. It sleeps until the next scheduler
//! deadline or the next inbound message, whichever comes first, so timers
//! fire on time and commands are never queued behind a sleep.

use std::time::{Duration, Instant};

use crossbeam_channel::{after, select, Receiver, Sender};
use log::{debug, info, warn};

use resistrig_core::recorder::SampleSink;
use resistrig_core::state::RunId;
use resistrig_core::traits::HardwareDriver;
use resistrig_core::Controller;
use resistrig_drivers::sim::SimulatedRig;
use resistrig_protocol::{Accepted, OperatorCommand, Rejection, RigMessage};

/// Longest sleep when nothing is scheduled
const IDLE_WAIT: Duration = Duration::from_millis(500);

/// Driver whose notion of time follows the loop clock
pub trait Bench: HardwareDriver {
    fn advance_to(&mut self, _now_ms: u64) {}
}

impl Bench for SimulatedRig {
    fn advance_to(&mut self, now_ms: u64) {
        SimulatedRig::advance_to(self, now_ms);
    }
}

/// Messages into the control loop
#[derive(Debug)]
pub enum Inbound {
    /// Operator command; exactly one reply goes to `reply`
    Command {
        command: OperatorCommand,
        reply: Sender<RigMessage>,
    },
    /// Stream events and samples to this channel
    Subscribe(Sender<RigMessage>),
    /// Controlled shutdown
    Shutdown,
}

pub struct Runtime<D, S> {
    controller: Controller<D, S>,
    subscribers: Vec<Sender<RigMessage>>,
    last_sample: Option<(RunId, u32)>,
}

impl<D: Bench, S: SampleSink> Runtime<D, S> {
    pub fn new(controller: Controller<D, S>) -> Self {
        Self {
            controller,
            subscribers: Vec::new(),
            last_sample: None,
        }
    }

    pub fn controller(&self) -> &Controller<D, S> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller<D, S> {
        &mut self.controller
    }

    pub fn start(&mut self, now_ms: u64) {
        self.controller.driver_mut().advance_to(now_ms);
        self.controller.start(now_ms);
        self.step(now_ms);
    }

    /// Poll due tasks and publish what they produced
    pub fn step(&mut self, now_ms: u64) {
        self.controller.driver_mut().advance_to(now_ms);
        let dispatched = self.controller.poll(now_ms);
        if dispatched > 0 {
            debug!("t={} ms: {} tasks", now_ms, dispatched);
        }
        self.publish();
    }

    /// Handle one inbound message; returns `false` on shutdown
    pub fn handle(&mut self, inbound: Inbound, now_ms: u64) -> bool {
        self.step(now_ms);
        match inbound {
            Inbound::Command { command, reply } => {
                let result = execute(&mut self.controller, command);
                if let RigMessage::Rejected(rejection) = &result {
                    warn!("command rejected: {:?}", rejection);
                }
                let _ = reply.send(result);
                self.publish();
                true
            }
            Inbound::Subscribe(tx) => {
                self.subscribers.push(tx);
                true
            }
            Inbound::Shutdown => false,
        }
    }

    /// Run against the wall clock until shutdown or every sender is gone
    pub fn run(mut self, inbound: Receiver<Inbound>) -> Controller<D, S> {
        let epoch = Instant::now();
        let now = || epoch.elapsed().as_millis() as u64;

        self.start(now());
        info!("control loop running");
        loop {
            let wait = match self.controller.next_deadline() {
                Some(deadline) => Duration::from_millis(deadline.saturating_sub(now())),
                None => IDLE_WAIT,
            };
            select! {
                recv(inbound) -> message => match message {
                    Ok(message) => {
                        if !self.handle(message, now()) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(after(wait)) -> _ => {}
            }
            self.step(now());
        }

        self.controller.shutdown();
        self.publish();
        info!("control loop stopped");
        self.controller
    }

    fn publish(&mut self) {
        while let Some(event) = self.controller.pop_event() {
            info!("{:?}", event);
            self.broadcast(RigMessage::Event(event));
        }
        if let Some(sample) = self.controller.latest_sample().copied() {
            let key = (sample.run, sample.seq);
            if self.last_sample != Some(key) {
                self.last_sample = Some(key);
                self.broadcast(RigMessage::Sample(sample));
            }
        }
    }

    fn broadcast(&mut self, message: RigMessage) {
        self.subscribers.retain(|tx| tx.send(message.clone()).is_ok());
    }
}

/// Apply an operator command to the controller
pub fn execute<D: HardwareDriver, S: SampleSink>(
    controller: &mut Controller<D, S>,
    command: OperatorCommand,
) -> RigMessage {
    info!("command {:?}", command);
    let outcome = match command {
        OperatorCommand::StartRun(request) => controller
            .start_run(&request)
            .map(Accepted::RunStarted)
            .map_err(Rejection::Start),
        OperatorCommand::AbortRun(handle) => controller
            .abort_run(handle)
            .map(|_| Accepted::Done)
            .map_err(Rejection::Run),
        OperatorCommand::SetManualRelay { relay, state } => controller
            .set_manual_relay(relay, state)
            .map(|_| Accepted::Done)
            .map_err(Rejection::ManualRelay),
        OperatorCommand::AcknowledgeBreakdown => {
            if controller.acknowledge_breakdown() {
                Ok(Accepted::Done)
            } else {
                Err(Rejection::NoBreakdownPending)
            }
        }
        OperatorCommand::ArmSafetyCircuit => controller
            .arm_safety_circuit()
            .map(|_| Accepted::Done)
            .map_err(Rejection::SafetyCircuit),
        OperatorCommand::DisarmSafetyCircuit => controller
            .disarm_safety_circuit()
            .map(|_| Accepted::Done)
            .map_err(Rejection::SafetyCircuit),
        OperatorCommand::SetRangeMode(mode) => controller
            .set_range_mode(mode)
            .map(|_| Accepted::Done)
            .map_err(Rejection::Range),
    };
    match outcome {
        Ok(accepted) => RigMessage::Accepted(accepted),
        Err(rejection) => RigMessage::Rejected(rejection),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use resistrig_core::config::{RigConfig, RunRequest};
    use resistrig_core::recorder::NullSink;
    use resistrig_core::sequencer::{RunHandle, StartError};
    use resistrig_core::state::{Phase, RigEvent};
    use resistrig_core::traits::{RelayId, RelayState, SourceKind};

    fn runtime() -> Runtime<SimulatedRig, NullSink> {
        let controller = Controller::new(SimulatedRig::default(), NullSink, RigConfig::default());
        let mut runtime = Runtime::new(controller);
        runtime.start(0);
        runtime
    }

    fn command(
        runtime: &mut Runtime<SimulatedRig, NullSink>,
        command: OperatorCommand,
        now_ms: u64,
    ) -> RigMessage {
        let (tx, rx) = unbounded();
        assert!(runtime.handle(Inbound::Command { command, reply: tx }, now_ms));
        rx.try_recv().unwrap()
    }

    #[test]
    fn test_start_run_through_commands() {
        let mut runtime = runtime();
        assert_eq!(
            command(&mut runtime, OperatorCommand::ArmSafetyCircuit, 100),
            RigMessage::Accepted(Accepted::Done)
        );
        let reply = command(
            &mut runtime,
            OperatorCommand::StartRun(RunRequest::pdc(SourceKind::HvAmp, 1000, 2, 2, 2)),
            200,
        );
        assert_eq!(
            reply,
            RigMessage::Accepted(Accepted::RunStarted(RunHandle { id: 1 }))
        );

        let again = command(
            &mut runtime,
            OperatorCommand::StartRun(RunRequest::manual(SourceKind::HvAmp, 10)),
            300,
        );
        assert_eq!(
            again,
            RigMessage::Rejected(Rejection::Start(StartError::AlreadyActive))
        );
    }

    #[test]
    fn test_subscribers_get_events_and_samples() {
        let mut runtime = runtime();
        let (tx, rx) = unbounded();
        runtime.handle(Inbound::Subscribe(tx), 0);
        command(&mut runtime, OperatorCommand::ArmSafetyCircuit, 0);
        command(
            &mut runtime,
            OperatorCommand::StartRun(RunRequest::pdc(SourceKind::HvAmp, 1000, 2, 2, 2)),
            0,
        );

        let mut t = 0;
        while t <= 8000 {
            runtime.step(t);
            t += 100;
        }
        assert_eq!(runtime.controller().phase(), Phase::Setup);

        let messages: Vec<RigMessage> = rx.try_iter().collect();
        assert!(messages
            .iter()
            .any(|m| matches!(m, RigMessage::Event(RigEvent::RunFinished { run: 1 }))));
        let samples = messages
            .iter()
            .filter(|m| matches!(m, RigMessage::Sample(_)))
            .count();
        assert!(samples >= 6);
    }

    #[test]
    fn test_rejections_are_replies() {
        let mut runtime = runtime();
        assert_eq!(
            command(&mut runtime, OperatorCommand::AcknowledgeBreakdown, 0),
            RigMessage::Rejected(Rejection::NoBreakdownPending)
        );
        assert!(matches!(
            command(
                &mut runtime,
                OperatorCommand::SetManualRelay {
                    relay: RelayId::Hv,
                    state: RelayState::Closed
                },
                0
            ),
            RigMessage::Rejected(Rejection::ManualRelay(_))
        ));
    }

    #[test]
    fn test_dropped_subscriber_is_forgotten() {
        let mut runtime = runtime();
        let (tx, rx) = unbounded();
        runtime.handle(Inbound::Subscribe(tx), 0);
        drop(rx);
        command(&mut runtime, OperatorCommand::ArmSafetyCircuit, 0);
        assert!(runtime.subscribers.is_empty());
    }

    #[test]
    fn test_run_loop_stops_on_shutdown() {
        let (tx, rx) = unbounded();
        tx.send(Inbound::Shutdown).unwrap();
        let controller = Controller::new(SimulatedRig::default(), NullSink, RigConfig::default());
        let controller = Runtime::new(controller).run(rx);
        for id in RelayId::ALL {
            assert_eq!(controller.driver().relay(id), RelayState::Open);
        }
    }
}
