//! Events raised to the UI layer

use heapless::Deque;

use super::Phase;
use crate::range::MeasurementRange;
use crate::safety::BreakdownEvent;
use crate::traits::{RelayId, RelayState};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of one operator-initiated run
pub type RunId = u32;

/// Maximum number of undelivered UI events
pub const EVENT_QUEUE_LEN: usize = 32;

/// Why a run ended early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AbortReason {
    /// Operator requested the abort
    Operator,
    /// Breakdown detector fired
    Breakdown,
    /// Interlock opened while the run was active
    InterlockOpened,
    /// Polarization was due but the safety circuit was not closed
    SafetyCircuitOpen,
    /// A relay needed for the next phase could not be switched
    HardwareFault,
    /// The safety monitor found a broken invariant
    InvariantViolation,
    /// No timer slot was free for the next phase
    TimerUnavailable,
}

/// Relay/interlock invariants that must hold after every safety tick
///
/// Seeing one of these means the relay bank does not follow commands;
/// the controller shuts everything down and refuses further runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InvariantViolation {
    /// HV closed while SAFETY is open
    HvWithoutSafety,
    /// SAFETY closed while an interlock switch is open
    SafetyWithInterlockOpen,
    /// Circuit not closed, but HV still closed or GND still open
    NotDischarged,
}

/// Events for the UI layer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RigEvent {
    /// Run moved to a new phase
    PhaseChanged { run: RunId, from: Phase, to: Phase },
    /// A relay changed state
    RelayChanged { relay: RelayId, state: RelayState },
    /// Safety circuit became fully closed (`true`) or was broken (`false`)
    SafetyCircuitChanged { all_closed: bool },
    /// Breakdown detected; the operator must acknowledge it
    Breakdown(BreakdownEvent),
    /// Run completed its last phase
    RunFinished { run: RunId },
    /// Run ended early
    RunAborted { run: RunId, reason: AbortReason },
    /// Meter range changed
    RangeChanged { range: MeasurementRange },
    /// Rig shut down after a broken invariant; restart required
    Fault(InvariantViolation),
}

/// Bounded UI event queue
///
/// When the consumer falls behind the oldest event is dropped, so the
/// newest state is always visible.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Deque<RigEvent, EVENT_QUEUE_LEN>,
    dropped: u32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
            dropped: 0,
        }
    }

    /// Queue an event, dropping the oldest if full
    pub fn push(&mut self, event: RigEvent) {
        if self.events.is_full() {
            self.events.pop_front();
            self.dropped = self.dropped.saturating_add(1);
            warn!("event queue full, dropped oldest event");
        }
        let _ = self.events.push_back(event);
    }

    /// Take the oldest event
    pub fn pop(&mut self) -> Option<RigEvent> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events lost to overflow since startup
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = &RigEvent> {
        self.events.iter()
    }
}
