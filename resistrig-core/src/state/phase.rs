//! Measurement phase definition
//!
//! Relay and source actions are a function of the phase being entered;
//! the sequencer performs them, this module only decides where to go.

use crate::config::MeasurementType;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Measurement phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Phase {
    /// No run active; configuration is validated on start
    #[default]
    Setup,
    /// Sample shorted to ground to discharge it
    ShortCircuit,
    /// Sample under voltage
    Polarize,
    /// Source removed, sample shorted, depolarization current recorded
    Depolarize,
    /// Sequence completed
    Finished,
    /// Sequence cut short by operator, breakdown or safety
    Aborted,
}

/// Events that drive phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhaseEvent {
    /// Validated run started
    Start(MeasurementType),
    /// The current phase's dwell time elapsed
    Elapsed(MeasurementType),
    /// Run aborted
    Abort,
    /// Terminal state acknowledged, back to idle
    Reset,
}

impl Phase {
    /// Whether a run is in progress
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Phase::ShortCircuit | Phase::Polarize | Phase::Depolarize
        )
    }

    /// Whether this phase ends a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Finished | Phase::Aborted)
    }

    /// Whether the selected source is allowed to be energized
    pub fn energized(&self) -> bool {
        matches!(self, Phase::Polarize)
    }

    /// Process an event and return the next phase
    pub fn transition(self, event: PhaseEvent) -> Self {
        use MeasurementType::*;
        use Phase::*;
        use PhaseEvent::*;

        match (self, event) {
            (Setup, Start(Manual)) => Polarize,
            (Setup, Start(_)) => ShortCircuit,

            (ShortCircuit, Elapsed(Manual)) => ShortCircuit,
            (ShortCircuit, Elapsed(_)) => Polarize,

            // Manual runs never leave polarization on their own
            (Polarize, Elapsed(Manual)) => Polarize,
            (Polarize, Elapsed(PolarizeOnly)) => Finished,
            (Polarize, Elapsed(Pdc)) => Depolarize,

            (Depolarize, Elapsed(Pdc)) => Finished,

            (ShortCircuit | Polarize | Depolarize, Abort) => Aborted,

            (Finished | Aborted, Reset) => Setup,

            // Default: stay in current phase
            _ => self,
        }
    }
}
