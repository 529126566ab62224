//! Measurement phase sequencing
//!
//! The [`PhaseSequencer`] owns the run: it validates the request, arms the
//! recorder and the range controller, switches relays and sources on phase
//! entry, and schedules the phase timers. Safety and breakdown handling
//! pre-empt it through [`PhaseSequencer::abort`].

pub mod error;
pub mod phases;

pub use error::{ManualRelayError, RunError, StartError};
pub use phases::{PhaseSequencer, RunHandle};

use crate::scheduler::Scheduler;
use crate::state::SystemState;

/// Everything a sequencer call may touch
pub struct Context<'a, H: ?Sized, S: ?Sized> {
    pub hw: &'a mut H,
    pub sink: &'a mut S,
    pub state: &'a mut SystemState,
    pub scheduler: &'a mut Scheduler,
    pub now_ms: u64,
}
