//! Run phase machine and shared system state
//!
//! The phase machine is explicit, finite and deterministic. All relay and
//! source writes go through [`SystemState`] so the last commanded state and
//! the resulting UI events stay in one place.

pub mod events;
pub mod phase;
pub mod system;

pub use events::{AbortReason, EventQueue, InvariantViolation, RigEvent, RunId};
pub use phase::{Phase, PhaseEvent};
pub use system::{RelayBank, Setpoints, SystemState};
