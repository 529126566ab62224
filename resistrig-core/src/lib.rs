//! Board-agnostic core logic for the resistivity test rig
//!
//! This crate contains the safety-interlocked measurement scheduler and
//! everything it needs that does not depend on concrete instruments:
//!
//! - Hardware capability traits (relays, interlock inputs, sources, meter, probes)
//! - Cooperative timer scheduler with cancellable handles
//! - Safety monitor (interlock/relay invariants, signal lamp, link recovery)
//! - Breakdown detection with two-strike hysteresis
//! - Current-meter auto-ranging
//! - PDC phase sequencer and recorder cadence
//! - The controller that owns the shared system state

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// This must go first so the logging macros are visible to every module.
#[macro_use]
mod fmt;

pub mod config;
pub mod controller;
pub mod range;
pub mod recorder;
pub mod safety;
pub mod scheduler;
pub mod sequencer;
pub mod state;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use controller::Controller;
