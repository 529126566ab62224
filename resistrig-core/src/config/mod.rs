//! Configuration types
//!
//! Rig-wide tuning ([`RigConfig`]) is loaded once at start-up. Run
//! parameters ([`RunRequest`]) arrive from the operator and are validated
//! into an immutable [`PhaseConfig`] before any hardware is touched.

pub mod run;
pub mod types;

pub use run::*;
pub use types::*;
