//! Safety monitoring
//!
//! [`SafetyMonitor`] enforces the relay/interlock invariants from live
//! reads on every tick. [`BreakdownDetector`] watches the sample for
//! insulation failure. Both use [`StrikeCounter`]-style hysteresis where a
//! single reading must not be enough to act.

pub mod breakdown;
pub mod monitor;
pub mod strikes;

pub use breakdown::{BreakdownDetector, BreakdownEvent, BreakdownKind};
pub use monitor::{Aggregate, CircuitEdge, SafetyMonitor, SafetyReport};
pub use strikes::StrikeCounter;
