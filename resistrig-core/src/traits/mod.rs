//! Hardware capability traits
//!
//! These traits define the interface between the scheduling logic and the
//! instrument drivers. Each component depends only on the capabilities it
//! uses; [`HardwareDriver`] bundles all of them for the controller.

pub mod driver;
pub mod error;
pub mod input;
pub mod meter;
pub mod probe;
pub mod relay;
pub mod source;

pub use driver::{HardwareDriver, InstrumentLink};
pub use error::HardwareError;
pub use input::{DigitalInput, InterlockSwitch, SwitchState};
pub use meter::CurrentMeter;
pub use probe::MeasurementProbe;
pub use relay::{RelayId, RelayState, RelaySwitch};
pub use source::{SourceKind, VoltageSource};
