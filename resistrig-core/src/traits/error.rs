//! Hardware I/O errors

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors reported by instrument drivers
///
/// All variants are transient from the scheduler's point of view: the
/// failing operation is logged and retried on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HardwareError {
    /// Instrument or DAQ link is down
    Disconnected,
    /// Write or command was not accepted
    WriteFailed,
    /// Read did not complete
    ReadFailed,
    /// Reply could not be interpreted
    InvalidResponse,
}
