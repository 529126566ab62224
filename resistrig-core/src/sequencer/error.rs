//! Operator command errors

use crate::config::ConfigError;
use crate::traits::{HardwareError, RelayId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why a run could not be started
///
/// Nothing was switched or programmed when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StartError {
    /// Request failed validation
    Config(ConfigError),
    /// Another run is in progress
    AlreadyActive,
    /// A breakdown has not been acknowledged yet
    BreakdownPending,
    /// The rig shut down after an invariant violation; restart required
    Faulted,
    /// Not enough timer slots for the run
    SchedulerFull,
}

impl From<ConfigError> for StartError {
    fn from(e: ConfigError) -> Self {
        StartError::Config(e)
    }
}

/// Errors from commands addressed to a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RunError {
    /// No run is active
    NoActiveRun,
    /// The handle belongs to a run that already ended
    StaleHandle,
}

/// Errors from manual relay switching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ManualRelayError {
    /// Only allowed while a manual run is polarizing
    NotManualPhase,
    /// Only HV and GND may be switched by hand
    InvalidRelay(RelayId),
    /// HV cannot close while the safety circuit is open
    SafetyCircuitOpen,
    /// The relay write failed
    Hardware(HardwareError),
}

impl From<HardwareError> for ManualRelayError {
    fn from(e: HardwareError) -> Self {
        ManualRelayError::Hardware(e)
    }
}
