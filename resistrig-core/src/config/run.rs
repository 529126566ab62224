//! Run parameters
//!
//! A [`RunRequest`] is what the operator filled in; [`RunRequest::validate`]
//! turns it into a [`PhaseConfig`] or rejects it as a whole.

use heapless::{String, Vec};

use crate::state::Phase;
use crate::traits::SourceKind;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum run label length
pub const MAX_LABEL_LEN: usize = 32;

/// Measurement sequence type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MeasurementType {
    /// Short-circuit, polarize, depolarize
    #[default]
    Pdc,
    /// Short-circuit, polarize
    PolarizeOnly,
    /// Polarize until the operator aborts; relays switched by hand
    Manual,
}

impl MeasurementType {
    pub const fn as_str(self) -> &'static str {
        match self {
            MeasurementType::Pdc => "PDC",
            MeasurementType::PolarizeOnly => "P-only",
            MeasurementType::Manual => "Manual",
        }
    }
}

/// Phase timings referred to by validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Timing {
    /// Short-circuit duration
    T1,
    /// Polarization duration
    T2,
    /// Depolarization duration
    T3,
}

/// Run configuration errors
///
/// Returned before any hardware action; a rejected request changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConfigError {
    /// No voltage given
    MissingVoltage,
    /// Voltage of zero requested
    ZeroVoltage,
    /// Voltage outside the selected source's limits
    VoltageOutOfRange,
    /// Required timing not given
    MissingTiming(Timing),
    /// Timing given as zero seconds
    ZeroDuration(Timing),
}

/// Run parameters as entered by the operator
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunRequest {
    /// Free-form label, used to name the run log
    pub label: String<MAX_LABEL_LEN>,
    /// Measurement sequence type
    pub kind: MeasurementType,
    /// Source used during polarization
    pub source: SourceKind,
    /// Polarization voltage (V)
    pub voltage: Option<i32>,
    /// Short-circuit duration (s)
    pub t1_s: Option<u32>,
    /// Polarization duration (s)
    pub t2_s: Option<u32>,
    /// Depolarization duration (s), PDC only
    pub t3_s: Option<u32>,
}

impl RunRequest {
    /// Create a PDC request with all timings set
    pub fn pdc(source: SourceKind, voltage: i32, t1_s: u32, t2_s: u32, t3_s: u32) -> Self {
        Self {
            kind: MeasurementType::Pdc,
            source,
            voltage: Some(voltage),
            t1_s: Some(t1_s),
            t2_s: Some(t2_s),
            t3_s: Some(t3_s),
            ..Default::default()
        }
    }

    /// Create a polarize-only request
    pub fn polarize_only(source: SourceKind, voltage: i32, t1_s: u32, t2_s: u32) -> Self {
        Self {
            kind: MeasurementType::PolarizeOnly,
            source,
            voltage: Some(voltage),
            t1_s: Some(t1_s),
            t2_s: Some(t2_s),
            ..Default::default()
        }
    }

    /// Create a manual request
    pub fn manual(source: SourceKind, voltage: i32) -> Self {
        Self {
            kind: MeasurementType::Manual,
            source,
            voltage: Some(voltage),
            ..Default::default()
        }
    }

    /// Set the run label, truncating to [`MAX_LABEL_LEN`]
    pub fn with_label(mut self, label: &str) -> Self {
        self.label.clear();
        for c in label.chars() {
            if self.label.push(c).is_err() {
                break;
            }
        }
        self
    }

    /// Validate the request into an immutable phase configuration
    pub fn validate(&self) -> Result<PhaseConfig, ConfigError> {
        let voltage = self.voltage.ok_or(ConfigError::MissingVoltage)?;
        if voltage == 0 {
            return Err(ConfigError::ZeroVoltage);
        }
        let (min, max) = self.source.voltage_limits();
        if voltage < min || voltage > max {
            return Err(ConfigError::VoltageOutOfRange);
        }

        let (t1_s, t2_s, t3_s) = match self.kind {
            MeasurementType::Pdc => (
                Some(required(self.t1_s, Timing::T1)?),
                Some(required(self.t2_s, Timing::T2)?),
                Some(required(self.t3_s, Timing::T3)?),
            ),
            MeasurementType::PolarizeOnly => (
                Some(required(self.t1_s, Timing::T1)?),
                Some(required(self.t2_s, Timing::T2)?),
                None,
            ),
            MeasurementType::Manual => (None, None, None),
        };

        Ok(PhaseConfig {
            label: self.label.clone(),
            kind: self.kind,
            source: self.source,
            voltage,
            t1_s,
            t2_s,
            t3_s,
        })
    }
}

fn required(value: Option<u32>, timing: Timing) -> Result<u32, ConfigError> {
    match value {
        None => Err(ConfigError::MissingTiming(timing)),
        Some(0) => Err(ConfigError::ZeroDuration(timing)),
        Some(s) => Ok(s),
    }
}

/// Validated, immutable run configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhaseConfig {
    label: String<MAX_LABEL_LEN>,
    kind: MeasurementType,
    source: SourceKind,
    voltage: i32,
    t1_s: Option<u32>,
    t2_s: Option<u32>,
    t3_s: Option<u32>,
}

impl PhaseConfig {
    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    pub fn kind(&self) -> MeasurementType {
        self.kind
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn voltage(&self) -> i32 {
        self.voltage
    }

    pub fn timing_s(&self, timing: Timing) -> Option<u32> {
        match timing {
            Timing::T1 => self.t1_s,
            Timing::T2 => self.t2_s,
            Timing::T3 => self.t3_s,
        }
    }

    /// How long the sequencer dwells in a phase (ms), if it leaves it on its own
    pub fn dwell_ms(&self, phase: Phase) -> Option<u64> {
        if self.kind == MeasurementType::Manual {
            return None;
        }
        let seconds = match phase {
            Phase::ShortCircuit => self.t1_s,
            Phase::Polarize => self.t2_s,
            Phase::Depolarize => self.t3_s,
            _ => None,
        }?;
        Some(seconds as u64 * 1000)
    }

    /// Offsets from the run start of the scheduled relay-switching boundaries (ms)
    pub fn boundaries_ms(&self) -> Vec<u64, 2> {
        let mut boundaries = Vec::new();
        if let (Some(t1), Some(t2)) = (self.t1_s, self.t2_s) {
            let t1_ms = t1 as u64 * 1000;
            let _ = boundaries.push(t1_ms);
            let _ = boundaries.push(t1_ms + t2 as u64 * 1000);
        }
        boundaries
    }
}
