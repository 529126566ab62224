//! Rig configuration type definitions
//!
//! Every period, threshold and window used by the scheduler lives here so
//! the host can override them from its config file.

use crate::range::MeasurementRange;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Electrometer integration speed, recorded with every sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MeasurementSpeed {
    Quick,
    Normal,
    #[default]
    Stable,
}

impl MeasurementSpeed {
    pub const fn as_str(self) -> &'static str {
        match self {
            MeasurementSpeed::Quick => "quick",
            MeasurementSpeed::Normal => "normal",
            MeasurementSpeed::Stable => "stable",
        }
    }
}

/// Safety monitor configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SafetyConfig {
    /// Poll period (ms)
    pub poll_interval_ms: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
        }
    }
}

/// Breakdown detector configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BreakdownConfig {
    /// Poll period (ms)
    pub poll_interval_ms: u32,
    /// Allowed deviation of the probe voltage from the set-point (%)
    pub voltage_deviation_pct: u8,
    /// Set-points at or below this magnitude skip the voltage check (V)
    pub min_setpoint_v: i32,
    /// Current limit for either source (pA)
    pub current_limit_pa: f64,
}

impl Default for BreakdownConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            voltage_deviation_pct: 10,
            min_setpoint_v: 10,
            // 10 mA
            current_limit_pa: 1.0e10,
        }
    }
}

/// Auto-range configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RangeConfig {
    /// Poll period (ms)
    pub poll_interval_ms: u32,
    /// Look-ahead before a phase boundary in which the guard range is forced (ms)
    pub guard_window_ms: u32,
    /// Range held across phase boundaries
    pub guard_range: MeasurementRange,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            guard_window_ms: 5000,
            // 200 nA full scale
            guard_range: MeasurementRange::fixed(6).unwrap_or(MeasurementRange::TOP),
        }
    }
}

/// Recorder configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RecorderConfig {
    /// Sampling interval (ms)
    pub interval_ms: u32,
    /// Electrometer speed setting recorded with each sample
    pub speed: MeasurementSpeed,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            speed: MeasurementSpeed::Stable,
        }
    }
}

/// Complete scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RigConfig {
    pub safety: SafetyConfig,
    pub breakdown: BreakdownConfig,
    pub range: RangeConfig,
    pub recorder: RecorderConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RigConfig::default();
        assert_eq!(config.safety.poll_interval_ms, 500);
        assert_eq!(config.breakdown.poll_interval_ms, 2000);
        assert_eq!(config.breakdown.voltage_deviation_pct, 10);
        assert_eq!(config.recorder.interval_ms, 1000);
        assert_eq!(config.range.guard_range.index(), 6);
    }
}
