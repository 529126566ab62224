//! Configuration loading
//!
//! The host reads `rig.toml`. Every section is optional and falls back to
//! the built-in defaults, so an empty file is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use resistrig_core::config::{
    BreakdownConfig, RangeConfig, RecorderConfig, RigConfig, SafetyConfig,
};
use resistrig_core::range::MeasurementRange;
use resistrig_drivers::sim::SimConfig;

use crate::error::HostError;

/// Run log settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory the per-run CSV files are written to
    pub dir: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("runs"),
        }
    }
}

/// UI link settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub enabled: bool,
    /// TCP listen address
    pub bind: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1:7878".into(),
        }
    }
}

/// Complete host configuration
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub safety: SafetyConfig,
    pub breakdown: BreakdownConfig,
    pub range: RangeConfig,
    pub recorder: RecorderConfig,
    pub log: LogConfig,
    pub link: LinkConfig,
    pub simulation: SimConfig,
}

impl HostConfig {
    /// Parse and validate a TOML document
    pub fn parse(text: &str) -> Result<Self, HostError> {
        let config: HostConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(HostError::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config = Self::parse(&text)?;
        info!("loaded config from {}", path.display());
        config.log_summary();
        Ok(config)
    }

    /// Scheduler configuration for the controller
    pub fn rig(&self) -> RigConfig {
        RigConfig {
            safety: self.safety,
            breakdown: self.breakdown,
            range: self.range,
            recorder: self.recorder,
        }
    }

    fn validate(&self) -> Result<(), HostError> {
        let periods = [
            ("safety.poll_interval_ms", self.safety.poll_interval_ms),
            ("breakdown.poll_interval_ms", self.breakdown.poll_interval_ms),
            ("range.poll_interval_ms", self.range.poll_interval_ms),
            ("recorder.interval_ms", self.recorder.interval_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(HostError::ConfigValue(format!("{name} must be non-zero")));
            }
        }
        if self.breakdown.voltage_deviation_pct == 0 || self.breakdown.voltage_deviation_pct > 100 {
            return Err(HostError::ConfigValue(
                "breakdown.voltage_deviation_pct must be 1-100".into(),
            ));
        }
        if self.breakdown.current_limit_pa <= 0.0 {
            return Err(HostError::ConfigValue(
                "breakdown.current_limit_pa must be positive".into(),
            ));
        }
        if MeasurementRange::fixed(self.range.guard_range.index()).is_none() {
            return Err(HostError::ConfigValue(
                "range.guard_range must be a fixed range (1-11)".into(),
            ));
        }
        if self.simulation.time_constant_ms <= 0.0 {
            return Err(HostError::ConfigValue(
                "simulation.time_constant_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    fn log_summary(&self) {
        debug!("  safety poll {} ms", self.safety.poll_interval_ms);
        debug!(
            "  breakdown poll {} ms, {} %, limit {} pA",
            self.breakdown.poll_interval_ms,
            self.breakdown.voltage_deviation_pct,
            self.breakdown.current_limit_pa
        );
        debug!(
            "  range poll {} ms, guard {:?} for {} ms",
            self.range.poll_interval_ms, self.range.guard_range, self.range.guard_window_ms
        );
        debug!("  recorder every {} ms", self.recorder.interval_ms);
        debug!("  run logs in {}", self.log.dir.display());
    }
}
