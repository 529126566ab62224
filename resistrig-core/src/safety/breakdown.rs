//! Breakdown detection
//!
//! Two checks, each needing two consecutive anomalous ticks:
//!
//! - Voltage: with HV closed, the probe voltage deviates from the set-point
//!   by more than the configured percentage. Skipped for small set-points.
//! - Current: either source reads more than the current limit.
//!
//! On breakdown the rig is de-energized and the detector stays latched
//! until the operator acknowledges.

use crate::config::BreakdownConfig;
use crate::range::magnitude;
use crate::state::SystemState;
use crate::traits::{HardwareDriver, RelayId, SourceKind};

use super::StrikeCounter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which check fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BreakdownKind {
    Voltage,
    Current,
}

/// A detected breakdown
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BreakdownEvent {
    pub kind: BreakdownKind,
    /// Measured value on the second strike (V deviation or pA)
    pub measured: f64,
    /// Limit it exceeded, in the same unit
    pub limit: f64,
    /// Controller clock (ms)
    pub timestamp_ms: u64,
}

/// Breakdown detector
#[derive(Debug, Clone)]
pub struct BreakdownDetector {
    config: BreakdownConfig,
    voltage_strikes: StrikeCounter,
    current_strikes: StrikeCounter,
    awaiting_ack: Option<BreakdownEvent>,
}

impl BreakdownDetector {
    pub fn new(config: BreakdownConfig) -> Self {
        Self {
            config,
            voltage_strikes: StrikeCounter::new(),
            current_strikes: StrikeCounter::new(),
            awaiting_ack: None,
        }
    }

    pub fn config(&self) -> &BreakdownConfig {
        &self.config
    }

    /// Breakdown waiting for operator acknowledgement
    pub fn pending(&self) -> Option<&BreakdownEvent> {
        self.awaiting_ack.as_ref()
    }

    /// Clear a pending breakdown; returns whether one was pending
    pub fn acknowledge(&mut self) -> bool {
        self.voltage_strikes.clear();
        self.current_strikes.clear();
        self.awaiting_ack.take().is_some()
    }

    /// Voltage deviation and its limit, if the check applies at this set-point
    ///
    /// Returns `None` for set-points at or below the configured minimum.
    pub fn voltage_deviation(&self, setpoint_v: i32, measured_v: f64) -> Option<(f64, f64)> {
        let setpoint = setpoint_v as f64;
        if magnitude(setpoint) <= self.config.min_setpoint_v as f64 {
            return None;
        }
        let limit = magnitude(setpoint) * self.config.voltage_deviation_pct as f64 / 100.0;
        Some((magnitude(measured_v - setpoint), limit))
    }

    /// Run one detection poll
    ///
    /// Returns the breakdown on the tick it is confirmed. While a breakdown
    /// is pending nothing is read.
    pub fn tick<H: HardwareDriver + ?Sized>(
        &mut self,
        hw: &mut H,
        state: &mut SystemState,
        now_ms: u64,
    ) -> Option<BreakdownEvent> {
        if self.awaiting_ack.is_some() {
            return None;
        }

        let event = self
            .check_voltage(hw, state, now_ms)
            .or_else(|| self.check_current(hw, now_ms))?;

        error!(
            "breakdown ({:?}): measured {} limit {}",
            event.kind, event.measured, event.limit
        );
        if !state.de_energize(hw) {
            warn!("de-energize after breakdown incomplete, safety tick will retry");
        }
        self.voltage_strikes.clear();
        self.current_strikes.clear();
        self.awaiting_ack = Some(event);
        Some(event)
    }

    fn check_voltage<H: HardwareDriver + ?Sized>(
        &mut self,
        hw: &mut H,
        state: &SystemState,
        now_ms: u64,
    ) -> Option<BreakdownEvent> {
        // With HV open the probe reads ~0 V by construction
        let hv_closed = matches!(hw.relay_state(RelayId::Hv), Ok(s) if s.is_closed());
        if !hv_closed {
            self.voltage_strikes.clear();
            return None;
        }

        let setpoint = state.setpoints.active();
        let measured = match hw.read_voltage() {
            Ok(v) => v as f64,
            Err(e) => {
                warn!("probe read failed: {:?}", e);
                self.voltage_strikes.clear();
                return None;
            }
        };

        match self.voltage_deviation(setpoint, measured) {
            Some((deviation, limit)) if deviation > limit => {
                debug!("voltage deviation {} V over {} V", deviation, limit);
                if self.voltage_strikes.hit() {
                    return Some(BreakdownEvent {
                        kind: BreakdownKind::Voltage,
                        measured: deviation,
                        limit,
                        timestamp_ms: now_ms,
                    });
                }
            }
            _ => self.voltage_strikes.clear(),
        }
        None
    }

    fn check_current<H: HardwareDriver + ?Sized>(
        &mut self,
        hw: &mut H,
        now_ms: u64,
    ) -> Option<BreakdownEvent> {
        let limit = self.config.current_limit_pa;
        let mut worst: Option<f64> = None;
        for source in SourceKind::ALL {
            match hw.read_current(source) {
                Ok(pa) if magnitude(pa) > limit => {
                    let pa = magnitude(pa);
                    worst = Some(worst.map_or(pa, |w| if pa > w { pa } else { w }));
                }
                Ok(_) => {}
                Err(e) => warn!("{:?} current read failed: {:?}", source, e),
            }
        }

        match worst {
            Some(measured) => {
                debug!("current {} pA over limit", measured);
                if self.current_strikes.hit() {
                    return Some(BreakdownEvent {
                        kind: BreakdownKind::Current,
                        measured,
                        limit,
                        timestamp_ms: now_ms,
                    });
                }
            }
            None => self.current_strikes.clear(),
        }
        None
    }
}

impl Default for BreakdownDetector {
    fn default() -> Self {
        Self::new(BreakdownConfig::default())
    }
}
