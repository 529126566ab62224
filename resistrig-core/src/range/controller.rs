//! Auto-range controller
//!
//! Adjusts the meter range by one step at a time from the latest current
//! sample:
//!
//! - overflow (raw `0`) below the top range on two consecutive samples
//!   steps up;
//! - a reading under half the next lower range's ceiling on two
//!   consecutive samples steps down;
//! - inside the guard window before a scheduled phase boundary the range
//!   walks towards the guard range instead, ahead of the switching spike.

use heapless::Vec;

use super::{magnitude, MeasurementRange, Reading};
use crate::config::RangeConfig;
use crate::safety::StrikeCounter;
use crate::state::{RigEvent, SystemState};
use crate::traits::{CurrentMeter, HardwareError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Range selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RangeMode {
    /// Controller picks the range during a run
    #[default]
    Auto,
    /// Operator-selected range, written as-is
    Manual(MeasurementRange),
}

/// Current-meter auto-range controller
#[derive(Debug, Clone)]
pub struct RangeController {
    config: RangeConfig,
    mode: RangeMode,
    armed: bool,
    /// Absolute phase boundaries of the armed run (ms)
    boundaries: Vec<u64, 2>,
    overflow: StrikeCounter,
    underflow: StrikeCounter,
    /// Sequence number of the last sample evaluated
    last_seq: Option<u32>,
}

impl RangeController {
    pub fn new(config: RangeConfig) -> Self {
        Self {
            config,
            mode: RangeMode::Auto,
            armed: false,
            boundaries: Vec::new(),
            overflow: StrikeCounter::new(),
            underflow: StrikeCounter::new(),
            last_seq: None,
        }
    }

    pub fn mode(&self) -> RangeMode {
        self.mode
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Start controlling for a run
    ///
    /// `boundaries_ms` are offsets from `run_start_ms`. In auto mode the
    /// meter starts at the top range.
    pub fn arm<H: CurrentMeter + ?Sized>(
        &mut self,
        hw: &mut H,
        state: &mut SystemState,
        run_start_ms: u64,
        boundaries_ms: &[u64],
    ) -> Result<(), HardwareError> {
        self.armed = true;
        self.boundaries.clear();
        for offset in boundaries_ms {
            let _ = self.boundaries.push(run_start_ms + offset);
        }
        self.reset_strikes();
        self.last_seq = None;

        let range = match self.mode {
            RangeMode::Auto => MeasurementRange::TOP,
            RangeMode::Manual(range) => range,
        };
        apply(hw, state, range)
    }

    /// Stop controlling; the meter keeps its last range
    pub fn disarm(&mut self) {
        self.armed = false;
        self.boundaries.clear();
        self.reset_strikes();
    }

    /// Switch between auto and manual ranging
    ///
    /// A manual range is written immediately. Switching to auto during a
    /// run restarts from the top range.
    pub fn set_mode<H: CurrentMeter + ?Sized>(
        &mut self,
        hw: &mut H,
        state: &mut SystemState,
        mode: RangeMode,
    ) -> Result<(), HardwareError> {
        let previous = self.mode;
        self.mode = mode;
        self.reset_strikes();
        let result = match mode {
            RangeMode::Manual(range) => apply(hw, state, range),
            RangeMode::Auto if self.armed => apply(hw, state, MeasurementRange::TOP),
            RangeMode::Auto => Ok(()),
        };
        if result.is_err() {
            self.mode = previous;
        }
        result
    }

    /// Boundary the guard window currently covers, if any
    pub fn upcoming_boundary(&self, now_ms: u64) -> Option<u64> {
        let window = self.config.guard_window_ms as u64;
        self.boundaries
            .iter()
            .copied()
            .find(|&boundary| now_ms < boundary && boundary - now_ms <= window)
    }

    /// Run one range poll against the latest `(sequence, reading)` sample
    ///
    /// Returns the new range if it changed.
    pub fn tick<H: CurrentMeter + ?Sized>(
        &mut self,
        hw: &mut H,
        state: &mut SystemState,
        now_ms: u64,
        latest: Option<(u32, Reading)>,
    ) -> Option<MeasurementRange> {
        if !self.armed || self.mode != RangeMode::Auto {
            return None;
        }
        let current = if state.range.is_auto() {
            MeasurementRange::TOP
        } else {
            state.range
        };

        if let Some(boundary) = self.upcoming_boundary(now_ms) {
            self.reset_strikes();
            let target = current.step_towards(self.config.guard_range);
            if target == current {
                return None;
            }
            trace!("guard window before {} ms, range {}", boundary, target.index());
            return self.step(hw, state, target);
        }

        let (seq, reading) = latest?;
        if self.last_seq == Some(seq) {
            return None;
        }
        self.last_seq = Some(seq);

        match reading {
            Reading::Overflow if !current.is_top() => {
                self.underflow.clear();
                if self.overflow.hit() {
                    return self.step(hw, state, current.step_up());
                }
            }
            Reading::Value(pa) => {
                self.overflow.clear();
                match current.lower_ceiling_pa() {
                    Some(lower) if magnitude(pa) < lower / 2.0 => {
                        if self.underflow.hit() {
                            return self.step(hw, state, current.step_down());
                        }
                    }
                    _ => self.underflow.clear(),
                }
            }
            Reading::Overflow | Reading::Disconnected => self.reset_strikes(),
        }
        None
    }

    fn step<H: CurrentMeter + ?Sized>(
        &mut self,
        hw: &mut H,
        state: &mut SystemState,
        target: MeasurementRange,
    ) -> Option<MeasurementRange> {
        apply(hw, state, target).ok().map(|()| target)
    }

    fn reset_strikes(&mut self) {
        self.overflow.clear();
        self.underflow.clear();
    }
}

impl Default for RangeController {
    fn default() -> Self {
        Self::new(RangeConfig::default())
    }
}

/// Write a range to the meter and commit it on success
fn apply<H: CurrentMeter + ?Sized>(
    hw: &mut H,
    state: &mut SystemState,
    range: MeasurementRange,
) -> Result<(), HardwareError> {
    match hw.set_range(range) {
        Ok(()) => {
            if state.range != range {
                debug!("range {} -> {}", state.range.index(), range.index());
                state.range = range;
                state.emit(RigEvent::RangeChanged { range });
            }
            Ok(())
        }
        Err(e) => {
            warn!("set range {} failed: {:?}", range.index(), e);
            Err(e)
        }
    }
}
