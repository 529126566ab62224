//! Dielectric response of the sample under test
//!
//! Polarization current is a conduction term plus an absorption term that
//! decays with a single time constant. After the sample is shorted, the
//! absorbed charge flows back with the same time constant and opposite
//! sign, scaled by how far the absorption had charged.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bench model parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Steady-state conduction (pA per V)
    pub conduction_pa_per_v: f64,
    /// Initial absorption current (pA per V)
    pub absorption_pa_per_v: f64,
    /// Absorption time constant (ms)
    pub time_constant_ms: f64,
    /// Sample temperature (°C)
    pub temperature_c: f32,
    /// Relative humidity (%)
    pub humidity_pct: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            conduction_pa_per_v: 0.002,
            absorption_pa_per_v: 0.5,
            time_constant_ms: 30_000.0,
            temperature_c: 23.0,
            humidity_pct: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Excitation {
    Idle,
    Charging {
        volts: f64,
        since_ms: u64,
    },
    Discharging {
        volts: f64,
        charged_ms: u64,
        since_ms: u64,
    },
}

/// Sample current as a function of the applied voltage history
#[derive(Debug, Clone)]
pub struct DielectricModel {
    config: SimConfig,
    excitation: Excitation,
}

impl DielectricModel {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            excitation: Excitation::Idle,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Record the voltage now across the sample
    pub fn apply(&mut self, volts: f64, now_ms: u64) {
        self.excitation = match self.excitation {
            Excitation::Charging { volts: v, .. } if v == volts => self.excitation,
            Excitation::Charging { volts: v, since_ms } if volts == 0.0 => {
                Excitation::Discharging {
                    volts: v,
                    charged_ms: now_ms.saturating_sub(since_ms),
                    since_ms: now_ms,
                }
            }
            _ if volts != 0.0 => Excitation::Charging {
                volts,
                since_ms: now_ms,
            },
            other => other,
        };
    }

    /// Current through the sample (pA)
    ///
    /// `shorted` is whether a discharge path exists.
    pub fn current_pa(&self, now_ms: u64, shorted: bool) -> f64 {
        let tau = self.config.time_constant_ms;
        match self.excitation {
            Excitation::Idle => 0.0,
            Excitation::Charging { volts, since_ms } => {
                let t = now_ms.saturating_sub(since_ms) as f64;
                volts
                    * (self.config.conduction_pa_per_v
                        + self.config.absorption_pa_per_v * (-t / tau).exp())
            }
            Excitation::Discharging { .. } if !shorted => 0.0,
            Excitation::Discharging {
                volts,
                charged_ms,
                since_ms,
            } => {
                let charged = 1.0 - (-(charged_ms as f64) / tau).exp();
                let t = now_ms.saturating_sub(since_ms) as f64;
                -volts * self.config.absorption_pa_per_v * charged * (-t / tau).exp()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_sample_draws_nothing() {
        let model = DielectricModel::new(SimConfig::default());
        assert_eq!(model.current_pa(10_000, true), 0.0);
    }

    #[test]
    fn test_polarization_decays_to_conduction() {
        let mut model = DielectricModel::new(SimConfig::default());
        model.apply(1000.0, 0);
        assert!((model.current_pa(0, false) - 502.0).abs() < 1e-9);
        let late = model.current_pa(600_000, false);
        assert!((late - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_depolarization_is_reversed_and_scaled() {
        let mut model = DielectricModel::new(SimConfig::default());
        model.apply(1000.0, 0);
        model.apply(1000.0, 15_000);
        model.apply(0.0, 30_000);

        let i = model.current_pa(30_000, true);
        let expected = -500.0 * (1.0 - (-1.0f64).exp());
        assert!((i - expected).abs() < 1e-9);
        assert!(model.current_pa(60_000, true) > i);
        assert_eq!(model.current_pa(30_000, false), 0.0);
    }
}
