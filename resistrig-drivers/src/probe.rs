//! HV probe correction and electrometer reply normalization

use resistrig_core::traits::SourceKind;

/// Probe divider: 0-5 V analog input maps to 0-5000 V
pub const PROBE_VOLTS_PER_VOLT: f32 = 1000.0;

/// Replies above this magnitude (pA) are the electrometer's overflow marker
pub const OVERFLOW_MARKER_PA: f64 = 1.0e20;

/// Quadratic correction fit `[a, b, c]` for `a*v^2 + b*v + c`
struct Fit {
    above: [f32; 3],
    below: [f32; 3],
    /// Correction at exactly 3 V where neither fit applies
    at_three: f32,
}

const HV_AMP_FIT: Fit = Fit {
    above: [1.632_063e-6, 1.141_209_4e-2, 5.850_824e-1],
    below: [1.956_477_9e-6, -9.475_885_6e-3, -2.370_814_3],
    at_three: 1.66,
};

const ELECTROMETER_FIT: Fit = Fit {
    above: [-3.787_878_8e-7, 2.457_242_4e-2, 1.681_818_2],
    below: [-1.110_722_6e-6, -2.542_617_7e-2, -1.719_790_2],
    at_three: 1.59,
};

fn quadratic([a, b, c]: [f32; 3], v: f32) -> f32 {
    a * v * v + b * v + c
}

/// Corrected probe voltage in V for the source driving the sample
///
/// The probe's error depends on which source is connected, so the fit is
/// chosen per source. Below 3 V the fit is subtracted.
pub fn correct_probe_voltage(source: SourceKind, analog_v: f32) -> f32 {
    let voltage = analog_v * PROBE_VOLTS_PER_VOLT;
    let fit = match source {
        SourceKind::HvAmp => &HV_AMP_FIT,
        SourceKind::Electrometer => &ELECTROMETER_FIT,
    };
    let correction = if voltage > 3.0 {
        quadratic(fit.above, voltage)
    } else if voltage < 3.0 {
        -quadratic(fit.below, voltage)
    } else {
        fit.at_three
    };
    voltage + correction
}

/// Convert an electrometer current reply (A) to pA
///
/// The overflow marker becomes `0`, the sentinel the range controller
/// reads as saturation.
pub fn current_from_amps(amps: f64) -> f64 {
    normalize_current_pa(amps * 1.0e12)
}

/// Map the overflow marker to the `0` sentinel
pub fn normalize_current_pa(pa: f64) -> f64 {
    if pa > OVERFLOW_MARKER_PA || pa < -OVERFLOW_MARKER_PA || pa.is_nan() {
        0.0
    } else {
        pa
    }
}
