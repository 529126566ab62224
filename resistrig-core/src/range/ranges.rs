//! Measurement range indices and full-scale ceilings

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Full-scale ceiling in pA for fixed ranges 1..=11
const CEILINGS_PA: [f64; 11] = [
    2.0, 20.0, 200.0, 2.0e3, 2.0e4, 2.0e5, 2.0e6, 2.0e7, 2.0e8, 2.0e9, 2.0e10,
];

/// Current meter measurement range
///
/// `0` selects the instrument's internal auto mode; `1..=11` are fixed
/// sub-ranges from 2 pA up to 20 mA full scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct MeasurementRange(u8);

/// Raw range index above the top range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangeOutOfBounds(pub u8);

impl core::fmt::Display for RangeOutOfBounds {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "range index {} outside 0..=11", self.0)
    }
}

impl TryFrom<u8> for MeasurementRange {
    type Error = RangeOutOfBounds;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index).ok_or(RangeOutOfBounds(index))
    }
}

impl From<MeasurementRange> for u8 {
    fn from(range: MeasurementRange) -> Self {
        range.0
    }
}

impl MeasurementRange {
    /// Instrument auto-range sentinel
    pub const AUTO: Self = Self(0);
    /// Most sensitive fixed range (2 pA)
    pub const BOTTOM: Self = Self(1);
    /// Least sensitive fixed range (20 mA)
    pub const TOP: Self = Self(11);

    /// Create a range from its raw index (0..=11)
    pub const fn new(index: u8) -> Option<Self> {
        if index <= Self::TOP.0 {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Create a fixed range (1..=11)
    pub const fn fixed(index: u8) -> Option<Self> {
        if index >= Self::BOTTOM.0 && index <= Self::TOP.0 {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Clamp any index into the fixed range band
    pub fn clamped(index: i16) -> Self {
        Self(index.clamp(Self::BOTTOM.0 as i16, Self::TOP.0 as i16) as u8)
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    pub const fn is_auto(self) -> bool {
        self.0 == 0
    }

    pub const fn is_top(self) -> bool {
        self.0 == Self::TOP.0
    }

    /// One range less sensitive, saturating at the top
    pub fn step_up(self) -> Self {
        Self::clamped(self.0 as i16 + 1)
    }

    /// One range more sensitive, saturating at the bottom
    pub fn step_down(self) -> Self {
        Self::clamped(self.0 as i16 - 1)
    }

    /// One step from `self` towards `target`
    pub fn step_towards(self, target: Self) -> Self {
        if target.0 > self.0 {
            self.step_up()
        } else if target.0 < self.0 {
            self.step_down()
        } else {
            self
        }
    }

    /// Full-scale ceiling in pA (`None` for the auto sentinel)
    pub fn ceiling_pa(self) -> Option<f64> {
        let slot = (self.0 as usize).checked_sub(1)?;
        CEILINGS_PA.get(slot).copied()
    }

    /// Ceiling of the next more sensitive range, if there is one
    pub fn lower_ceiling_pa(self) -> Option<f64> {
        if self.0 <= Self::BOTTOM.0 {
            None
        } else {
            Self(self.0 - 1).ceiling_pa()
        }
    }
}

impl Default for MeasurementRange {
    fn default() -> Self {
        Self::TOP
    }
}

/// Absolute value without the `std` float intrinsics
pub fn magnitude(x: f64) -> f64 {
    if x < 0.0 {
        -x
    } else {
        x
    }
}

/// Classified current reading
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reading {
    /// A real measurement in pA
    Value(f64),
    /// The meter saturated (raw reading of exactly zero)
    Overflow,
    /// No reading available
    Disconnected,
}

impl Reading {
    /// Classify a raw reading; `None` means the read failed
    pub fn classify(raw: Option<f64>) -> Self {
        match raw {
            None => Reading::Disconnected,
            Some(pa) if pa == 0.0 => Reading::Overflow,
            Some(pa) => Reading::Value(pa),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(MeasurementRange::new(0), Some(MeasurementRange::AUTO));
        assert_eq!(MeasurementRange::new(12), None);
        assert_eq!(MeasurementRange::fixed(0), None);
        assert_eq!(MeasurementRange::fixed(11), Some(MeasurementRange::TOP));
    }

    #[test]
    fn test_steps_saturate() {
        assert_eq!(MeasurementRange::TOP.step_up(), MeasurementRange::TOP);
        assert_eq!(MeasurementRange::BOTTOM.step_down(), MeasurementRange::BOTTOM);
        assert_eq!(MeasurementRange::AUTO.step_down(), MeasurementRange::BOTTOM);
        assert_eq!(MeasurementRange::BOTTOM.step_up().index(), 2);
    }

    #[test]
    fn test_step_towards() {
        let six = MeasurementRange::fixed(6).unwrap();
        assert_eq!(MeasurementRange::TOP.step_towards(six).index(), 10);
        assert_eq!(MeasurementRange::BOTTOM.step_towards(six).index(), 2);
        assert_eq!(six.step_towards(six), six);
    }

    #[test]
    fn test_ceilings() {
        assert_eq!(MeasurementRange::BOTTOM.ceiling_pa(), Some(2.0));
        assert_eq!(MeasurementRange::fixed(4).unwrap().ceiling_pa(), Some(2000.0));
        assert_eq!(MeasurementRange::TOP.ceiling_pa(), Some(2.0e10));
        assert_eq!(MeasurementRange::AUTO.ceiling_pa(), None);
        assert_eq!(MeasurementRange::BOTTOM.lower_ceiling_pa(), None);
        assert_eq!(MeasurementRange::fixed(3).unwrap().lower_ceiling_pa(), Some(20.0));
    }

    #[test]
    fn test_raw_index_checked() {
        assert_eq!(MeasurementRange::try_from(11), Ok(MeasurementRange::TOP));
        assert_eq!(MeasurementRange::try_from(0), Ok(MeasurementRange::AUTO));
        assert_eq!(MeasurementRange::try_from(100), Err(RangeOutOfBounds(100)));
        assert_eq!(u8::from(MeasurementRange::BOTTOM), 1);
    }

    #[test]
    fn test_classify() {
        assert_eq!(Reading::classify(None), Reading::Disconnected);
        assert_eq!(Reading::classify(Some(0.0)), Reading::Overflow);
        assert_eq!(Reading::classify(Some(-4.5)), Reading::Value(-4.5));
    }
}
