//! Consecutive-hit counter

/// Consecutive hits needed before a detector acts
pub const STRIKES_TO_ACT: u8 = 2;

/// Counts consecutive anomalous readings
///
/// Any normal or missing reading in between clears the count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StrikeCounter {
    count: u8,
}

impl StrikeCounter {
    pub const fn new() -> Self {
        Self { count: 0 }
    }

    /// Record an anomalous reading; returns `true` (and resets) once the
    /// threshold is reached
    pub fn hit(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        if self.count >= STRIKES_TO_ACT {
            self.count = 0;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u8 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_consecutive_hits() {
        let mut strikes = StrikeCounter::new();
        assert!(!strikes.hit());
        assert!(strikes.hit());
        assert_eq!(strikes.count(), 0);
    }

    #[test]
    fn test_clear_between_hits() {
        let mut strikes = StrikeCounter::new();
        assert!(!strikes.hit());
        strikes.clear();
        assert!(!strikes.hit());
        assert_eq!(strikes.count(), 1);
    }
}
