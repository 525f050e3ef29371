// Speeds and unit conversion
// A speed is a dot length in whole milliseconds; "PARIS " (50 units) calibrates wpm

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MorseError, Result};
use crate::patterns::{CHAR_GAP_UNITS, PARIS_LENGTH, WORD_GAP_UNITS};
use crate::types::{Symbol, WpmGroup};

/// Timers and mark classification commit at this fraction of the textbook
/// length, leaving room for the sender to speed up.
pub const FUDGE_FACTOR: f64 = 0.75;

/// Longest dot for which a word space still fits in a `u32`.
pub const MAX_DOT_MS: u32 = u32::MAX / WORD_GAP_UNITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Speed {
    dot_ms: u32,
}

impl Speed {
    /// A speed with the given dot length. Zero is raised to one
    /// millisecond so every speed has a finite wpm, and anything past
    /// [`MAX_DOT_MS`] is lowered to it.
    pub const fn from_dot_ms(dot_ms: u32) -> Self {
        Self {
            dot_ms: if dot_ms == 0 {
                1
            } else if dot_ms > MAX_DOT_MS {
                MAX_DOT_MS
            } else {
                dot_ms
            },
        }
    }

    pub fn from_wpm(wpm: f64) -> Result<Self> {
        if !wpm.is_finite() || wpm <= 0.0 {
            return Err(MorseError::InvalidSpeed(wpm));
        }
        let dots_per_second = PARIS_LENGTH as f64 * wpm / 60.0;
        let dot_ms = (1000.0 / dots_per_second).round();
        if dot_ms > MAX_DOT_MS as f64 {
            return Err(MorseError::InvalidSpeed(wpm));
        }
        Ok(Self::from_dot_ms(dot_ms as u32))
    }

    pub const fn dot_ms(&self) -> u32 {
        self.dot_ms
    }

    pub const fn dash_ms(&self) -> u32 {
        self.dot_ms * Symbol::Dash.units()
    }

    /// Textbook inter-character silence.
    pub const fn char_gap_ms(&self) -> u32 {
        self.dot_ms * CHAR_GAP_UNITS
    }

    /// Textbook inter-word silence.
    pub const fn space_ms(&self) -> u32 {
        self.dot_ms * WORD_GAP_UNITS
    }

    pub fn dot(&self) -> Duration {
        Duration::from_millis(self.dot_ms as u64)
    }

    pub fn dash(&self) -> Duration {
        Duration::from_millis(self.dash_ms() as u64)
    }

    pub fn wpm(&self) -> f64 {
        dots_per_sec_to_wpm(dot_ms_to_dots_per_sec(self.dot_ms as f64))
    }

    /// Classify a mark against this speed: anything shorter than three
    /// quarters of a dash is a dot.
    pub fn classify(&self, mark: Duration) -> Symbol {
        let ms = mark.as_nanos() as f64 / 1_000_000.0;
        if ms < self.dash_ms() as f64 * FUDGE_FACTOR {
            Symbol::Dot
        } else {
            Symbol::Dash
        }
    }

    /// Pull this speed into `[floor, ceiling]` measured in wpm. A faster
    /// speed has a shorter dot.
    pub fn clamp(self, floor: Speed, ceiling: Speed) -> Speed {
        if self.dot_ms < ceiling.dot_ms {
            ceiling
        } else if self.dot_ms > floor.dot_ms {
            floor
        } else {
            self
        }
    }

    /// A duration scaled from this speed's dot, truncated to whole
    /// milliseconds.
    pub(crate) fn scaled_dot_ms(&self, factor: f64) -> u32 {
        (self.dot_ms as f64 * factor) as u32
    }
}

/// Converts dot length in milliseconds to dots per second.
pub fn dot_ms_to_dots_per_sec(dot_ms: f64) -> f64 {
    1000.0 / dot_ms
}

/// Converts dots per second to words per minute.
pub fn dots_per_sec_to_wpm(dots_per_second: f64) -> f64 {
    dots_per_second * 60.0 / PARIS_LENGTH as f64
}

/// The three speed roles bundled together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedGroup {
    pub mark: Speed,
    pub char: Speed,
    pub word: Speed,
}

impl SpeedGroup {
    pub const fn new(mark: Speed, char: Speed, word: Speed) -> Self {
        Self { mark, char, word }
    }

    pub const fn uniform(speed: Speed) -> Self {
        Self::new(speed, speed, speed)
    }

    pub fn from_wpm(group: &WpmGroup) -> Result<Self> {
        Ok(Self::new(
            Speed::from_wpm(group.mark)?,
            Speed::from_wpm(group.char)?,
            Speed::from_wpm(group.word)?,
        ))
    }

    pub fn clamp(&self, floor: &SpeedGroup, ceiling: &SpeedGroup) -> SpeedGroup {
        SpeedGroup {
            mark: self.mark.clamp(floor.mark, ceiling.mark),
            char: self.char.clamp(floor.char, ceiling.char),
            word: self.word.clamp(floor.word, ceiling.word),
        }
    }

    pub fn to_wpm(&self) -> WpmGroup {
        WpmGroup {
            mark: self.mark.wpm(),
            char: self.char.wpm(),
            word: self.word.wpm(),
        }
    }

    /// Reject a floor that is faster than its ceiling on any channel.
    pub fn check_range(floor: &SpeedGroup, ceiling: &SpeedGroup) -> Result<()> {
        let channels = [
            ("mark", floor.mark, ceiling.mark),
            ("char", floor.char, ceiling.char),
            ("word", floor.word, ceiling.word),
        ];
        for (channel, floor, ceiling) in channels {
            if floor.dot_ms < ceiling.dot_ms {
                return Err(MorseError::InvalidSpeedRange {
                    channel,
                    floor_wpm: floor.wpm(),
                    ceiling_wpm: ceiling.wpm(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_speeds() {
        assert_eq!(Speed::from_wpm(12.5).unwrap().dot_ms(), 96);
        assert_eq!(Speed::from_wpm(10.0).unwrap().dot_ms(), 120);
        assert_eq!(Speed::from_wpm(20.0).unwrap().dot_ms(), 60);
        assert_eq!(Speed::from_wpm(25.0).unwrap().dot_ms(), 48);
        assert_eq!(Speed::from_wpm(7.5).unwrap().dot_ms(), 160);
        assert_eq!(Speed::from_wpm(5.0).unwrap().dot_ms(), 240);
    }

    #[test]
    fn test_wpm_round_trip() {
        for wpm in [5.0, 7.5, 10.0, 12.5, 20.0, 25.0] {
            let speed = Speed::from_wpm(wpm).unwrap();
            assert_relative_eq!(speed.wpm(), wpm, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_dash_is_three_dots() {
        for dot in [1, 48, 96, 97, 240, 1000] {
            let speed = Speed::from_dot_ms(dot);
            assert_eq!(speed.dash_ms(), 3 * speed.dot_ms());
            assert_eq!(speed.dash(), speed.dot() * 3);
        }
    }

    #[test]
    fn test_invalid_wpm() {
        assert!(Speed::from_wpm(0.0).is_err());
        assert!(Speed::from_wpm(-3.0).is_err());
        assert!(Speed::from_wpm(f64::NAN).is_err());
        assert!(Speed::from_wpm(f64::INFINITY).is_err());
    }

    #[test]
    fn test_zero_dot_is_raised() {
        assert_eq!(Speed::from_dot_ms(0).dot_ms(), 1);
    }

    #[test]
    fn test_glacial_wpm_rejected() {
        assert!(matches!(Speed::from_wpm(1e-6), Err(MorseError::InvalidSpeed(_))));

        let slowest = Speed::from_dot_ms(u32::MAX);
        assert_eq!(slowest.dot_ms(), MAX_DOT_MS);
        assert_eq!(slowest.space_ms(), MAX_DOT_MS * WORD_GAP_UNITS);
        assert_eq!(slowest.dash_ms(), MAX_DOT_MS * 3);
    }

    #[test]
    fn test_classify() {
        let speed = Speed::from_dot_ms(96);
        assert_eq!(speed.classify(Duration::from_millis(96)), Symbol::Dot);
        assert_eq!(speed.classify(Duration::from_millis(215)), Symbol::Dot);
        assert_eq!(speed.classify(Duration::from_millis(216)), Symbol::Dash);
        assert_eq!(speed.classify(Duration::from_millis(288)), Symbol::Dash);
    }

    #[test]
    fn test_clamp() {
        let floor = Speed::from_wpm(7.5).unwrap();
        let ceiling = Speed::from_wpm(25.0).unwrap();
        let fast = Speed::from_wpm(40.0).unwrap();
        let slow = Speed::from_wpm(5.0).unwrap();
        let ok = Speed::from_wpm(12.5).unwrap();

        assert_eq!(fast.clamp(floor, ceiling), ceiling);
        assert_eq!(slow.clamp(floor, ceiling), floor);
        assert_eq!(ok.clamp(floor, ceiling), ok);
    }

    #[test]
    fn test_check_range() {
        let slow = SpeedGroup::uniform(Speed::from_wpm(5.0).unwrap());
        let fast = SpeedGroup::uniform(Speed::from_wpm(30.0).unwrap());
        assert!(SpeedGroup::check_range(&slow, &fast).is_ok());
        assert!(SpeedGroup::check_range(&fast, &slow).is_err());
    }
}
