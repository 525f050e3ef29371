// Rolling statistics on recent signal elements

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::speed::SpeedGroup;

/// Smoothing window of the exponential moving averages.
const ROLLING_LENGTH: f64 = 15.0;

/// Adaptation needs strictly more samples than this on each counted channel.
const MIN_SAMPLES: u32 = 5;

/// Exponential moving averages (milliseconds) of five timing channels, plus
/// sample counters for the three intra-character channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingStats {
    dot_average: f64,
    dash_average: f64,
    mark_average: f64,
    char_average: f64,
    word_average: f64,
    dots_seen: u32,
    dashes_seen: u32,
    marks_seen: u32,
}

/// Fold one sample into an average. An average of exactly zero is a cold
/// channel and takes the first sample as-is.
fn roll(average: &mut f64, sample: Duration) -> f64 {
    let ms = sample.as_nanos() as f64 / 1_000_000.0;
    if *average == 0.0 {
        *average = ms;
    } else {
        *average = *average * ((ROLLING_LENGTH - 1.0) / ROLLING_LENGTH) + ms * (1.0 / ROLLING_LENGTH);
    }
    *average
}

impl RollingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once every counted channel has more than five samples.
    pub fn can_adapt(&self) -> bool {
        self.dots_seen > MIN_SAMPLES && self.dashes_seen > MIN_SAMPLES && self.marks_seen > MIN_SAMPLES
    }

    pub fn add_dot(&mut self, duration: Duration) -> f64 {
        self.dots_seen = self.dots_seen.saturating_add(1);
        roll(&mut self.dot_average, duration)
    }

    pub fn add_dash(&mut self, duration: Duration) -> f64 {
        self.dashes_seen = self.dashes_seen.saturating_add(1);
        roll(&mut self.dash_average, duration)
    }

    /// Record a silence between two marks of the same character.
    pub fn add_mark_silence(&mut self, duration: Duration) -> f64 {
        self.marks_seen = self.marks_seen.saturating_add(1);
        roll(&mut self.mark_average, duration)
    }

    pub fn add_char_silence(&mut self, duration: Duration) -> f64 {
        roll(&mut self.char_average, duration)
    }

    pub fn add_word_silence(&mut self, duration: Duration) -> f64 {
        roll(&mut self.word_average, duration)
    }

    pub fn dot_average(&self) -> f64 {
        self.dot_average
    }

    pub fn dash_average(&self) -> f64 {
        self.dash_average
    }

    /// Average intra-character silence.
    pub fn mark_average(&self) -> f64 {
        self.mark_average
    }

    /// Average inter-character silence.
    pub fn char_average(&self) -> f64 {
        self.char_average
    }

    /// Average inter-word silence.
    pub fn word_average(&self) -> f64 {
        self.word_average
    }

    pub fn dots_seen(&self) -> u32 {
        self.dots_seen
    }

    pub fn dashes_seen(&self) -> u32 {
        self.dashes_seen
    }

    pub fn marks_seen(&self) -> u32 {
        self.marks_seen
    }

    /// Start over from the textbook timings of `speeds`, with all sample
    /// counters at zero.
    pub fn reset(&mut self, speeds: &SpeedGroup) {
        *self = Self {
            dot_average: speeds.mark.dot_ms() as f64,
            dash_average: speeds.mark.dash_ms() as f64,
            mark_average: speeds.mark.dot_ms() as f64,
            char_average: speeds.char.char_gap_ms() as f64,
            word_average: speeds.word.space_ms() as f64,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speed::Speed;
    use approx::assert_relative_eq;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_cold_start_takes_first_sample() {
        let mut stats = RollingStats::new();
        assert_eq!(stats.add_dot(ms(100)), 100.0);
        assert_eq!(stats.add_word_silence(ms(700)), 700.0);
    }

    #[test]
    fn test_moving_average() {
        let mut stats = RollingStats::new();
        stats.add_dash(ms(300));
        let avg = stats.add_dash(ms(150));
        assert_relative_eq!(avg, 300.0 * 14.0 / 15.0 + 150.0 / 15.0, max_relative = 1e-12);
        assert_relative_eq!(avg, 290.0, max_relative = 1e-12);
    }

    #[test]
    fn test_can_adapt_needs_six_of_each() {
        let mut stats = RollingStats::new();
        for _ in 0..6 {
            stats.add_dot(ms(100));
            stats.add_dash(ms(300));
        }
        for _ in 0..5 {
            stats.add_mark_silence(ms(100));
        }
        assert!(!stats.can_adapt());
        // char and word silences are not counted
        stats.add_char_silence(ms(300));
        stats.add_word_silence(ms(700));
        assert!(!stats.can_adapt());
        stats.add_mark_silence(ms(100));
        assert!(stats.can_adapt());
    }

    #[test]
    fn test_can_adapt_any_order() {
        // every interleaving of 6 dots, 6 dashes, 6 mark silences ends adaptable,
        // and no prefix missing a channel is adaptable
        let orders: [[u8; 3]; 6] = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for order in orders {
            let mut stats = RollingStats::new();
            for (i, channel) in order.iter().enumerate() {
                for _ in 0..6 {
                    assert!(!stats.can_adapt());
                    match *channel {
                        0 => stats.add_dot(ms(90)),
                        1 => stats.add_dash(ms(270)),
                        _ => stats.add_mark_silence(ms(90)),
                    };
                }
                assert_eq!(stats.can_adapt(), i == 2);
            }
        }
    }

    #[test]
    fn test_reset_to_speeds() {
        let mut stats = RollingStats::new();
        for _ in 0..10 {
            stats.add_dot(ms(50));
            stats.add_dash(ms(150));
            stats.add_mark_silence(ms(50));
        }
        assert!(stats.can_adapt());

        let group = SpeedGroup::new(Speed::from_dot_ms(96), Speed::from_dot_ms(100), Speed::from_dot_ms(120));
        stats.reset(&group);
        assert!(!stats.can_adapt());
        assert_eq!(stats.dot_average(), 96.0);
        assert_eq!(stats.dash_average(), 288.0);
        assert_eq!(stats.mark_average(), 96.0);
        assert_eq!(stats.char_average(), 300.0);
        assert_eq!(stats.word_average(), 840.0);
        assert_eq!(stats.dots_seen(), 0);
    }
}
