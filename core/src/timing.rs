use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::dictionary::Dictionary;
use crate::error::{MorseError, Result};
use crate::patterns::{CHAR_GAP_UNITS, WORD_GAP_UNITS};
use crate::speed::{Speed, SpeedGroup};
use crate::stats::RollingStats;
use crate::types::{GeneratorParams, Signal, Symbol, Token};

// 12.5 wpm
const DEFAULT_SPEED: Speed = Speed::from_dot_ms(96);

/// The timing habits of one sender: a speed for each kind of element and a
/// variability in `[0, 1]`.
///
/// Each generated duration is scaled by an independent uniform factor in
/// `[1 - variability, 1 + variability]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SenderProfile {
    dot: Speed,
    dash: Speed,
    mark: Speed,
    char: Speed,
    word: Speed,
    variability: f64,
}

impl SenderProfile {
    pub fn new(speeds: SpeedGroup, variability: f64) -> Result<Self> {
        check_variability(variability)?;
        Ok(Self {
            dot: speeds.mark,
            dash: speeds.mark,
            mark: speeds.mark,
            char: speeds.char,
            word: speeds.word,
            variability,
        })
    }

    pub fn from_wpm(wpm: f64, variability: f64) -> Result<Self> {
        Self::new(SpeedGroup::uniform(Speed::from_wpm(wpm)?), variability)
    }

    pub fn from_params(params: &GeneratorParams) -> Result<Self> {
        Self::new(SpeedGroup::from_wpm(&params.speed)?, params.variability)
    }

    /// Imitate the sender described by `stats`.
    ///
    /// With no dots or dashes recorded the marks fall back to 12.5 wpm. An
    /// empty char average falls back to the dash speed and an empty word
    /// average to the char speed.
    pub fn from_stats(stats: &RollingStats, variability: f64) -> Result<Self> {
        check_variability(variability)?;

        let dot_ms = stats.dot_average() as u32;
        let dash_ms = stats.dash_average() as u32;
        let (dot, dash, mark) = if dot_ms == 0 && dash_ms == 0 {
            (DEFAULT_SPEED, DEFAULT_SPEED, DEFAULT_SPEED)
        } else {
            (
                Speed::from_dot_ms(dot_ms),
                Speed::from_dot_ms(dash_ms / Symbol::Dash.units()),
                Speed::from_dot_ms(stats.mark_average() as u32),
            )
        };

        let char = match stats.char_average() as u32 {
            0 => dash,
            ms => Speed::from_dot_ms(ms / CHAR_GAP_UNITS),
        };
        let word = match stats.word_average() as u32 {
            0 => char,
            ms => Speed::from_dot_ms(ms / WORD_GAP_UNITS),
        };

        Ok(Self {
            dot,
            dash,
            mark,
            char,
            word,
            variability,
        })
    }

    pub fn dot_speed(&self) -> Speed {
        self.dot
    }

    pub fn dash_speed(&self) -> Speed {
        self.dash
    }

    pub fn mark_speed(&self) -> Speed {
        self.mark
    }

    pub fn char_speed(&self) -> Speed {
        self.char
    }

    pub fn word_speed(&self) -> Speed {
        self.word
    }

    pub fn variability(&self) -> f64 {
        self.variability
    }
}

impl Default for SenderProfile {
    fn default() -> Self {
        Self {
            dot: DEFAULT_SPEED,
            dash: DEFAULT_SPEED,
            mark: DEFAULT_SPEED,
            char: DEFAULT_SPEED,
            word: DEFAULT_SPEED,
            variability: 0.0,
        }
    }
}

fn check_variability(variability: f64) -> Result<()> {
    if (0.0..=1.0).contains(&variability) {
        Ok(())
    } else {
        Err(MorseError::InvalidVariability(variability))
    }
}

/// Renders text or tokens as a timed signal.
///
/// The output always starts with a mark and alternates. A character ends
/// with a char gap, which a following word space replaces rather than
/// extends. Tokens without a code are skipped.
pub struct SignalGenerator<'a> {
    dictionary: &'a Dictionary,
    profile: SenderProfile,
    rng: StdRng,
}

impl<'a> SignalGenerator<'a> {
    /// `seed` makes the jitter reproducible; `None` seeds from the OS.
    pub fn new(dictionary: &'a Dictionary, profile: SenderProfile, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            dictionary,
            profile,
            rng,
        }
    }

    pub fn profile(&self) -> &SenderProfile {
        &self.profile
    }

    pub fn generate_text(&mut self, text: &str) -> Vec<Signal> {
        self.generate_tokens(text.chars().map(Token::from_char))
    }

    pub fn generate_tokens<I>(&mut self, tokens: I) -> Vec<Signal>
    where
        I: IntoIterator<Item = Token>,
    {
        let mut signal = Vec::new();

        for token in tokens {
            if token == Token::Space {
                // no silence before the first mark
                if signal.is_empty() {
                    continue;
                }
                if signal.last().is_some_and(|s: &Signal| !s.on) {
                    signal.pop();
                }
                let space = self.jitter(ms(self.profile.word.space_ms()));
                signal.push(Signal::off(space));
                continue;
            }

            let Some(code) = self.dictionary.encode(&token) else {
                trace!(%token, "no code, skipped");
                continue;
            };

            for &symbol in code {
                let nominal = match symbol {
                    Symbol::Dot => self.profile.dot.dot_ms(),
                    Symbol::Dash => self.profile.dash.dash_ms(),
                };
                let mark = self.jitter(ms(nominal));
                signal.push(Signal::on(mark));

                let gap = self.jitter(ms(self.profile.mark.dot_ms()));
                signal.push(Signal::off(gap));
            }

            // the char gap replaces the last intra-character gap
            signal.pop();
            let gap = self.jitter(ms(self.profile.char.dash_ms()));
            signal.push(Signal::off(gap));
        }

        signal
    }

    fn jitter(&mut self, nominal: Duration) -> Duration {
        let v = self.profile.variability;
        if v == 0.0 {
            return nominal;
        }
        let factor: f64 = self.rng.gen_range(1.0 - v..=1.0 + v);
        Duration::from_nanos((nominal.as_nanos() as f64 * factor).round() as u64)
    }
}

fn ms(value: u32) -> Duration {
    Duration::from_millis(value as u64)
}

/// Render `text` with the speeds and jitter in `params`.
pub fn morse_signal(text: &str, params: &GeneratorParams) -> Result<Vec<Signal>> {
    let profile = SenderProfile::from_params(params)?;
    let mut generator = SignalGenerator::new(Dictionary::shared(), profile, params.random_seed);
    Ok(generator.generate_text(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Prosign, WpmGroup};

    fn durations(signal: &[Signal]) -> Vec<(bool, u64)> {
        signal
            .iter()
            .map(|s| (s.on, s.duration.as_millis() as u64))
            .collect()
    }

    fn plain() -> SignalGenerator<'static> {
        SignalGenerator::new(Dictionary::shared(), SenderProfile::default(), Some(0))
    }

    #[test]
    fn test_single_character() {
        let signal = plain().generate_text("A");
        assert_eq!(
            durations(&signal),
            vec![(true, 96), (false, 96), (true, 288), (false, 288)]
        );
    }

    #[test]
    fn test_word_space_replaces_char_gap() {
        let signal = plain().generate_text("E E");
        assert_eq!(
            durations(&signal),
            vec![(true, 96), (false, 672), (true, 96), (false, 288)]
        );
    }

    #[test]
    fn test_no_leading_silence() {
        let signal = plain().generate_text("  e");
        assert_eq!(durations(&signal), vec![(true, 96), (false, 288)]);
    }

    #[test]
    fn test_unknown_characters_skipped() {
        assert!(plain().generate_text("#~").is_empty());
        assert_eq!(plain().generate_text("E#E"), plain().generate_text("EE"));
    }

    #[test]
    fn test_prosign_tokens() {
        let signal = plain().generate_tokens([Token::Prosign(Prosign::Sos)]);
        let marks: Vec<u64> = signal.iter().filter(|s| s.on).map(|s| s.duration.as_millis() as u64).collect();
        assert_eq!(marks, vec![96, 96, 96, 288, 288, 288, 96, 96, 96]);
        assert_eq!(signal.len(), 18);
    }

    #[test]
    fn test_newline_alias() {
        let newline = plain().generate_text("\n");
        let prosign = plain().generate_tokens([Token::Prosign(Prosign::Newline)]);
        assert_eq!(newline, prosign);
    }

    #[test]
    fn test_separate_gap_speeds() {
        let speeds = SpeedGroup::from_wpm(&WpmGroup {
            mark: 20.0,
            char: 10.0,
            word: 5.0,
        })
        .unwrap();
        let profile = SenderProfile::new(speeds, 0.0).unwrap();
        let signal = SignalGenerator::new(Dictionary::shared(), profile, None).generate_text("I T");
        assert_eq!(
            durations(&signal),
            vec![(true, 60), (false, 60), (true, 60), (false, 1680), (true, 180), (false, 360)]
        );
    }

    #[test]
    fn test_jitter_within_bounds() {
        let profile = SenderProfile::from_wpm(12.5, 0.3).unwrap();
        let jittered = SignalGenerator::new(Dictionary::shared(), profile, Some(42)).generate_text("PARIS PARIS");
        let nominal = plain().generate_text("PARIS PARIS");
        assert_eq!(jittered.len(), nominal.len());

        for (j, n) in jittered.iter().zip(&nominal) {
            assert_eq!(j.on, n.on);
            let low = n.duration.as_nanos() as f64 * 0.7 - 1.0;
            let high = n.duration.as_nanos() as f64 * 1.3 + 1.0;
            let got = j.duration.as_nanos() as f64;
            assert!(low <= got && got <= high, "{got} outside [{low}, {high}]");
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        let profile = SenderProfile::from_wpm(20.0, 0.5).unwrap();
        let a = SignalGenerator::new(Dictionary::shared(), profile, Some(7)).generate_text("CQ CQ");
        let b = SignalGenerator::new(Dictionary::shared(), profile, Some(7)).generate_text("CQ CQ");
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_variability() {
        assert!(SenderProfile::from_wpm(12.5, -0.1).is_err());
        assert!(SenderProfile::from_wpm(12.5, 1.5).is_err());
        assert!(SenderProfile::from_wpm(12.5, f64::NAN).is_err());
        assert!(SenderProfile::from_wpm(12.5, 1.0).is_ok());
    }

    #[test]
    fn test_profile_from_empty_stats() {
        let profile = SenderProfile::from_stats(&RollingStats::new(), 0.0).unwrap();
        assert_eq!(profile, SenderProfile::default());
    }

    #[test]
    fn test_profile_from_stats() {
        let mut stats = RollingStats::new();
        stats.add_dot(Duration::from_millis(60));
        stats.add_dash(Duration::from_millis(200));
        stats.add_mark_silence(Duration::from_millis(70));
        stats.add_char_silence(Duration::from_millis(300));

        let profile = SenderProfile::from_stats(&stats, 0.0).unwrap();
        assert_eq!(profile.dot_speed().dot_ms(), 60);
        assert_eq!(profile.dash_speed().dot_ms(), 66);
        assert_eq!(profile.mark_speed().dot_ms(), 70);
        assert_eq!(profile.char_speed().dot_ms(), 100);
        assert_eq!(profile.word_speed().dot_ms(), 100);
    }

    #[test]
    fn test_morse_signal_params() {
        let params = GeneratorParams {
            speed: WpmGroup::uniform(25.0),
            ..Default::default()
        };
        let signal = morse_signal("T", &params).unwrap();
        assert_eq!(durations(&signal), vec![(true, 144), (false, 144)]);

        let params = GeneratorParams {
            variability: 2.0,
            ..Default::default()
        };
        assert!(morse_signal("T", &params).is_err());
    }
}
