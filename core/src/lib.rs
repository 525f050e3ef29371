// Adaptive Morse key decoding
// Turns key-down / key-up timing into characters, tracking the sender's speed

pub mod dictionary;
pub mod error;
pub mod fallback;
pub mod key;
pub mod patterns;
pub mod replay;
pub mod runtime;
pub mod speed;
pub mod stats;
pub mod timing;
pub mod types;

// Re-export main public API
pub use dictionary::Dictionary;
pub use error::{MorseError, Result};
pub use fallback::{ClusterFallbackDecoder, FallbackDecode};
pub use key::{MorseKey, MorseListener};
pub use patterns::PARIS_LENGTH;
pub use replay::{decode_signals, decode_text, signals_from_json};
pub use runtime::{Clock, Scheduler, SystemClock, ThreadScheduler, TimerHandle, VirtualTime};
pub use speed::{Speed, SpeedGroup};
pub use stats::RollingStats;
pub use timing::{morse_signal, SenderProfile, SignalGenerator};
pub use types::*;

// Public API for direct Rust usage
pub fn generate_morse_signal(text: &str, params: &GeneratorParams) -> Result<Vec<Signal>> {
    timing::morse_signal(text, params)
}

pub fn decode_morse_signals(signals: &[Signal], params: &KeyParams) -> Result<Vec<Token>> {
    replay::decode_signals(signals, params)
}

/// Render `text` and decode it straight back, as a receiver at `key`
/// settings would hear it.
pub fn round_trip_text(text: &str, sender: &GeneratorParams, key: &KeyParams) -> Result<String> {
    let signal = timing::morse_signal(text, sender)?;
    replay::decode_text(&signal, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_signal() {
        let params = GeneratorParams::default();
        let result = generate_morse_signal("E", &params).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result[0].on);
        assert!(!result[1].on);
    }

    #[test]
    fn test_wpm_affects_timing() {
        let fast = GeneratorParams {
            speed: WpmGroup::uniform(25.0),
            ..Default::default()
        };
        let slow = GeneratorParams {
            speed: WpmGroup::uniform(10.0),
            ..Default::default()
        };

        let fast_result = generate_morse_signal("E", &fast).unwrap();
        let slow_result = generate_morse_signal("E", &slow).unwrap();

        assert!(fast_result[0].duration < slow_result[0].duration);
    }

    #[test]
    fn test_decode_signals() {
        let signal = generate_morse_signal("CQ", &GeneratorParams::default()).unwrap();
        let tokens = decode_morse_signals(&signal, &KeyParams::default()).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Character('C'), Token::Character('Q'), Token::Space]
        );
    }

    #[test]
    fn test_round_trip_text() {
        let text = round_trip_text("paris", &GeneratorParams::default(), &KeyParams::default()).unwrap();
        assert_eq!(text, "PARIS ");
    }
}
