// Offline decoding of a recorded signal stream on virtual time

use std::sync::Arc;

use tracing::debug;

use crate::error::{MorseError, Result};
use crate::key::MorseKey;
use crate::runtime::VirtualTime;
use crate::types::{KeyParams, Signal, Token};

/// Decode a recorded on/off stream. Both decode timers are flushed after the
/// last signal, so a complete final word ends with [`Token::Space`].
///
/// A leading silence is allowed and simply delays the first mark.
pub fn decode_signals(signals: &[Signal], params: &KeyParams) -> Result<Vec<Token>> {
    check_alternating(signals)?;

    let time = Arc::new(VirtualTime::new());
    let (tx, rx) = crossbeam_channel::unbounded();
    let key = MorseKey::with_runtime(
        move |token: Token| {
            let _ = tx.send(token);
        },
        params,
        time.clone(),
        time.clone(),
    )?;

    for signal in signals {
        if signal.on {
            key.down();
            time.advance(signal.duration);
            key.up();
        } else {
            time.advance(signal.duration);
        }
    }
    time.run_until_idle();

    let tokens: Vec<Token> = rx.try_iter().collect();
    debug!(signals = signals.len(), tokens = tokens.len(), "replay finished");
    Ok(tokens)
}

/// Like [`decode_signals`], rendered as text.
pub fn decode_text(signals: &[Signal], params: &KeyParams) -> Result<String> {
    let tokens = decode_signals(signals, params)?;
    Ok(tokens.iter().map(Token::to_string).collect())
}

/// Parse a JSON array of `{"on": bool, "durationMs": number}` objects.
pub fn signals_from_json(json: &str) -> Result<Vec<Signal>> {
    Ok(serde_json::from_str(json)?)
}

fn check_alternating(signals: &[Signal]) -> Result<()> {
    for (index, pair) in signals.windows(2).enumerate() {
        if pair[0].on == pair[1].on {
            return Err(MorseError::NonAlternatingSignal {
                state: if pair[1].on { "on" } else { "off" },
                index: index + 1,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::morse_signal;
    use crate::types::{GeneratorParams, Prosign};
    use std::time::Duration;

    fn on(ms: u64) -> Signal {
        Signal::on(Duration::from_millis(ms))
    }

    fn off(ms: u64) -> Signal {
        Signal::off(Duration::from_millis(ms))
    }

    #[test]
    fn test_single_dot() {
        let tokens = decode_signals(&[on(96)], &KeyParams::default()).unwrap();
        assert_eq!(tokens, vec![Token::Character('E'), Token::Space]);
    }

    #[test]
    fn test_generated_text_round_trip() {
        let signal = morse_signal("SOS", &GeneratorParams::default()).unwrap();
        let text = decode_text(&signal, &KeyParams::default()).unwrap();
        assert_eq!(text, "SOS ");
    }

    #[test]
    fn test_boundary_prosign_suppresses_space() {
        let tokens = decode_signals(
            &[on(96), off(96), on(288), off(96), on(96), off(96), on(288)],
            &KeyParams::default(),
        )
        .unwrap();
        assert_eq!(tokens, vec![Token::Prosign(Prosign::Newline)]);
    }

    #[test]
    fn test_leading_silence_allowed() {
        let tokens = decode_signals(&[off(500), on(288)], &KeyParams::default()).unwrap();
        assert_eq!(tokens, vec![Token::Character('T'), Token::Space]);
    }

    #[test]
    fn test_non_alternating_rejected() {
        let err = decode_signals(&[on(96), off(96), off(96)], &KeyParams::default()).unwrap_err();
        assert!(matches!(
            err,
            MorseError::NonAlternatingSignal { state: "off", index: 2 }
        ));
    }

    #[test]
    fn test_signals_from_json() {
        let signals = signals_from_json(r#"[{"on":true,"durationMs":96},{"on":false,"durationMs":288.5}]"#).unwrap();
        assert_eq!(signals[0], on(96));
        assert_eq!(signals[1].duration, Duration::from_micros(288_500));
        assert!(signals_from_json(r#"[{"on":true,"durationMs":-1}]"#).is_err());
        assert!(signals_from_json("nope").is_err());
    }
}
