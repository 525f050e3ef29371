use thiserror::Error;

/// Errors produced by morsekey-core.
///
/// Only bad configuration input is reported this way. A code pattern the
/// dictionary does not know is a normal outcome and never an error.
#[derive(Debug, Error)]
pub enum MorseError {
    #[error("invalid speed: {0} wpm (must be finite and positive)")]
    InvalidSpeed(f64),

    #[error("variability must lie within [0, 1], got {0}")]
    InvalidVariability(f64),

    #[error("{channel} speed floor ({floor_wpm:.2} wpm) is faster than its ceiling ({ceiling_wpm:.2} wpm)")]
    InvalidSpeedRange {
        channel: &'static str,
        floor_wpm: f64,
        ceiling_wpm: f64,
    },

    #[error("signal stream must alternate on/off, found two consecutive {state} signals at index {index}")]
    NonAlternatingSignal { state: &'static str, index: usize },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MorseError>;
