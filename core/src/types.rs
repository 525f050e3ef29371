use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One element of a code pattern. The discriminant is the element's length
/// in dot units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Symbol {
    Dot = 1,
    Dash = 3,
}

impl Symbol {
    /// Length of this element in dot units.
    pub const fn units(self) -> u32 {
        self as u32
    }

    pub(crate) const fn branch(self) -> usize {
        match self {
            Symbol::Dot => 0,
            Symbol::Dash => 1,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Dot => f.write_str("."),
            Symbol::Dash => f.write_str("-"),
        }
    }
}

/// Render a code pattern as dots and dashes, e.g. `.-`.
pub fn code_string(code: &[Symbol]) -> String {
    code.iter().map(|s| s.to_string()).collect()
}

/// An atomic timed mark (`on`) or silence.
///
/// A stream of signals on the wire always starts with a mark and strictly
/// alternates on/off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub on: bool,
    #[serde(rename = "durationMs", with = "duration_ms")]
    pub duration: Duration,
}

impl Signal {
    pub const fn on(duration: Duration) -> Self {
        Self { on: true, duration }
    }

    pub const fn off(duration: Duration) -> Self {
        Self {
            on: false,
            duration,
        }
    }

    /// Duration in (fractional) milliseconds.
    pub fn millis(&self) -> f64 {
        self.duration.as_nanos() as f64 / 1_000_000.0
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.on { "ON" } else { "OFF" };
        write!(f, "[{}:{}]", state, self.duration.as_millis())
    }
}

/// Serialise a `Duration` as a float number of milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_nanos() as f64 / 1_000_000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "duration must be a non-negative number of milliseconds, got {ms}"
            )));
        }
        Ok(Duration::from_nanos((ms * 1_000_000.0).round() as u64))
    }
}

/// Procedural signs: non-printing codes with a conventional meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Prosign {
    /// Start a new line.
    Newline,
    /// Message is ending.
    EndOfMessage,
    /// Wait.
    Wait,
    /// Done sending for now.
    Break,
    /// Start a new paragraph.
    Paragraph,
    /// Station closing.
    Clear,
    /// Important transmission commencing.
    StartCopying,
    /// Distress.
    Sos,
    /// The previous word was wrong; correct text follows.
    Strike,
}

impl Prosign {
    pub const ALL: [Prosign; 9] = [
        Prosign::Newline,
        Prosign::EndOfMessage,
        Prosign::Wait,
        Prosign::Break,
        Prosign::Paragraph,
        Prosign::Clear,
        Prosign::StartCopying,
        Prosign::Sos,
        Prosign::Strike,
    ];

    /// The conventional letter pair for this sign (sent run together).
    pub const fn letters(self) -> &'static str {
        match self {
            Prosign::Newline => "AA",
            Prosign::EndOfMessage => "AR",
            Prosign::Wait => "AS",
            Prosign::Break => "BK",
            Prosign::Paragraph => "BT",
            Prosign::Clear => "CL",
            Prosign::StartCopying => "CT",
            Prosign::Sos => "SOS",
            Prosign::Strike => "HH",
        }
    }

    /// Signs that already imply a layout boundary, so no inter-word space
    /// should follow them.
    pub const fn implies_boundary(self) -> bool {
        matches!(self, Prosign::Newline | Prosign::Paragraph | Prosign::Strike)
    }
}

impl fmt::Display for Prosign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.letters())
    }
}

/// One decoded (or to-be-encoded) unit of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Token {
    Character(char),
    Prosign(Prosign),
    /// Inter-word boundary.
    Space,
}

impl Token {
    /// True for Morse white space: a word space, a newline or a paragraph.
    pub fn is_whitespace(&self) -> bool {
        matches!(
            self,
            Token::Space | Token::Prosign(Prosign::Newline) | Token::Prosign(Prosign::Paragraph)
        )
    }

    /// Map one input character to the token that renders it.
    ///
    /// Letters are folded to upper case; `'\n'` and `'\t'` stand for the
    /// newline and paragraph signs. Whether the result has a code is up to
    /// the dictionary.
    pub fn from_char(ch: char) -> Token {
        match ch {
            ' ' => Token::Space,
            '\n' => Token::Prosign(Prosign::Newline),
            '\t' => Token::Prosign(Prosign::Paragraph),
            c => Token::Character(c.to_ascii_uppercase()),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Character(c) => write!(f, "{c}"),
            Token::Prosign(p) => write!(f, "{p}"),
            Token::Space => f.write_str(" "),
        }
    }
}

impl From<Prosign> for Token {
    fn from(prosign: Prosign) -> Self {
        Token::Prosign(prosign)
    }
}

/// Three speeds in words per minute: marks, inter-character gaps and
/// inter-word gaps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WpmGroup {
    pub mark: f64,
    pub char: f64,
    pub word: f64,
}

impl WpmGroup {
    pub const fn uniform(wpm: f64) -> Self {
        Self {
            mark: wpm,
            char: wpm,
            word: wpm,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyParams {
    /// Re-tune the expected speeds from incoming timing.
    pub adaptive: bool,
    pub initial_speed: WpmGroup,
    pub floor_wpm: WpmGroup,
    pub ceiling_wpm: WpmGroup,
    /// Silences at least this long end the session instead of being
    /// recorded. Never shorter than 1.5 word spaces at the word speed.
    pub max_interword_ms: u64,
}

impl Default for KeyParams {
    fn default() -> Self {
        Self {
            adaptive: true,
            initial_speed: WpmGroup {
                mark: 12.5,
                char: 12.5,
                word: 10.0,
            },
            floor_wpm: WpmGroup::uniform(7.5),
            ceiling_wpm: WpmGroup::uniform(25.0),
            max_interword_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorParams {
    pub speed: WpmGroup,
    /// Each duration is scaled by a uniform factor in
    /// `[1 - variability, 1 + variability]`.
    pub variability: f64,
    /// Seed for the jitter source; `None` seeds from the OS.
    pub random_seed: Option<u64>,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            speed: WpmGroup::uniform(12.5),
            variability: 0.0,
            random_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_display() {
        assert_eq!(Token::Character('E').to_string(), "E");
        assert_eq!(Token::Space.to_string(), " ");
        assert_eq!(Token::Prosign(Prosign::Sos).to_string(), "<SOS>");
        assert_eq!(Token::Prosign(Prosign::EndOfMessage).to_string(), "<AR>");
    }

    #[test]
    fn test_whitespace_tokens() {
        assert!(Token::Space.is_whitespace());
        assert!(Token::Prosign(Prosign::Newline).is_whitespace());
        assert!(Token::Prosign(Prosign::Paragraph).is_whitespace());
        assert!(!Token::Prosign(Prosign::Strike).is_whitespace());
        assert!(!Token::Character('A').is_whitespace());
    }

    #[test]
    fn test_from_char_aliases() {
        assert_eq!(Token::from_char('a'), Token::Character('A'));
        assert_eq!(Token::from_char(' '), Token::Space);
        assert_eq!(Token::from_char('\n'), Token::Prosign(Prosign::Newline));
        assert_eq!(Token::from_char('\t'), Token::Prosign(Prosign::Paragraph));
    }

    #[test]
    fn test_signal_json_shape() {
        let signal = Signal::on(Duration::from_millis(96));
        let json = serde_json::to_string(&signal).unwrap();
        assert_eq!(json, r#"{"on":true,"durationMs":96.0}"#);

        let back: Signal = serde_json::from_str(r#"{"on":false,"durationMs":288}"#).unwrap();
        assert_eq!(back, Signal::off(Duration::from_millis(288)));

        assert!(serde_json::from_str::<Signal>(r#"{"on":false,"durationMs":-1}"#).is_err());
    }

    #[test]
    fn test_params_defaults_fill_missing_fields() {
        let params: KeyParams = serde_json::from_str(r#"{"adaptive":false}"#).unwrap();
        assert!(!params.adaptive);
        assert_eq!(params.max_interword_ms, 3000);
        assert_eq!(params.floor_wpm, WpmGroup::uniform(7.5));

        let gen: GeneratorParams = serde_json::from_str(r#"{"randomSeed":7}"#).unwrap();
        assert_eq!(gen.random_seed, Some(7));
        assert_eq!(gen.speed, WpmGroup::uniform(12.5));
    }
}
