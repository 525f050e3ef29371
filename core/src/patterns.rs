// Morse code pattern tables - O(1) character-to-pattern mapping
// Each pattern is a sequence of dots (1 unit) and dashes (3 units)
use crate::types::{Prosign, Symbol};

pub type MorsePattern = &'static [Symbol];

const DOT: Symbol = Symbol::Dot;
const DASH: Symbol = Symbol::Dash;

/// Silence between marks inside one character, in dot units.
pub const MARK_GAP_UNITS: u32 = 1;
/// Silence between characters, in dot units.
pub const CHAR_GAP_UNITS: u32 = 3;
/// Silence between words, in dot units.
pub const WORD_GAP_UNITS: u32 = 7;

// Letter patterns
const PATTERN_A: MorsePattern = &[DOT, DASH]; // .-
const PATTERN_B: MorsePattern = &[DASH, DOT, DOT, DOT]; // -...
const PATTERN_C: MorsePattern = &[DASH, DOT, DASH, DOT]; // -.-.
const PATTERN_D: MorsePattern = &[DASH, DOT, DOT]; // -..
const PATTERN_E: MorsePattern = &[DOT]; // .
const PATTERN_F: MorsePattern = &[DOT, DOT, DASH, DOT]; // ..-.
const PATTERN_G: MorsePattern = &[DASH, DASH, DOT]; // --.
const PATTERN_H: MorsePattern = &[DOT, DOT, DOT, DOT]; // ....
const PATTERN_I: MorsePattern = &[DOT, DOT]; // ..
const PATTERN_J: MorsePattern = &[DOT, DASH, DASH, DASH]; // .---
const PATTERN_K: MorsePattern = &[DASH, DOT, DASH]; // -.-
const PATTERN_L: MorsePattern = &[DOT, DASH, DOT, DOT]; // .-..
const PATTERN_M: MorsePattern = &[DASH, DASH]; // --
const PATTERN_N: MorsePattern = &[DASH, DOT]; // -.
const PATTERN_O: MorsePattern = &[DASH, DASH, DASH]; // ---
const PATTERN_P: MorsePattern = &[DOT, DASH, DASH, DOT]; // .--.
const PATTERN_Q: MorsePattern = &[DASH, DASH, DOT, DASH]; // --.-
const PATTERN_R: MorsePattern = &[DOT, DASH, DOT]; // .-.
const PATTERN_S: MorsePattern = &[DOT, DOT, DOT]; // ...
const PATTERN_T: MorsePattern = &[DASH]; // -
const PATTERN_U: MorsePattern = &[DOT, DOT, DASH]; // ..-
const PATTERN_V: MorsePattern = &[DOT, DOT, DOT, DASH]; // ...-
const PATTERN_W: MorsePattern = &[DOT, DASH, DASH]; // .--
const PATTERN_X: MorsePattern = &[DASH, DOT, DOT, DASH]; // -..-
const PATTERN_Y: MorsePattern = &[DASH, DOT, DASH, DASH]; // -.--
const PATTERN_Z: MorsePattern = &[DASH, DASH, DOT, DOT]; // --..

// Number patterns
const PATTERN_0: MorsePattern = &[DASH, DASH, DASH, DASH, DASH]; // -----
const PATTERN_1: MorsePattern = &[DOT, DASH, DASH, DASH, DASH]; // .----
const PATTERN_2: MorsePattern = &[DOT, DOT, DASH, DASH, DASH]; // ..---
const PATTERN_3: MorsePattern = &[DOT, DOT, DOT, DASH, DASH]; // ...--
const PATTERN_4: MorsePattern = &[DOT, DOT, DOT, DOT, DASH]; // ....-
const PATTERN_5: MorsePattern = &[DOT, DOT, DOT, DOT, DOT]; // .....
const PATTERN_6: MorsePattern = &[DASH, DOT, DOT, DOT, DOT]; // -....
const PATTERN_7: MorsePattern = &[DASH, DASH, DOT, DOT, DOT]; // --...
const PATTERN_8: MorsePattern = &[DASH, DASH, DASH, DOT, DOT]; // ---..
const PATTERN_9: MorsePattern = &[DASH, DASH, DASH, DASH, DOT]; // ----.

// Punctuation patterns
const PATTERN_PERIOD: MorsePattern = &[DOT, DASH, DOT, DASH, DOT, DASH]; // .-.-.-
const PATTERN_COMMA: MorsePattern = &[DASH, DASH, DOT, DOT, DASH, DASH]; // --..--
const PATTERN_COLON: MorsePattern = &[DASH, DASH, DASH, DOT, DOT, DOT]; // ---...
const PATTERN_QUESTION: MorsePattern = &[DOT, DOT, DASH, DASH, DOT, DOT]; // ..--..
const PATTERN_QUOTE: MorsePattern = &[DOT, DASH, DASH, DASH, DASH, DOT]; // .----.
const PATTERN_HYPHEN: MorsePattern = &[DASH, DOT, DOT, DOT, DOT, DASH]; // -....-
const PATTERN_SLASH: MorsePattern = &[DASH, DOT, DOT, DASH, DOT]; // -..-.
const PATTERN_LPAREN: MorsePattern = &[DASH, DOT, DASH, DASH, DOT]; // -.--.
const PATTERN_RPAREN: MorsePattern = &[DASH, DOT, DASH, DASH, DOT, DASH]; // -.--.-
const PATTERN_DQUOTE: MorsePattern = &[DOT, DASH, DOT, DOT, DASH, DOT]; // .-..-.
const PATTERN_AT: MorsePattern = &[DOT, DASH, DASH, DOT, DASH, DOT]; // .--.-.
const PATTERN_EQUALS: MorsePattern = &[DASH, DOT, DOT, DOT, DASH]; // -...-

// Prosign patterns (sent as one character, no inter-letter gap)
const PATTERN_NEWLINE: MorsePattern = &[DOT, DASH, DOT, DASH]; // .-.-
const PATTERN_END_OF_MESSAGE: MorsePattern = &[DOT, DASH, DOT, DASH, DOT]; // .-.-.
const PATTERN_WAIT: MorsePattern = &[DOT, DASH, DOT, DOT, DOT]; // .-...
const PATTERN_BREAK: MorsePattern = &[DASH, DOT, DOT, DOT, DASH, DOT, DASH]; // -...-.-
const PATTERN_PARAGRAPH: MorsePattern = &[DASH, DOT, DOT, DOT, DASH]; // -...-
const PATTERN_CLEAR: MorsePattern = &[DASH, DOT, DASH, DOT, DOT, DASH, DOT, DOT]; // -.-..-..
const PATTERN_START_COPYING: MorsePattern = &[DASH, DOT, DASH, DOT, DASH]; // -.-.-
const PATTERN_SOS: MorsePattern = &[DOT, DOT, DOT, DASH, DASH, DASH, DOT, DOT, DOT]; // ...---...
const PATTERN_STRIKE: MorsePattern = &[DOT, DOT, DOT, DOT, DOT, DOT, DOT, DOT]; // ........

// Direct lookup table for O(1) access - 256 entries for all possible bytes.
// Only upper-case letters are present so that every entry round-trips.
static MORSE_PATTERNS: [Option<MorsePattern>; 256] = {
    let mut patterns = [None; 256];

    // Letters
    patterns[b'A' as usize] = Some(PATTERN_A);
    patterns[b'B' as usize] = Some(PATTERN_B);
    patterns[b'C' as usize] = Some(PATTERN_C);
    patterns[b'D' as usize] = Some(PATTERN_D);
    patterns[b'E' as usize] = Some(PATTERN_E);
    patterns[b'F' as usize] = Some(PATTERN_F);
    patterns[b'G' as usize] = Some(PATTERN_G);
    patterns[b'H' as usize] = Some(PATTERN_H);
    patterns[b'I' as usize] = Some(PATTERN_I);
    patterns[b'J' as usize] = Some(PATTERN_J);
    patterns[b'K' as usize] = Some(PATTERN_K);
    patterns[b'L' as usize] = Some(PATTERN_L);
    patterns[b'M' as usize] = Some(PATTERN_M);
    patterns[b'N' as usize] = Some(PATTERN_N);
    patterns[b'O' as usize] = Some(PATTERN_O);
    patterns[b'P' as usize] = Some(PATTERN_P);
    patterns[b'Q' as usize] = Some(PATTERN_Q);
    patterns[b'R' as usize] = Some(PATTERN_R);
    patterns[b'S' as usize] = Some(PATTERN_S);
    patterns[b'T' as usize] = Some(PATTERN_T);
    patterns[b'U' as usize] = Some(PATTERN_U);
    patterns[b'V' as usize] = Some(PATTERN_V);
    patterns[b'W' as usize] = Some(PATTERN_W);
    patterns[b'X' as usize] = Some(PATTERN_X);
    patterns[b'Y' as usize] = Some(PATTERN_Y);
    patterns[b'Z' as usize] = Some(PATTERN_Z);

    // Numbers
    patterns[b'0' as usize] = Some(PATTERN_0);
    patterns[b'1' as usize] = Some(PATTERN_1);
    patterns[b'2' as usize] = Some(PATTERN_2);
    patterns[b'3' as usize] = Some(PATTERN_3);
    patterns[b'4' as usize] = Some(PATTERN_4);
    patterns[b'5' as usize] = Some(PATTERN_5);
    patterns[b'6' as usize] = Some(PATTERN_6);
    patterns[b'7' as usize] = Some(PATTERN_7);
    patterns[b'8' as usize] = Some(PATTERN_8);
    patterns[b'9' as usize] = Some(PATTERN_9);

    // Punctuation
    patterns[b'.' as usize] = Some(PATTERN_PERIOD);
    patterns[b',' as usize] = Some(PATTERN_COMMA);
    patterns[b':' as usize] = Some(PATTERN_COLON);
    patterns[b'?' as usize] = Some(PATTERN_QUESTION);
    patterns[b'\'' as usize] = Some(PATTERN_QUOTE);
    patterns[b'-' as usize] = Some(PATTERN_HYPHEN);
    patterns[b'/' as usize] = Some(PATTERN_SLASH);
    patterns[b'(' as usize] = Some(PATTERN_LPAREN);
    patterns[b')' as usize] = Some(PATTERN_RPAREN);
    patterns[b'"' as usize] = Some(PATTERN_DQUOTE);
    patterns[b'@' as usize] = Some(PATTERN_AT);
    patterns[b'=' as usize] = Some(PATTERN_EQUALS);

    patterns
};

/// Get morse pattern for a character - O(1) lookup
pub fn get_morse_pattern(ch: char) -> Option<MorsePattern> {
    if ch.is_ascii() {
        MORSE_PATTERNS[ch as usize]
    } else {
        None
    }
}

/// Get the morse pattern of a procedural sign
pub const fn prosign_pattern(prosign: Prosign) -> MorsePattern {
    match prosign {
        Prosign::Newline => PATTERN_NEWLINE,
        Prosign::EndOfMessage => PATTERN_END_OF_MESSAGE,
        Prosign::Wait => PATTERN_WAIT,
        Prosign::Break => PATTERN_BREAK,
        Prosign::Paragraph => PATTERN_PARAGRAPH,
        Prosign::Clear => PATTERN_CLEAR,
        Prosign::StartCopying => PATTERN_START_COPYING,
        Prosign::Sos => PATTERN_SOS,
        Prosign::Strike => PATTERN_STRIKE,
    }
}

/// Every printing character that has a pattern, in table order.
pub fn characters() -> impl Iterator<Item = (char, MorsePattern)> {
    MORSE_PATTERNS
        .iter()
        .enumerate()
        .filter_map(|(byte, pattern)| pattern.map(|p| (byte as u8 as char, p)))
}

/// One group of a signal whose length is being measured.
#[derive(Debug, Clone, Copy)]
pub enum CodeGroup {
    Code(MorsePattern),
    /// An inter-word space; it replaces the preceding inter-character gap.
    Space,
}

/// Length of one character in dot units, including its intra-character
/// gaps but no trailing gap.
pub const fn char_length(code: &[Symbol]) -> u32 {
    if code.is_empty() {
        return 0;
    }
    let mut length = 0;
    let mut i = 0;
    while i < code.len() {
        length += code[i].units() + MARK_GAP_UNITS;
        i += 1;
    }
    length - MARK_GAP_UNITS
}

/// Length of a run of characters and spaces in dot units. Every character
/// is followed by an inter-character gap; a space widens the gap before it
/// to a full word gap instead of stacking on it.
pub const fn signal_length(groups: &[CodeGroup]) -> u32 {
    let mut length = 0;
    let mut i = 0;
    while i < groups.len() {
        match groups[i] {
            CodeGroup::Code(code) => length += char_length(code) + CHAR_GAP_UNITS,
            CodeGroup::Space => length += WORD_GAP_UNITS - CHAR_GAP_UNITS,
        }
        i += 1;
    }
    length
}

/// Length of the calibration word "PARIS " in dot units.
pub const PARIS_LENGTH: u32 = signal_length(&[
    CodeGroup::Code(PATTERN_P),
    CodeGroup::Code(PATTERN_A),
    CodeGroup::Code(PATTERN_R),
    CodeGroup::Code(PATTERN_I),
    CodeGroup::Code(PATTERN_S),
    CodeGroup::Space,
]);
