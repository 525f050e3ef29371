// Bidirectional code dictionary: a binary trie for decoding, table lookups for encoding
// A node carries a character and a prosign slot; `-...-` is both `=` and <BT>, decoding prefers `=`

use std::sync::OnceLock;

use crate::patterns::{self, MorsePattern};
use crate::types::{code_string, Prosign, Symbol, Token};

const ROOT: usize = 0;

static SHARED: OnceLock<Dictionary> = OnceLock::new();

#[derive(Debug, Clone, Default)]
struct Node {
    children: [Option<usize>; 2],
    character: Option<char>,
    prosign: Option<Prosign>,
}

impl Node {
    fn token(&self) -> Option<Token> {
        self.character
            .map(Token::Character)
            .or(self.prosign.map(Token::Prosign))
    }
}

#[derive(Debug, Clone)]
pub struct Dictionary {
    nodes: Vec<Node>,
    entries: usize,
}

impl Dictionary {
    /// Build the trie from the static character and prosign tables.
    ///
    /// # Panics
    /// If two characters or two prosigns share a pattern. That is a defect
    /// in the tables, not bad input.
    pub fn new() -> Self {
        let mut dictionary = Self {
            nodes: vec![Node::default()],
            entries: 0,
        };

        for (ch, code) in patterns::characters() {
            dictionary.insert(code, Token::Character(ch));
        }
        for prosign in Prosign::ALL {
            dictionary.insert(patterns::prosign_pattern(prosign), Token::Prosign(prosign));
        }

        dictionary
    }

    /// The process-wide dictionary, built on first use.
    pub fn shared() -> &'static Dictionary {
        SHARED.get_or_init(Dictionary::new)
    }

    fn insert(&mut self, code: MorsePattern, token: Token) {
        assert!(!code.is_empty(), "{token:?} has an empty pattern");

        let mut node = ROOT;
        for symbol in code {
            let branch = symbol.branch();
            let existing = self.nodes[node].children[branch];
            node = match existing {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node].children[branch] = Some(child);
                    child
                }
            };
        }

        let slot = &mut self.nodes[node];
        let taken = match token {
            Token::Character(ch) => slot.character.replace(ch).map(Token::Character),
            Token::Prosign(prosign) => slot.prosign.replace(prosign).map(Token::Prosign),
            Token::Space => None,
        };
        assert!(
            taken.is_none(),
            "pattern {} assigned to both {:?} and {:?}",
            code_string(code),
            taken,
            token
        );
        self.entries += 1;
    }

    /// Decode a full pattern. There is no prefix matching: the pattern must
    /// end exactly on a node that carries a token.
    pub fn lookup(&self, code: &[Symbol]) -> Option<Token> {
        let mut node = ROOT;
        for symbol in code {
            node = self.nodes[node].children[symbol.branch()]?;
        }
        self.nodes[node].token()
    }

    /// Encode a token. Space has no pattern of its own.
    pub fn encode(&self, token: &Token) -> Option<MorsePattern> {
        match token {
            Token::Character(ch) => patterns::get_morse_pattern(*ch),
            Token::Prosign(prosign) => Some(patterns::prosign_pattern(*prosign)),
            Token::Space => None,
        }
    }

    /// Number of table entries, shadowed prosigns included.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Every table entry with its pattern.
    pub fn entries(&self) -> impl Iterator<Item = (Token, MorsePattern)> + '_ {
        patterns::characters()
            .map(|(ch, code)| (Token::Character(ch), code))
            .chain(
                Prosign::ALL
                    .into_iter()
                    .map(|p| (Token::Prosign(p), patterns::prosign_pattern(p))),
            )
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Symbol::{Dash, Dot};

    #[test]
    fn test_counts() {
        let dictionary = Dictionary::new();
        assert_eq!(dictionary.len(), 48 + 9);
    }

    #[test]
    fn test_round_trip_every_entry() {
        let dictionary = Dictionary::new();
        for (token, code) in dictionary.entries() {
            assert_eq!(dictionary.encode(&token), Some(code), "encode {token:?}");
            if token != Token::Prosign(Prosign::Paragraph) {
                assert_eq!(dictionary.lookup(code), Some(token), "decode {}", code_string(code));
            }
        }
    }

    #[test]
    fn test_character_shadows_prosign() {
        let dictionary = Dictionary::new();
        let code = dictionary.encode(&Token::Prosign(Prosign::Paragraph)).unwrap();
        assert_eq!(dictionary.encode(&Token::Character('=')), Some(code));
        assert_eq!(dictionary.lookup(code), Some(Token::Character('=')));
    }

    #[test]
    fn test_lookup() {
        let dictionary = Dictionary::new();
        assert_eq!(dictionary.lookup(&[Dot]), Some(Token::Character('E')));
        assert_eq!(dictionary.lookup(&[Dot, Dash]), Some(Token::Character('A')));
        assert_eq!(
            dictionary.lookup(&[Dot, Dot, Dot, Dash, Dash, Dash, Dot, Dot, Dot]),
            Some(Token::Prosign(Prosign::Sos))
        );
    }

    #[test]
    fn test_no_partial_match() {
        let dictionary = Dictionary::new();
        // interior node with no token of its own
        assert_eq!(dictionary.lookup(&[Dot, Dot, Dash, Dash]), None);
        // walks off the trie
        assert_eq!(dictionary.lookup(&[Dash; 6]), None);
        assert_eq!(dictionary.lookup(&[]), None);
    }

    #[test]
    fn test_encode_misses() {
        let dictionary = Dictionary::new();
        assert_eq!(dictionary.encode(&Token::Space), None);
        assert_eq!(dictionary.encode(&Token::Character('#')), None);
        assert_eq!(dictionary.encode(&Token::Character('a')), None);
    }

    #[test]
    fn test_shared_is_built_once() {
        assert!(std::ptr::eq(Dictionary::shared(), Dictionary::shared()));
        assert_eq!(Dictionary::shared().len(), 57);
    }
}
