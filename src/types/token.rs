//! Token classification for the symbolic music vocabulary.
//!
//! A token's category is derived purely from its text. The generation
//! vocabulary uses:
//!
//! - `NOTE_<pitch>`: a MIDI pitch (0-127) opening a new note
//! - `DUR_<units>`: note length in grid units
//! - `VEL_<bucket>`: velocity bucket
//! - `POS_<offset>`: grid offset inside the current bar
//! - `BAR`: bar delimiter
//! - `EOS`: end of sequence
//! - `BPM_<tempo>`, `KEY_*`, ...: seed-only control tokens

/// Padding token. Unknown tokens map to its id.
pub const PAD_TOKEN: &str = "<pad>";

/// End-of-sequence token.
pub const EOS_TOKEN: &str = "EOS";

/// Bar delimiter token.
pub const BAR_TOKEN: &str = "BAR";

/// Tempo used when no valid `BPM_*` token is present.
pub const DEFAULT_BPM: u32 = 120;

/// Seed used when a caller supplies no seed tokens at all.
pub const DEFAULT_SEED_TOKENS: [&str; 2] = ["BPM_120", "BAR"];

/// Category of a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind<'a> {
    /// `NOTE_<pitch>`
    Note(u8),
    /// `DUR_<grid units>`
    Duration(u32),
    /// `VEL_<bucket>`
    Velocity(u32),
    /// `POS_<grid offset>`
    Position(u32),
    /// `BPM_<tempo>`
    Tempo(u32),
    /// `BAR`
    Bar,
    /// `EOS`
    Eos,
    /// Other upper-case prefixed control token, e.g. `KEY_C`.
    Control(&'a str),
    /// Anything else, including numeric tokens with unparseable values.
    Unknown,
}

impl<'a> TokenKind<'a> {
    /// Classifies a token by its text.
    pub fn classify(token: &'a str) -> Self {
        match token {
            BAR_TOKEN => return TokenKind::Bar,
            EOS_TOKEN => return TokenKind::Eos,
            _ => {}
        }

        let Some((prefix, value)) = token.split_once('_') else {
            return TokenKind::Unknown;
        };

        match prefix {
            "NOTE" => match parse_digits::<u8>(value) {
                Some(pitch) if pitch <= 127 => TokenKind::Note(pitch),
                _ => TokenKind::Unknown,
            },
            "DUR" => parse_digits(value).map_or(TokenKind::Unknown, TokenKind::Duration),
            "VEL" => parse_digits(value).map_or(TokenKind::Unknown, TokenKind::Velocity),
            "POS" => parse_digits(value).map_or(TokenKind::Unknown, TokenKind::Position),
            "BPM" => match parse_digits::<u32>(value) {
                Some(bpm) if bpm > 0 => TokenKind::Tempo(bpm),
                _ => TokenKind::Unknown,
            },
            p if !p.is_empty() && p.chars().all(|c| c.is_ascii_uppercase()) => {
                TokenKind::Control(token)
            }
            _ => TokenKind::Unknown,
        }
    }

    /// Returns true for `NOTE_*` tokens.
    pub fn is_note(&self) -> bool {
        matches!(self, TokenKind::Note(_))
    }
}

/// Parses an all-digit suffix. Signs, whitespace, and empty strings are rejected.
fn parse_digits<T: std::str::FromStr>(value: &str) -> Option<T> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Returns the tempo of the first valid `BPM_*` token, or `default`.
pub fn parse_bpm<S: AsRef<str>>(tokens: &[S], default: u32) -> u32 {
    tokens
        .iter()
        .find_map(|t| match TokenKind::classify(t.as_ref()) {
            TokenKind::Tempo(bpm) => Some(bpm),
            _ => None,
        })
        .unwrap_or(default)
}

/// Counts bar delimiters.
pub fn count_bars<S: AsRef<str>>(tokens: &[S]) -> usize {
    tokens.iter().filter(|t| t.as_ref() == BAR_TOKEN).count()
}

/// Returns the given seed, or the default seed when it is empty.
pub fn seed_or_default(seed_tokens: Vec<String>) -> Vec<String> {
    if seed_tokens.is_empty() {
        DEFAULT_SEED_TOKENS.iter().map(|t| t.to_string()).collect()
    } else {
        seed_tokens
    }
}
