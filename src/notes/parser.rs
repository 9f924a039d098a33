//! Note-notation parser.
//!
//! Tokens look like `"C4/4"`: a pitch letter `A`-`G` (or `R` for a rest),
//! an optional `#` or `b` accidental, an octave digit `2`-`8`, a `/`, a
//! one- or two-digit fraction denominator, then an optional `.` (dotted)
//! and an optional `_` (tied). Rests carry neither accidental nor octave:
//! `"R/4"`.
//!
//! Parsing is a single left-to-right scan with one byte of lookahead and
//! performs no I/O.

use thiserror::Error;

use super::note::{Accidental, Note, PitchClass};

/// Reasons a note token can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// First character was not a pitch letter `A`-`G` or `R`.
    #[error("missing note name A-G or R")]
    MissingPitchName,
    /// Accidental spelling that does not name a pitch (`Cb`, `E#`, `Fb`, `B#`).
    #[error("'{spelling}' is not allowed")]
    InvalidAccidental { spelling: String },
    /// Pitch was not followed by an octave digit `2`-`8`.
    #[error("missing octave number 2-8")]
    MissingOctave,
    /// Octave was not followed by the `/` separator.
    #[error("missing '/'")]
    MissingSeparator,
    /// Separator was not followed by a fraction digit.
    #[error("missing fractional value 1, 2, 4, 8, etc.")]
    MissingDenominator,
}

/// Read-only cursor over the token bytes.
///
/// The grammar is plain ASCII, so scanning bytes is exact: any multi-byte
/// character simply fails the match for the rule being tried.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(token: &'a str) -> Self {
        Self {
            bytes: token.as_bytes(),
            pos: 0,
        }
    }

    /// Consumes and returns the next byte, if any.
    fn next(&mut self) -> Option<u8> {
        let byte = self.bytes.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    /// Consumes the next byte only when `accept` matches it.
    fn next_if(&mut self, accept: impl Fn(u8) -> bool) -> Option<u8> {
        match self.bytes.get(self.pos).copied() {
            Some(byte) if accept(byte) => {
                self.pos += 1;
                Some(byte)
            }
            _ => None,
        }
    }
}

/// Parses one note token into a [`Note`].
///
/// Same input always yields the same result. Characters past the grammar's
/// optional trailing decorations are ignored, and a missing character at
/// end-of-string counts as "not present" for every optional rule.
pub fn parse(token: &str) -> Result<Note, ParseError> {
    let mut scanner = Scanner::new(token);

    let pitch = match scanner.next() {
        Some(b'C') => PitchClass::C,
        Some(b'D') => PitchClass::D,
        Some(b'E') => PitchClass::E,
        Some(b'F') => PitchClass::F,
        Some(b'G') => PitchClass::G,
        Some(b'A') => PitchClass::A,
        Some(b'B') => PitchClass::B,
        Some(b'R') => PitchClass::Rest,
        _ => return Err(ParseError::MissingPitchName),
    };

    let mut accidental = Accidental::Natural;
    let mut octave = None;
    if pitch != PitchClass::Rest {
        if let Some(mark) = scanner.next_if(|b| b == b'#' || b == b'b') {
            accidental = if mark == b'#' {
                Accidental::Sharp
            } else {
                Accidental::Flat
            };
            if pitch.base_frequency(accidental).is_none() {
                return Err(ParseError::InvalidAccidental {
                    spelling: format!("{}{}", pitch, accidental),
                });
            }
        }

        let digit = scanner
            .next_if(|b| (b'2'..=b'8').contains(&b))
            .ok_or(ParseError::MissingOctave)?;
        octave = Some(digit - b'0');
    }

    if scanner.next_if(|b| b == b'/').is_none() {
        return Err(ParseError::MissingSeparator);
    }

    let first = scanner
        .next_if(|b| b.is_ascii_digit())
        .ok_or(ParseError::MissingDenominator)?;
    let mut denominator = first - b'0';
    if let Some(second) = scanner.next_if(|b| b.is_ascii_digit()) {
        denominator = denominator * 10 + (second - b'0');
    }

    // Optional decorations, dot before tie.
    let dotted = scanner.next_if(|b| b == b'.').is_some();
    let tied = scanner.next_if(|b| b == b'_').is_some();

    Ok(Note {
        pitch,
        accidental,
        octave,
        denominator,
        dotted,
        tied,
    })
}
