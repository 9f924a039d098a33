//! Parsed note representation.
//!
//! A note is the value produced by the notation parser: a pitch class with
//! an optional accidental, an octave, and a fractional duration with
//! optional dot and tie decorations. Notes are plain immutable values;
//! timing is applied later by the sequencer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven pitch letters plus a rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
    /// A rest: silence for the note's duration.
    Rest,
}

/// Accidental attached to a pitch letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accidental {
    Natural,
    Sharp,
    Flat,
}

impl PitchClass {
    /// Octave-0 anchor frequency in hertz for this pitch with the given
    /// accidental.
    ///
    /// Returns `None` for the spellings that do not name a distinct pitch
    /// (`Cb`, `E#`, `Fb`, `B#`) and for accidentals on rests. Enharmonic
    /// pairs (`C#`/`Db`, etc.) share a single value.
    pub fn base_frequency(self, accidental: Accidental) -> Option<f64> {
        use Accidental::{Flat, Natural, Sharp};
        use PitchClass::{Rest, A, B, C, D, E, F, G};

        let hz = match (self, accidental) {
            (C, Natural) => 16.35,
            (C, Sharp) | (D, Flat) => 17.32,
            (D, Natural) => 18.35,
            (D, Sharp) | (E, Flat) => 19.45,
            (E, Natural) => 20.60,
            (F, Natural) => 21.83,
            (F, Sharp) | (G, Flat) => 23.12,
            (G, Natural) => 24.50,
            (G, Sharp) | (A, Flat) => 25.96,
            (A, Natural) => 27.50,
            (A, Sharp) | (B, Flat) => 29.14,
            (B, Natural) => 30.87,
            (Rest, Natural) => 0.0,
            _ => return None,
        };
        Some(hz)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            PitchClass::C => 'C',
            PitchClass::D => 'D',
            PitchClass::E => 'E',
            PitchClass::F => 'F',
            PitchClass::G => 'G',
            PitchClass::A => 'A',
            PitchClass::B => 'B',
            PitchClass::Rest => 'R',
        };
        write!(f, "{}", letter)
    }
}

impl fmt::Display for Accidental {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accidental::Natural => Ok(()),
            Accidental::Sharp => write!(f, "#"),
            Accidental::Flat => write!(f, "b"),
        }
    }
}

/// A single parsed note.
///
/// Produced by [`parse`](crate::notes::parse) and consumed exactly once by
/// the sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Pitch letter, or [`PitchClass::Rest`].
    pub pitch: PitchClass,

    /// Sharp or flat mark. Always [`Accidental::Natural`] for rests.
    pub accidental: Accidental,

    /// Octave number 2-8. `None` for rests, which carry no octave.
    pub octave: Option<u8>,

    /// Fractional size of the note, e.g. 4 = quarter note.
    pub denominator: u8,

    /// A dotted note has its duration extended by half.
    pub dotted: bool,

    /// A tied note is held for its full duration with no release gap.
    pub tied: bool,
}

impl Note {
    /// Returns true for rests.
    pub fn is_rest(&self) -> bool {
        self.pitch == PitchClass::Rest
    }

    /// Tone frequency in hertz, truncated to whole hertz.
    ///
    /// The octave-0 anchor frequency is doubled once per octave. Rests are
    /// 0 Hz (silence).
    pub fn frequency(&self) -> u32 {
        let Some(octave) = self.octave else {
            return 0;
        };
        let Some(base) = self.pitch.base_frequency(self.accidental) else {
            return 0;
        };
        let mut hz = base;
        for _ in 0..octave {
            hz *= 2.0;
        }
        hz as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_frequency_is_zero() {
        let rest = Note {
            pitch: PitchClass::Rest,
            accidental: Accidental::Natural,
            octave: None,
            denominator: 4,
            dotted: false,
            tied: false,
        };
        assert!(rest.is_rest());
        assert_eq!(rest.frequency(), 0);
    }

    #[test]
    fn test_octave_doubling() {
        let mut note = Note {
            pitch: PitchClass::A,
            accidental: Accidental::Natural,
            octave: Some(4),
            denominator: 4,
            dotted: false,
            tied: false,
        };
        // A anchors at 27.50 Hz, so A4 is concert pitch.
        assert_eq!(note.frequency(), 440);

        note.octave = Some(5);
        assert_eq!(note.frequency(), 880);
    }

    #[test]
    fn test_enharmonic_pairs_share_frequency() {
        assert_eq!(
            PitchClass::C.base_frequency(Accidental::Sharp),
            PitchClass::D.base_frequency(Accidental::Flat)
        );
        assert_eq!(
            PitchClass::A.base_frequency(Accidental::Sharp),
            PitchClass::B.base_frequency(Accidental::Flat)
        );
    }

    #[test]
    fn test_disallowed_spellings_have_no_frequency() {
        assert!(PitchClass::C.base_frequency(Accidental::Flat).is_none());
        assert!(PitchClass::E.base_frequency(Accidental::Sharp).is_none());
        assert!(PitchClass::F.base_frequency(Accidental::Flat).is_none());
        assert!(PitchClass::B.base_frequency(Accidental::Sharp).is_none());
    }
}
