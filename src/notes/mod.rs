//! Note notation: value types and the token parser.
//!
//! This module turns compact note tokens such as `"A4/4"`, `"C#5/8."`, or
//! `"R/2"` into structured [`Note`] values. It has no timing and no I/O;
//! turning notes into sound is the sequencer's job.

mod note;
mod parser;

pub use note::{Accidental, Note, PitchClass};
pub use parser::{parse, ParseError};
