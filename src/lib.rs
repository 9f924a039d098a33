//! beeptune - note-notation playback on the Linux beeper device.
//!
//! There are two ways this crate makes sound. Tones are produced by the
//! platform beeper, a Linux input device that plays a constant frequency;
//! compact note tokens such as `"C4/4"` are parsed and sequenced into
//! timed tone transitions on it. Sampled sound files and text-to-speech
//! are delegated to external renderer processes (`aplay`, `espeak`)
//! supervised to completion without blocking on any single one.

pub mod cancel;
pub mod error;
pub mod notes;
pub mod process;
pub mod speaker;
pub mod tone;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use error::SpeakerError;
pub use notes::{parse, Accidental, Note, ParseError, PitchClass};
pub use process::{Outcome, Supervisor};
pub use speaker::{
    PlaybackRequest, Speaker, SpeechOptions, DEFAULT_BEEP_DURATION_MS, DEFAULT_BEEP_FREQUENCY,
};
pub use tone::{BeepDevice, ToneOutput, ToneSequencer, DEFAULT_TEMPO_BPM};
