//! Tone output: the beeper device interface and the note sequencer that
//! drives it.

mod device;
mod sequencer;

pub use device::{BeepDevice, ToneOutput, SOUND_EVENT_DEVICE};
pub use sequencer::{note_duration_ms, whole_note_ms, ToneSequencer, DEFAULT_TEMPO_BPM};
