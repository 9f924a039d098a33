//! Tone sequencing: turns parsed notes into timed frequency transitions.
//!
//! Timing is wall-clock: holds are true blocking sleeps on the control
//! thread, interruptible only through the cancellation token. Whatever
//! cuts a sequence short (a parse error partway through the lazy input,
//! a device write failure, cancellation), the tone output is silenced
//! before the error propagates.

use std::num::NonZeroU32;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::SpeakerError;
use crate::notes::{Note, ParseError};
use crate::tone::ToneOutput;

/// Default tempo in beats per minute.
pub const DEFAULT_TEMPO_BPM: u32 = 120;

/// Length of a whole note in milliseconds at the given tempo.
///
/// 4 quarters per whole x 60 s/min x 1000 ms/s / tempo quarters/min.
/// Integer truncation is part of the contract.
pub fn whole_note_ms(tempo_bpm: NonZeroU32) -> u32 {
    4 * 60 * 1000 / tempo_bpm.get()
}

/// Duration of one note in milliseconds given the whole-note length.
///
/// A dotted note is extended by half, truncating. A denominator of 0
/// passes the grammar but names no playable fraction; it resolves to a
/// zero-length note.
pub fn note_duration_ms(note: &Note, whole_ms: u32) -> u32 {
    let mut duration = whole_ms.checked_div(u32::from(note.denominator)).unwrap_or(0);
    if note.dotted {
        duration = 3 * duration / 2;
    }
    duration
}

fn millis(ms: u32) -> Duration {
    Duration::from_millis(u64::from(ms))
}

/// Scoped "sound is active" marker.
///
/// Tracks whether the device is currently emitting a tone and silences it
/// on drop, so every exit path out of a sequence (normal return,
/// propagated error, cancellation) leaves the output at 0.
struct ToneGuard<'a, T: ToneOutput + ?Sized> {
    tone: &'a mut T,
    sounding: bool,
}

impl<'a, T: ToneOutput + ?Sized> ToneGuard<'a, T> {
    fn new(tone: &'a mut T) -> Self {
        Self {
            tone,
            sounding: false,
        }
    }

    fn set(&mut self, hz: u32) -> Result<(), SpeakerError> {
        self.tone.set_frequency(hz).map_err(SpeakerError::Device)?;
        self.sounding = hz != 0;
        Ok(())
    }

    /// Disarms the guard with the tone still on. Only the beep path with a
    /// negative duration wants this: the caller asked for a tone that
    /// keeps sounding after the call returns.
    fn leave_sounding(mut self) {
        self.sounding = false;
    }
}

impl<T: ToneOutput + ?Sized> Drop for ToneGuard<'_, T> {
    fn drop(&mut self) {
        if self.sounding {
            if let Err(e) = self.tone.set_frequency(0) {
                tracing::warn!("failed to silence tone output: {e}");
            }
        }
    }
}

/// Drives a tone device through one playback request.
pub struct ToneSequencer<'a, T: ToneOutput + ?Sized> {
    tone: &'a mut T,
    cancel: &'a CancelToken,
}

impl<'a, T: ToneOutput + ?Sized> ToneSequencer<'a, T> {
    pub fn new(tone: &'a mut T, cancel: &'a CancelToken) -> Self {
        Self { tone, cancel }
    }

    /// Plays a single tone of `frequency` hertz for `duration_ms`.
    ///
    /// A negative duration starts the tone and returns immediately,
    /// leaving it sounding; the caller silences it later (for instance
    /// with [`Speaker::silence`](crate::speaker::Speaker::silence)).
    pub fn beep(&mut self, frequency: u32, duration_ms: i32) -> Result<(), SpeakerError> {
        let cancel = self.cancel;
        let mut guard = ToneGuard::new(&mut *self.tone);

        guard.set(frequency)?;
        if duration_ms < 0 {
            guard.leave_sounding();
            return Ok(());
        }

        cancel.sleep(Duration::from_millis(duration_ms as u64))?;
        guard.set(0)
    }

    /// Plays a finite, single-pass sequence of notes at `tempo_bpm`.
    ///
    /// Each non-tied note sounds for 7/8 of its duration followed by a
    /// 1/8 release gap of silence that keeps consecutive notes audibly
    /// distinct. Tied notes hold for their full duration. The output is
    /// silenced unconditionally after the last note, covering a trailing
    /// tie.
    pub fn play<I>(&mut self, notes: I, tempo_bpm: NonZeroU32) -> Result<(), SpeakerError>
    where
        I: IntoIterator<Item = Result<Note, ParseError>>,
    {
        let whole_ms = whole_note_ms(tempo_bpm);
        let cancel = self.cancel;
        let mut guard = ToneGuard::new(&mut *self.tone);

        for item in notes {
            let note = item?;
            let duration = note_duration_ms(&note, whole_ms);

            guard.set(note.frequency())?;
            if note.tied {
                cancel.sleep(millis(duration))?;
            } else {
                cancel.sleep(millis(7 * duration / 8))?;
                guard.set(0)?;
                cancel.sleep(millis(duration / 8))?;
            }
        }

        guard.set(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::parse;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Instant;

    /// Records every frequency written, for asserting tone transitions.
    #[derive(Clone, Default)]
    struct RecordingTone {
        writes: Arc<Mutex<Vec<u32>>>,
    }

    impl RecordingTone {
        fn writes(&self) -> Vec<u32> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl ToneOutput for RecordingTone {
        fn set_frequency(&mut self, hz: u32) -> io::Result<()> {
            self.writes.lock().unwrap().push(hz);
            Ok(())
        }
    }

    fn tempo(bpm: u32) -> NonZeroU32 {
        NonZeroU32::new(bpm).unwrap()
    }

    #[test]
    fn test_whole_note_length() {
        assert_eq!(whole_note_ms(tempo(120)), 2000);
        assert_eq!(whole_note_ms(tempo(60)), 4000);
        // Truncating division, as ever.
        assert_eq!(whole_note_ms(tempo(70)), 3428);
    }

    #[test]
    fn test_quarter_note_at_120_bpm_is_500ms() {
        let note = parse("C4/4").unwrap();
        assert_eq!(note_duration_ms(&note, whole_note_ms(tempo(120))), 500);
    }

    #[test]
    fn test_dotted_duration_law() {
        let plain = parse("C4/8").unwrap();
        let dotted = parse("C4/8.").unwrap();
        for whole in [0, 1, 7, 500, 2000, 360_000] {
            let d = note_duration_ms(&plain, whole);
            let extended = note_duration_ms(&dotted, whole);
            assert_eq!(extended, 3 * d / 2);
            assert!(extended >= d);
        }
    }

    #[test]
    fn test_zero_denominator_resolves_to_zero_length() {
        let note = parse("C4/0").unwrap();
        assert_eq!(note_duration_ms(&note, 2000), 0);
    }

    #[test]
    fn test_sequence_transitions() {
        let mut tone = RecordingTone::default();
        let cancel = CancelToken::new();
        let notes = ["C4/64", "R/64", "A4/64_"].map(parse);

        ToneSequencer::new(&mut tone, &cancel)
            .play(notes, tempo(1000))
            .unwrap();

        // C4 then its release, the rest (already silent, still gapped),
        // tied A4 with no release, and the final unconditional silence.
        assert_eq!(tone.writes(), vec![261, 0, 0, 0, 440, 0]);
    }

    #[test]
    fn test_beep_silences_after_hold() {
        let mut tone = RecordingTone::default();
        let cancel = CancelToken::new();

        ToneSequencer::new(&mut tone, &cancel).beep(440, 5).unwrap();
        assert_eq!(tone.writes(), vec![440, 0]);
    }

    #[test]
    fn test_beep_negative_duration_keeps_sounding() {
        let mut tone = RecordingTone::default();
        let cancel = CancelToken::new();

        ToneSequencer::new(&mut tone, &cancel).beep(440, -1).unwrap();
        assert_eq!(tone.writes(), vec![440]);
    }

    #[test]
    fn test_parse_error_mid_sequence_silences() {
        let mut tone = RecordingTone::default();
        let cancel = CancelToken::new();
        let notes = ["C4/64", "H4/4", "A4/64"].map(parse);

        let result = ToneSequencer::new(&mut tone, &cancel).play(notes, tempo(1000));

        assert!(matches!(result, Err(SpeakerError::Parse(_))));
        assert_eq!(tone.writes().last(), Some(&0));
    }

    #[test]
    fn test_cancellation_silences_and_returns_promptly() {
        let mut tone = RecordingTone::default();
        let cancel = CancelToken::new();
        let remote = cancel.clone();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            remote.cancel();
        });

        // A whole note at 1 BPM holds for four minutes unless interrupted.
        let start = Instant::now();
        let result =
            ToneSequencer::new(&mut tone, &cancel).play(["C4/1"].map(parse), tempo(1));
        canceller.join().unwrap();

        assert!(matches!(result, Err(SpeakerError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(30));
        assert_eq!(tone.writes().last(), Some(&0));
    }
}
