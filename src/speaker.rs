//! The speaker facade: beeps, note sequences, sampled playback, speech.
//!
//! There are two ways sound gets made. Tones are written directly to the
//! beeper device through the injected [`ToneOutput`]. Sampled playback and
//! text-to-speech are delegated to external renderer processes (`aplay`
//! and `espeak`) watched by the [`Supervisor`].
//!
//! A speaker runs one operation at a time: every entry point locks the
//! same internal mutex for its whole duration, so concurrent callers
//! queue instead of interleaving renderers and tone writes.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cancel::CancelToken;
use crate::error::SpeakerError;
use crate::notes::parse;
use crate::process::{Outcome, Supervisor};
use crate::tone::{ToneOutput, ToneSequencer};

/// Default beep frequency in hertz.
pub const DEFAULT_BEEP_FREQUENCY: u32 = 500;

/// Default beep duration in milliseconds.
pub const DEFAULT_BEEP_DURATION_MS: i32 = 100;

const APLAY: &str = "aplay";
const ESPEAK: &str = "espeak";

/// Voice parameters passed to the speech renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechOptions {
    /// Output amplitude, 0-200.
    pub amplitude: u32,
    /// Speaking rate in words per minute.
    pub speed: u32,
    /// Voice identifier, e.g. `"en"`.
    pub voice: String,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            amplitude: 200,
            speed: 100,
            voice: "en".to_string(),
        }
    }
}

/// One playback request, built from caller arguments and consumed by a
/// single [`Speaker::play`] call. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackRequest {
    /// A single tone.
    Beep { frequency: u32, duration_ms: i32 },
    /// A sequence of note tokens at a tempo.
    NoteSequence {
        notes: Vec<String>,
        tempo_bpm: NonZeroU32,
    },
    /// A sound file for the sampled-playback renderer.
    SoundFile(PathBuf),
    /// Text for the speech renderer.
    SpeechText(String),
}

/// Plays sounds on a beeper device and through external renderers.
///
/// The tone device is injected at construction and owned for the
/// speaker's lifetime; it is opened once by the caller and never
/// reopened. However an operation ends, it leaves the tone output silent
/// and no renderer process running.
pub struct Speaker<T: ToneOutput> {
    tone: Mutex<T>,
    cancel: CancelToken,
}

impl<T: ToneOutput> Speaker<T> {
    /// Creates a speaker around an opened tone device.
    pub fn new(tone: T) -> Self {
        Self {
            tone: Mutex::new(tone),
            cancel: CancelToken::new(),
        }
    }

    /// Returns a token that aborts the speaker's in-flight operation when
    /// fired from another thread.
    ///
    /// Each operation re-arms the token on entry, so a cancellation only
    /// affects the call that is running when it fires.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Serialises operations and recovers the device from a poisoned lock.
    fn lock_tone(&self) -> MutexGuard<'_, T> {
        self.tone.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Executes one request through the matching operation.
    pub fn play(&self, request: PlaybackRequest) -> Result<(), SpeakerError> {
        match request {
            PlaybackRequest::Beep {
                frequency,
                duration_ms,
            } => self.beep(frequency, duration_ms),
            PlaybackRequest::NoteSequence { notes, tempo_bpm } => {
                self.play_notes(notes.iter(), tempo_bpm)
            }
            PlaybackRequest::SoundFile(path) => self.play_file(path),
            PlaybackRequest::SpeechText(text) => self.say(&text),
        }
    }

    /// Sounds a tone of `frequency` hertz for `duration_ms`.
    ///
    /// A negative duration starts the tone and returns with it still
    /// sounding; call [`silence`](Self::silence) to stop it.
    pub fn beep(&self, frequency: u32, duration_ms: i32) -> Result<(), SpeakerError> {
        let mut tone = self.lock_tone();
        self.cancel.reset();
        ToneSequencer::new(&mut *tone, &self.cancel).beep(frequency, duration_ms)
    }

    /// Plays note tokens (`"C4/4"`, `"R/8"`, ...) at `tempo_bpm`.
    ///
    /// Tokens are parsed lazily as the sequence advances; a bad token
    /// stops playback at that point with the tone silenced.
    pub fn play_notes<I, S>(&self, notes: I, tempo_bpm: NonZeroU32) -> Result<(), SpeakerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tone = self.lock_tone();
        self.cancel.reset();
        let parsed = notes.into_iter().map(|token| parse(token.as_ref()));
        ToneSequencer::new(&mut *tone, &self.cancel).play(parsed, tempo_bpm)
    }

    /// Silences the tone output. Harmless when already silent.
    pub fn silence(&self) -> Result<(), SpeakerError> {
        let mut tone = self.lock_tone();
        tone.set_frequency(0).map_err(SpeakerError::Device)
    }

    /// Plays a sound file through the sampled-playback renderer.
    ///
    /// Decoding is entirely the renderer's problem; this call just
    /// supervises it to completion.
    pub fn play_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SpeakerError> {
        let _tone = self.lock_tone();
        self.cancel.reset();
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "playing sound file");

        let mut supervisor = Supervisor::new(self.cancel.clone());
        supervisor.spawn(
            APLAY,
            Command::new(APLAY)
                .arg("-q")
                .arg(path)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped()),
        )?;

        let outcomes = supervisor.run()?;
        finish_renderers("playing file", &outcomes)
    }

    /// Speaks `text` with the default voice settings.
    pub fn say(&self, text: &str) -> Result<(), SpeakerError> {
        self.say_with_options(text, &SpeechOptions::default())
    }

    /// Speaks `text`, piping the synthesizer's audio into the sampled
    /// playback renderer.
    ///
    /// Three operations run concurrently: the synthesizer, the playback
    /// renderer, and the stream splice between them. The call returns
    /// only once all three have completed, whatever any of them reported.
    pub fn say_with_options(
        &self,
        text: &str,
        options: &SpeechOptions,
    ) -> Result<(), SpeakerError> {
        let _tone = self.lock_tone();
        self.cancel.reset();
        tracing::debug!(voice = %options.voice, "speaking text");

        let mut supervisor = Supervisor::new(self.cancel.clone());
        let espeak = supervisor.spawn(
            ESPEAK,
            Command::new(ESPEAK)
                .arg("-a")
                .arg(options.amplitude.to_string())
                .arg("-s")
                .arg(options.speed.to_string())
                .arg("-v")
                .arg(&options.voice)
                .arg("--stdout")
                .arg(text)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped()),
        )?;
        // If this second spawn fails, dropping the supervisor reaps the
        // synthesizer already running.
        let aplay = supervisor.spawn(
            APLAY,
            Command::new(APLAY)
                .arg("-q")
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::piped()),
        )?;

        let src = supervisor
            .take_stdout(espeak)
            .ok_or_else(|| pipe_missing("saying text"))?;
        let dst = supervisor
            .take_stdin(aplay)
            .ok_or_else(|| pipe_missing("saying text"))?;
        supervisor.splice("speech stream copy", src, dst);

        let outcomes = supervisor.run()?;
        finish_renderers("saying text", &outcomes)
    }
}

fn pipe_missing(action: &'static str) -> SpeakerError {
    SpeakerError::Render {
        action,
        message: "renderer pipe not available".to_string(),
    }
}

/// Folds renderer outcomes into the call's result.
///
/// Failures from concurrently running operations are collected and
/// reported jointly rather than keeping only the last one observed.
fn finish_renderers(action: &'static str, outcomes: &[Outcome]) -> Result<(), SpeakerError> {
    let failures: Vec<&str> = outcomes.iter().filter_map(Outcome::failure).collect();
    if failures.is_empty() {
        return Ok(());
    }
    tracing::warn!(action, "renderer reported failure");
    Err(SpeakerError::Render {
        action,
        message: failures.join("; "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    /// Tone fake whose write log outlives the speaker that owns it.
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
    fn test_beep_ends_silent() {
        let log = RecordingTone::default();
        let speaker = Speaker::new(log.clone());

        speaker.beep(DEFAULT_BEEP_FREQUENCY, 5).unwrap();
        assert_eq!(log.writes(), vec![500, 0]);
    }

    #[test]
    fn test_negative_beep_then_silence() {
        let log = RecordingTone::default();
        let speaker = Speaker::new(log.clone());

        speaker.beep(440, -1).unwrap();
        assert_eq!(log.writes(), vec![440]);

        // Silencing is idempotent: twice in a row, no error, still 0.
        speaker.silence().unwrap();
        speaker.silence().unwrap();
        assert_eq!(log.writes(), vec![440, 0, 0]);
    }

    #[test]
    fn test_play_notes_sequence_transitions() {
        let log = RecordingTone::default();
        let speaker = Speaker::new(log.clone());

        speaker
            .play_notes(["C4/64", "R/64", "A4/64_"], tempo(1000))
            .unwrap();

        // Three note onsets; the rest is silent; the tied final note gets
        // no release gap, only the unconditional trailing silence.
        assert_eq!(log.writes(), vec![261, 0, 0, 0, 440, 0]);
    }

    #[test]
    fn test_play_notes_parse_error_leaves_silence() {
        let log = RecordingTone::default();
        let speaker = Speaker::new(log.clone());

        let result = speaker.play_notes(["C4/64", "H4/4"], tempo(1000));
        assert!(matches!(result, Err(SpeakerError::Parse(_))));
        assert_eq!(log.writes().last(), Some(&0));
    }

    #[test]
    fn test_cancel_token_aborts_playback() {
        let log = RecordingTone::default();
        let speaker = Speaker::new(log.clone());
        let token = speaker.cancel_token();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.cancel();
        });

        let start = Instant::now();
        let result = speaker.play_notes(["C4/1"], tempo(1));
        canceller.join().unwrap();

        assert!(matches!(result, Err(SpeakerError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(30));
        assert_eq!(log.writes().last(), Some(&0));
    }

    #[test]
    fn test_operations_rearm_cancellation() {
        let log = RecordingTone::default();
        let speaker = Speaker::new(log.clone());

        // A stale cancellation from a previous call must not poison the
        // next operation.
        speaker.cancel_token().cancel();
        speaker.beep(440, 1).unwrap();
        assert_eq!(log.writes(), vec![440, 0]);
    }

    #[test]
    fn test_play_dispatches_requests() {
        let log = RecordingTone::default();
        let speaker = Speaker::new(log.clone());

        speaker
            .play(PlaybackRequest::Beep {
                frequency: 880,
                duration_ms: 1,
            })
            .unwrap();
        speaker
            .play(PlaybackRequest::NoteSequence {
                notes: vec!["A4/64".to_string()],
                tempo_bpm: tempo(1000),
            })
            .unwrap();

        assert_eq!(log.writes(), vec![880, 0, 440, 0, 0]);
    }

    #[test]
    fn test_play_file_spawn_failure_is_reported() {
        // Depending on the environment this fails at spawn (no aplay) or
        // as a renderer error (aplay rejects the missing file). Either
        // way it must be immediate and typed, not a hang.
        let speaker = Speaker::new(RecordingTone::default());
        let result = speaker.play_file("/nonexistent/sound.wav");
        assert!(matches!(
            result,
            Err(SpeakerError::Spawn { .. }) | Err(SpeakerError::Render { .. })
        ));
    }
}
