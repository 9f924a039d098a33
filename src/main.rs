//! beeptune - play beeps, tunes, sound files, and speech from the
//! command line.
//!
//! Tones go to the platform beeper device; sound files and speech are
//! rendered by `aplay` and `espeak`.
//!
//! # Usage
//!
//! ```bash
//! beeptune beep [FREQ] [MS]          # tone, default 500 Hz for 100 ms
//! beeptune play NOTE... [--tempo N]  # e.g. beeptune play C4/4 E4/4 G4/2
//! beeptune file PATH                 # sampled playback via aplay
//! beeptune say TEXT...               # speech via espeak
//! beeptune parse TOKEN...            # print parsed notes as JSON
//! ```

use std::num::NonZeroU32;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use beeptune::{
    parse, BeepDevice, PlaybackRequest, Speaker, DEFAULT_BEEP_DURATION_MS,
    DEFAULT_BEEP_FREQUENCY, DEFAULT_TEMPO_BPM,
};

fn main() -> Result<()> {
    // Initialize logging (optional, for debugging)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("beep") => cmd_beep(&args[2..]),
        Some("play") => cmd_play(&args[2..]),
        Some("file") => cmd_file(&args[2..]),
        Some("say") => cmd_say(&args[2..]),
        Some("parse") => cmd_parse(&args[2..]),
        Some("--help") | Some("-h") | None => {
            print_usage(args.first().map(String::as_str).unwrap_or("beeptune"));
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("beeptune - beeper-device tunes, sampled sound, and speech");
    eprintln!();
    eprintln!("Usage: {} COMMAND [ARGS]", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  beep [FREQ] [MS]          Sound a tone (default 500 Hz, 100 ms)");
    eprintln!("  play NOTE... [--tempo N]  Play note tokens, e.g. C4/4 E4/4 G4/2");
    eprintln!("  file PATH                 Play a sound file via aplay");
    eprintln!("  say TEXT...               Speak text via espeak");
    eprintln!("  parse TOKEN...            Print parsed note tokens as JSON");
    eprintln!();
    eprintln!("Note tokens: pitch A-G or R (rest), optional # or b, octave 2-8,");
    eprintln!("'/' and a fraction (4 = quarter), optional '.' (dotted), '_' (tied).");
}

fn open_speaker() -> Result<Speaker<BeepDevice>> {
    let device = BeepDevice::open().context("failed to open beeper device")?;
    Ok(Speaker::new(device))
}

fn cmd_beep(args: &[String]) -> Result<()> {
    let frequency = match args.first() {
        Some(raw) => raw
            .parse::<u32>()
            .with_context(|| format!("invalid frequency: {}", raw))?,
        None => DEFAULT_BEEP_FREQUENCY,
    };
    let duration_ms = match args.get(1) {
        Some(raw) => raw
            .parse::<i32>()
            .with_context(|| format!("invalid duration: {}", raw))?,
        None => DEFAULT_BEEP_DURATION_MS,
    };

    open_speaker()?.play(PlaybackRequest::Beep {
        frequency,
        duration_ms,
    })?;
    Ok(())
}

fn cmd_play(args: &[String]) -> Result<()> {
    let mut notes: Vec<String> = Vec::new();
    let mut tempo_bpm = DEFAULT_TEMPO_BPM;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--tempo" | "-t" => {
                i += 1;
                let raw = args
                    .get(i)
                    .context("--tempo requires a beats-per-minute value")?;
                tempo_bpm = raw
                    .parse::<u32>()
                    .with_context(|| format!("invalid tempo: {}", raw))?;
            }
            token => notes.push(token.to_string()),
        }
        i += 1;
    }

    if notes.is_empty() {
        bail!("no notes given; try: beeptune play C4/4 E4/4 G4/2");
    }
    let tempo_bpm = NonZeroU32::new(tempo_bpm).context("tempo must be positive")?;

    open_speaker()?.play(PlaybackRequest::NoteSequence { notes, tempo_bpm })?;
    Ok(())
}

fn cmd_file(args: &[String]) -> Result<()> {
    let path = args.first().context("no sound file given")?;
    open_speaker()?.play(PlaybackRequest::SoundFile(PathBuf::from(path)))?;
    Ok(())
}

fn cmd_say(args: &[String]) -> Result<()> {
    if args.is_empty() {
        bail!("no text given");
    }
    open_speaker()?.play(PlaybackRequest::SpeechText(args.join(" ")))?;
    Ok(())
}

fn cmd_parse(args: &[String]) -> Result<()> {
    if args.is_empty() {
        bail!("no note tokens given");
    }
    for token in args {
        let note = parse(token).with_context(|| format!("bad note token: {}", token))?;
        println!("{}", serde_json::to_string_pretty(&note)?);
    }
    Ok(())
}
