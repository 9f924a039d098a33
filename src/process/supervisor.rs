//! Supervision of external renderer processes.
//!
//! Sampled playback and speech synthesis are delegated to external
//! programs (`aplay`, `espeak`). The supervisor owns every child it
//! spawns, polls their completion cooperatively on the single control
//! thread, and guarantees no child outlives the call that spawned it:
//! cancellation force-terminates the renderers and still reaps them, and
//! dropping the supervisor kills anything left running.
//!
//! Two kinds of operation are supervised: a process wait (non-blocking
//! [`Child::try_wait`] polling) and a stream splice that copies one
//! process's stdout into another's stdin on a worker thread, reporting
//! completion over a channel. A call finishes only when every registered
//! operation has completed.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::SpeakerError;

/// Interval between completion polls while renderers are running.
const PUMP_INTERVAL: Duration = Duration::from_millis(10);

/// Most stderr bytes retained from a failed renderer.
const STDERR_CAPTURE_LIMIT: u64 = 4096;

/// Completion status of one supervised operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The operation failed; the message is the renderer's captured stderr
    /// when it printed any, otherwise a generic exit-status diagnostic.
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// The failure message, if this outcome is a failure.
    pub fn failure(&self) -> Option<&str> {
        match self {
            Outcome::Success => None,
            Outcome::Failure(message) => Some(message),
        }
    }
}

/// Handle to a process registered with [`Supervisor::spawn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessId(usize);

struct ProcessOp {
    label: &'static str,
    child: Child,
    outcome: Option<Outcome>,
}

struct SpliceOp {
    label: &'static str,
    done_rx: Receiver<io::Result<u64>>,
    outcome: Option<Outcome>,
}

/// Manages a set of concurrently outstanding renderer operations.
///
/// Register operations with [`spawn`](Supervisor::spawn) and
/// [`splice`](Supervisor::splice), then call [`run`](Supervisor::run) once.
/// A supervisor is built per playback call and discarded afterwards.
pub struct Supervisor {
    cancel: CancelToken,
    processes: Vec<ProcessOp>,
    splices: Vec<SpliceOp>,
}

impl Supervisor {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            processes: Vec::new(),
            splices: Vec::new(),
        }
    }

    /// Spawns `command` and registers the child for supervision.
    ///
    /// The caller configures the stdio pipes on `command`; pipe handles
    /// can be retrieved afterwards with [`take_stdout`](Self::take_stdout)
    /// and [`take_stdin`](Self::take_stdin).
    pub fn spawn(
        &mut self,
        label: &'static str,
        command: &mut Command,
    ) -> Result<ProcessId, SpeakerError> {
        let child = command.spawn().map_err(|source| SpeakerError::Spawn {
            program: label.to_string(),
            source,
        })?;
        tracing::debug!(label, pid = child.id(), "spawned renderer");
        self.processes.push(ProcessOp {
            label,
            child,
            outcome: None,
        });
        Ok(ProcessId(self.processes.len() - 1))
    }

    /// Takes ownership of a registered child's stdout pipe.
    pub fn take_stdout(&mut self, id: ProcessId) -> Option<ChildStdout> {
        self.processes.get_mut(id.0)?.child.stdout.take()
    }

    /// Takes ownership of a registered child's stdin pipe.
    pub fn take_stdin(&mut self, id: ProcessId) -> Option<ChildStdin> {
        self.processes.get_mut(id.0)?.child.stdin.take()
    }

    /// Registers a byte-for-byte copy of `src` into `dst` as a supervised
    /// operation of its own.
    ///
    /// The copy runs on a worker thread; both streams are closed when it
    /// finishes. Completion is delivered over a channel polled by the same
    /// pump loop that watches the processes.
    pub fn splice<R, W>(&mut self, label: &'static str, src: R, dst: W)
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            let mut src = src;
            let mut dst = dst;
            let result = io::copy(&mut src, &mut dst);
            // Dropping the handles closes both ends of the bridge.
            drop(src);
            drop(dst);
            let _ = done_tx.send(result);
        });
        self.splices.push(SpliceOp {
            label,
            done_rx,
            outcome: None,
        });
    }

    /// Pumps until every registered operation completes.
    ///
    /// Cancellation during the pump force-terminates all still-running
    /// renderers exactly once, keeps pumping until they are reaped (killed
    /// processes still have to be waited on), then surfaces `Cancelled`:
    /// the original abort, not an error derived from the killed renderers.
    ///
    /// On normal completion the per-operation outcomes are returned in
    /// registration order, processes before splices. Renderer failures are
    /// reported in the outcomes, not as an `Err`.
    pub fn run(&mut self) -> Result<Vec<Outcome>, SpeakerError> {
        let mut killed = false;
        loop {
            self.poll();
            if self.all_done() {
                break;
            }
            if !killed && self.cancel.is_cancelled() {
                self.kill_all();
                killed = true;
            }
            thread::sleep(PUMP_INTERVAL);
        }

        if killed {
            return Err(SpeakerError::Cancelled);
        }
        Ok(self.outcomes())
    }

    /// One cooperative poll pass: collect whichever completions are ready.
    fn poll(&mut self) {
        for op in &mut self.processes {
            if op.outcome.is_some() {
                continue;
            }
            match op.child.try_wait() {
                Ok(Some(status)) => {
                    let outcome = process_outcome(op.label, &mut op.child, status);
                    tracing::debug!(label = op.label, success = outcome.is_success(), "renderer finished");
                    op.outcome = Some(outcome);
                }
                Ok(None) => {}
                Err(e) => {
                    op.outcome = Some(Outcome::Failure(format!(
                        "waiting on {} failed: {e}",
                        op.label
                    )));
                }
            }
        }

        for op in &mut self.splices {
            if op.outcome.is_some() {
                continue;
            }
            match op.done_rx.try_recv() {
                Ok(Ok(_bytes)) => op.outcome = Some(Outcome::Success),
                Ok(Err(e)) => {
                    op.outcome = Some(Outcome::Failure(format!("{} failed: {e}", op.label)));
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    op.outcome = Some(Outcome::Failure(format!(
                        "{} worker exited without reporting",
                        op.label
                    )));
                }
            }
        }
    }

    fn all_done(&self) -> bool {
        self.processes.iter().all(|op| op.outcome.is_some())
            && self.splices.iter().all(|op| op.outcome.is_some())
    }

    fn kill_all(&mut self) {
        for op in &mut self.processes {
            if op.outcome.is_none() {
                tracing::warn!(label = op.label, "force-terminating renderer");
                if let Err(e) = op.child.kill() {
                    tracing::warn!(label = op.label, "kill failed: {e}");
                }
            }
        }
        // Killing the producers closes their pipes, so any splice sees EOF
        // and completes on its own.
    }

    fn outcomes(&self) -> Vec<Outcome> {
        self.processes
            .iter()
            .filter_map(|op| op.outcome.clone())
            .chain(self.splices.iter().filter_map(|op| op.outcome.clone()))
            .collect()
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        // Early returns (a later spawn failing, a propagated error) must
        // not leak running renderers.
        for op in &mut self.processes {
            if op.outcome.is_none() {
                let _ = op.child.kill();
                let _ = op.child.wait();
            }
        }
    }
}

/// Builds the outcome for an exited process.
///
/// Stderr captured from the renderer (bounded read) is preferred over the
/// generic exit-status message whenever any bytes were printed.
fn process_outcome(label: &str, child: &mut Child, status: ExitStatus) -> Outcome {
    if status.success() {
        return Outcome::Success;
    }

    let mut message = String::new();
    if let Some(stderr) = child.stderr.take() {
        let mut captured = Vec::new();
        if stderr
            .take(STDERR_CAPTURE_LIMIT)
            .read_to_end(&mut captured)
            .is_ok()
        {
            message = String::from_utf8_lossy(&captured).trim().to_string();
        }
    }
    if message.is_empty() {
        message = format!("{label} {status}");
    }
    Outcome::Failure(message)
}
