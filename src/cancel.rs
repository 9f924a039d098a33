//! Cooperative cancellation for in-flight playback operations.
//!
//! Tone holds and renderer supervision both block the control thread for
//! real wall-clock time. A [`CancelToken`] lets another thread (a Ctrl-C
//! handler, a watchdog) interrupt those waits: the sequencer sleeps on the
//! token's condition variable, and the supervisor checks the flag between
//! completion polls.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Marker returned when a wait was interrupted by [`CancelToken::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

#[derive(Debug, Default)]
struct Inner {
    flag: Mutex<bool>,
    signal: Condvar,
}

/// Cloneable abort latch shared between the control thread and whoever
/// wants to interrupt it.
///
/// All clones observe the same flag. Once fired, the token stays cancelled
/// until [`reset`](CancelToken::reset) re-arms it for a fresh operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token, waking every blocked [`sleep`](CancelToken::sleep).
    pub fn cancel(&self) {
        let mut flag = self
            .inner
            .flag
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *flag = true;
        self.inner.signal.notify_all();
    }

    /// Returns true once [`cancel`](CancelToken::cancel) has fired.
    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .flag
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-arms the token so the next operation starts uncancelled.
    pub fn reset(&self) {
        let mut flag = self
            .inner
            .flag
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *flag = false;
    }

    /// Blocks the calling thread for `duration` of wall-clock time.
    ///
    /// Returns `Err(Cancelled)` as soon as the token fires, without waiting
    /// out the remainder. Spurious condvar wakeups re-wait on the original
    /// deadline, so a completed sleep is always at least `duration` long.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        let deadline = Instant::now() + duration;
        let mut flag = self
            .inner
            .flag
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if *flag {
                return Err(Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let (guard, _timeout) = self
                .inner
                .signal
                .wait_timeout(flag, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            flag = guard;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_sleep_runs_to_completion() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert_eq!(token.sleep(Duration::from_millis(30)), Ok(()));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_interrupts_sleep() {
        let token = CancelToken::new();
        let remote = token.clone();
        let start = Instant::now();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        assert_eq!(token.sleep(Duration::from_secs(30)), Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
        canceller.join().unwrap();
    }

    #[test]
    fn test_cancelled_token_fails_fast() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.sleep(Duration::from_secs(30)), Err(Cancelled));
    }

    #[test]
    fn test_reset_rearms_token() {
        let token = CancelToken::new();
        token.cancel();
        token.reset();
        assert!(!token.is_cancelled());
        assert_eq!(token.sleep(Duration::from_millis(1)), Ok(()));
    }
}
