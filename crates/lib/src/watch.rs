use crate::totp::unix_millis;
use crate::{OtpError, OtpResult, TotpSpec};

use log::{debug, error, warn};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use unix_time::Instant;

/// Verdict of an error callback after a generation failure was delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorAction {
    /// Keep looping; the failed tick is scheduled like a successful one.
    Continue,
    /// Stop the loop and surface the failure to whoever runs it.
    Stop,
}

type ChangeCallback = dyn Fn(&str, &TotpSpec, u64) + Send;
type ErrorCallback = dyn Fn(&OtpError, &TotpSpec, u64) -> ErrorAction + Send;
type Clock = dyn Fn() -> Instant + Send;
#[cfg(test)]
type Generator = dyn Fn(&TotpSpec, u64) -> OtpResult<String> + Send;

/// Cancellation flag shared between a [`TotpWatcher`] and its controllers.
///
/// Clones refer to the same flag. Cancelling is idempotent, callable from
/// any thread as well as from inside a watcher callback, and wakes the
/// watcher if it is sleeping between ticks.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Request cancellation. No loop iteration starts after this returns.
    pub fn cancel(&self) {
        *self.flag() = true;
        self.inner.1.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag()
    }

    /// Block for at most `timeout`, waking early when cancelled.
    fn sleep(&self, timeout: Duration) {
        let deadline = std::time::Instant::now() + timeout;
        let mut cancelled = self.flag();
        while !*cancelled {
            let now = std::time::Instant::now();
            if now >= deadline {
                return;
            }
            cancelled = self
                .inner
                .1
                .wait_timeout(cancelled, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    // Cancellation must stay available even after a panicked holder
    fn flag(&self) -> MutexGuard<'_, bool> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Periodically generates the TOTP of an owned spec and hands every fresh
/// value to a callback, until cancelled.
///
/// The loop generates once per period, aligned to period boundaries, and
/// spends the rest of its lifetime sleeping. It is meant to occupy one
/// dedicated thread, either the caller's own via [`TotpWatcher::run`] or a
/// fresh one via [`TotpWatcher::spawn`].
pub struct TotpWatcher {
    spec: TotpSpec,
    on_change: Box<ChangeCallback>,
    on_error: Option<Box<ErrorCallback>>,
    clock: Box<Clock>,
    #[cfg(test)]
    generator: Box<Generator>,
    token: CancelToken,
}

impl TotpWatcher {
    /// Create a watcher delivering `(otp, spec, utc_millis)` to `on_change`
    /// whenever a fresh passcode was generated.
    pub fn new<F>(spec: TotpSpec, on_change: F) -> Self
    where
        F: Fn(&str, &TotpSpec, u64) + Send + 'static,
    {
        TotpWatcher {
            spec,
            on_change: Box::new(on_change),
            on_error: None,
            clock: Box::new(Instant::now),
            #[cfg(test)]
            generator: Box::new(|spec, utc_millis| spec.generate_at(utc_millis)),
            token: CancelToken::new(),
        }
    }

    /// Register a callback deciding whether a generation failure ends the
    /// run. Without one every failure is fatal.
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&OtpError, &TotpSpec, u64) -> ErrorAction + Send + 'static,
    {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Replace the source of "now", e.g. for tests.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> Instant + Send + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Share a pre-built token, so callbacks can cancel the watcher they
    /// are invoked from.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.token = token;
        self
    }

    #[cfg(test)]
    fn with_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&TotpSpec, u64) -> OtpResult<String> + Send + 'static,
    {
        self.generator = Box::new(generator);
        self
    }

    /// Handle to cancel this watcher from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Drive the loop until cancelled or until a failure becomes fatal.
    ///
    /// Blocks for the watcher's whole lifetime. Cancelling before the
    /// first iteration means no callback ever fires; cancelling from
    /// inside a callback takes effect before the next sleep.
    pub fn run(self) -> OtpResult<()> {
        while !self.token.is_cancelled() {
            let now = unix_millis((self.clock)());
            match self.generate(now) {
                Ok(otp) => {
                    debug!("TOTP changed at {}", now);
                    (self.on_change)(&otp, &self.spec, now);
                }
                Err(err) => {
                    let action = match &self.on_error {
                        Some(on_error) => on_error(&err, &self.spec, now),
                        None => ErrorAction::Stop,
                    };
                    match action {
                        ErrorAction::Continue => {
                            warn!("TOTP generation failed, continuing: {}", err)
                        }
                        ErrorAction::Stop => {
                            error!("TOTP generation failed: {}", err);
                            return Err(err);
                        }
                    }
                }
            }
            if self.token.is_cancelled() {
                break;
            }
            let delay = self.spec.period_millis() - now % self.spec.period_millis();
            self.token.sleep(Duration::from_millis(delay));
        }
        Ok(())
    }

    /// Run on a dedicated background thread.
    pub fn spawn(self) -> WatchHandle {
        let token = self.token.clone();
        let join = thread::spawn(move || self.run());
        WatchHandle { token, join }
    }

    #[cfg(test)]
    fn generate(&self, utc_millis: u64) -> OtpResult<String> {
        (self.generator)(&self.spec, utc_millis)
    }

    #[cfg(not(test))]
    fn generate(&self, utc_millis: u64) -> OtpResult<String> {
        self.spec.generate_at(utc_millis)
    }
}

/// Owner of a watcher spawned onto its own thread.
pub struct WatchHandle {
    token: CancelToken,
    join: JoinHandle<OtpResult<()>>,
}

impl WatchHandle {
    pub fn cancel(&self) {
        self.token.cancel()
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Wait for the watcher thread to exit and report how it ended. A
    /// panic of a callback is resumed on the joining thread.
    pub fn join(self) -> OtpResult<()> {
        match self.join.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
