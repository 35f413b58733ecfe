use std::time::Duration;

use tracing::{debug, warn};

/// Fixed-interval retry: `attempts` tries in total, `interval` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }

    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// `op` receives the 1-based attempt number. The last error is returned.
    /// With `attempts == 0` the operation still runs once.
    pub fn run<T, E, F>(&self, what: &str, op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        self.run_until(what, || false, op)
    }

    /// Like [`run`](Self::run), but `stopped` is checked after every failed
    /// attempt. Once it returns true no further attempt is made and that
    /// attempt's error is returned.
    pub fn run_until<T, E, F, C>(&self, what: &str, stopped: C, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
        C: Fn() -> bool,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= attempts => {
                    warn!(what, attempts, error = %err, "giving up after final attempt");
                    return Err(err);
                }
                Err(err) if stopped() => {
                    debug!(what, attempt, error = %err, "stopped before next attempt");
                    return Err(err);
                }
                Err(err) => {
                    debug!(what, attempt, error = %err, "attempt failed; retrying");
                    std::thread::sleep(self.interval);
                    attempt += 1;
                }
            }
        }
    }
}
