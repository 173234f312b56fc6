//! Retry logic for signed exchanges with status-code classification.

use std::time::Duration;

use log::{debug, warn};
use reqwest::StatusCode;

use super::Method;
use crate::error::{Error, Result};

/// Default upper bound on attempts per call.
pub const DEFAULT_MAX_RETRY: usize = 10;

/// Fixed pause after a rate-limited response.
pub const RATE_LIMIT_DELAY: Duration = Duration::from_secs(20);

/// Maps a response status to the error it stands for.
/// Returns Ok(()) only for 200.
pub fn classify_status(method: Method, url: &str, status: StatusCode) -> Result<()> {
    let method = method.to_string();
    let url = url.to_string();
    match status {
        StatusCode::OK => Ok(()),
        StatusCode::UNAUTHORIZED => Err(Error::InvalidToken { method, url }),
        StatusCode::SERVICE_UNAVAILABLE => Err(Error::TooManyRequests { method, url }),
        StatusCode::METHOD_NOT_ALLOWED => Err(Error::EndpointNotFound { method, url }),
        s => Err(Error::UnexpectedResponse {
            method,
            url,
            status_code: s.as_u16(),
        }),
    }
}

/// Blocks the calling thread between attempts.
#[cfg_attr(test, mockall::automock)]
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// How many transient failures a call may absorb and how long to wait
/// after a rate-limited one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retry: usize,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRY, RATE_LIMIT_DELAY)
    }
}

impl RetryPolicy {
    /// `max_retry` below one is raised to one: every call makes an attempt.
    pub fn new(max_retry: usize, delay: Duration) -> Self {
        Self {
            max_retry: max_retry.max(1),
            delay,
        }
    }

    pub fn max_retry(&self) -> usize {
        self.max_retry
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs `attempt` until it succeeds or fails for good.
    ///
    /// `TooManyRequests` pauses for the fixed delay before the next attempt.
    /// `InvalidToken` makes the next iteration call `repair` first; a repair
    /// error aborts the call. Every other error is returned as is. The
    /// transient error that would exceed `max_retry` is returned unchanged.
    pub fn run<T, A, R>(
        &self,
        sleeper: &dyn Sleeper,
        operation_name: &str,
        mut attempt: A,
        mut repair: R,
    ) -> Result<T>
    where
        A: FnMut() -> Result<T>,
        R: FnMut() -> Result<()>,
    {
        let mut errors_occurred = 0;
        let mut repair_pending = false;

        loop {
            if repair_pending {
                debug!("{}: repairing session token", operation_name);
                repair()?;
                repair_pending = false;
                continue;
            }

            let e = match attempt() {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() => e,
                Err(e) => {
                    debug!("{}: non-retryable error: {}", operation_name, e);
                    return Err(e);
                }
            };

            if errors_occurred + 1 >= self.max_retry {
                warn!(
                    "{}: giving up after {} attempts ({})",
                    operation_name, self.max_retry, e
                );
                return Err(e);
            }
            errors_occurred += 1;

            match e {
                Error::TooManyRequests { .. } => {
                    warn!(
                        "{}: attempt {}/{} rate limited, retrying in {}s...",
                        operation_name,
                        errors_occurred,
                        self.max_retry,
                        self.delay.as_secs()
                    );
                    sleeper.sleep(self.delay);
                }
                _ => {
                    debug!(
                        "{}: attempt {}/{} rejected the token",
                        operation_name, errors_occurred, self.max_retry
                    );
                    repair_pending = true;
                }
            }
        }
    }
}
