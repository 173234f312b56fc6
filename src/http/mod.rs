//! Blocking HTTP transport, status classification and retry policy.

mod client;
mod method;
mod retry;

pub use client::HttpClient;
pub use method::Method;
pub use retry::{
    DEFAULT_MAX_RETRY, RATE_LIMIT_DELAY, RetryPolicy, Sleeper, ThreadSleeper, classify_status,
};

#[cfg(test)]
pub use retry::MockSleeper;
