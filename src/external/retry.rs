//! Reconnect policy for upstream links.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::ConnectError;

/// How many times to dial, and how long to wait between dials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

/// Result of running a [`RetryPolicy`].
#[derive(Debug)]
pub enum ConnectOutcome<T> {
    Connected(T),
    Exhausted { attempts: u32, last: ConnectError },
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Call `attempt` until it succeeds or the attempts run out, sleeping
    /// `backoff` between failures. `attempt` receives the 1-based attempt
    /// number.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> ConnectOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ConnectError>>,
    {
        let mut n = 1;
        loop {
            match attempt(n).await {
                Ok(value) => return ConnectOutcome::Connected(value),
                Err(last) if n >= self.max_attempts => {
                    return ConnectOutcome::Exhausted { attempts: n, last };
                }
                Err(e) => {
                    warn!(
                        attempt = n,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Connect attempt failed, retrying"
                    );
                    sleep(self.backoff).await;
                    n += 1;
                }
            }
        }
    }
}
