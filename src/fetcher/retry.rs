use crate::config::{BackoffConfig, BackoffStrategy};
use crate::error::FetchError;
use crate::models::RetryState;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_retry::strategy::{FixedInterval, jitter};
use tracing::{debug, warn};

type Delays = Box<dyn Iterator<Item = Duration> + Send>;

/// Re-runs a fallible async operation on retryable errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffConfig,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: BackoffConfig) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `operation` (given the 1-based attempt number) until it succeeds,
    /// fails fatally, or the attempt budget is spent.
    ///
    /// Fatal errors are returned as-is without consuming budget; exhausting
    /// the budget yields [`FetchError::RetriesExhausted`] with the last
    /// transport error.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut state = RetryState::new(self.max_attempts);
        let mut delays = self.delays();

        loop {
            state.attempt += 1;
            debug!("attempt {}/{}", state.attempt, state.max_attempts);

            let err = match operation(state.attempt).await {
                Ok(value) => return Ok(value),
                Err(FetchError::Transport(e)) => e,
                Err(fatal) => return Err(fatal),
            };

            warn!(
                "attempt {}/{} failed: {}",
                state.attempt, state.max_attempts, err
            );
            state.last_error = Some(err);

            if state.exhausted() {
                break;
            }

            let backoff = delays.next().unwrap_or_default();
            if !backoff.is_zero() {
                sleep(backoff).await;
            }
        }

        match state.last_error {
            Some(last) => Err(FetchError::RetriesExhausted {
                attempts: state.attempt,
                last,
            }),
            None => Err(FetchError::configuration("retry loop ended without an attempt")),
        }
    }

    /// Delay sequence between attempts, capped at `max_delay_ms`.
    fn delays(&self) -> Delays {
        let base = Duration::from_millis(self.backoff.delay_ms);
        let cap = Duration::from_millis(self.backoff.max_delay_ms);

        let raw: Delays = match self.backoff.strategy {
            BackoffStrategy::None => Box::new(std::iter::repeat(Duration::ZERO)),
            BackoffStrategy::Fixed => Box::new(FixedInterval::new(base)),
            BackoffStrategy::Linear => Box::new((1u32..).map(move |n| base.saturating_mul(n))),
            BackoffStrategy::Exponential => Box::new(
                (0u32..).map(move |n| base.saturating_mul(2u32.saturating_pow(n))),
            ),
        };

        let capped = raw.map(move |d| d.min(cap));
        if self.backoff.jitter {
            Box::new(capped.map(jitter))
        } else {
            Box::new(capped)
        }
    }
}
