//! Bounded retry with cancellation
//!
//! [`execute_with_retry`] repeatedly invokes an operation until it reports
//! [`Attempt::Done`] or [`Attempt::Fatal`], the attempt budget runs out, or
//! the [`CancelContext`] fires. Cancellation is observed before every
//! invocation, while the operation runs, and during the inter-attempt wait.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use courier_core::RetryConfig;

// =============================================================================
// Policy
// =============================================================================

/// Attempt budget and wait schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait after the first attempt
    pub delay: Duration,
    /// Multiplier applied to the wait after every attempt
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Same wait between every attempt
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff_factor: 1.0,
            max_delay: delay,
        }
    }

    /// Wait following attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let millis = self.delay.as_millis() as f64 * self.backoff_factor.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: Duration::from_millis(config.delay_ms),
            backoff_factor: config.backoff_factor,
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.delay_ms)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Abort signal plus optional overall deadline
#[derive(Debug, Clone, Default)]
pub struct CancelContext {
    signal: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Fires the signal of the [`CancelContext`] it was created with
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelContext {
    /// Context with an abort signal. Dropping the handle without calling
    /// [`CancelHandle::cancel`] leaves the context live.
    pub fn new() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                signal: Some(rx),
                deadline: None,
            },
            CancelHandle { tx },
        )
    }

    /// Context that only a deadline (if later added) can cancel
    pub fn never() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(|rx| *rx.borrow())
            || self.deadline.is_some_and(|at| Instant::now() >= at)
    }

    /// Resolves once the signal fires or the deadline passes
    pub async fn cancelled(&self) {
        let signal = async {
            match &self.signal {
                Some(rx) => {
                    let mut rx = rx.clone();
                    loop {
                        if *rx.borrow_and_update() {
                            return;
                        }
                        if rx.changed().await.is_err() {
                            // handle dropped, the signal can no longer fire
                            std::future::pending::<()>().await;
                        }
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = signal => {}
            _ = deadline => {}
        }
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Outcome of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T, E> {
    Done(T),
    Retry,
    Fatal(E),
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("{0}")]
    Fatal(E),

    #[error("Gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("Cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

/// Run `operation` until it finishes, fails fatally, the attempt budget is
/// spent, or `ctx` is cancelled. `operation` receives the 1-based attempt
/// number.
pub async fn execute_with_retry<T, E, F, Fut>(
    ctx: &CancelContext,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
{
    let mut attempts = 0u32;

    loop {
        if ctx.is_cancelled() {
            return Err(RetryError::Cancelled { attempts });
        }
        if attempts >= policy.max_attempts {
            return Err(RetryError::Exhausted { attempts });
        }
        attempts += 1;

        let outcome = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(RetryError::Cancelled { attempts }),
            outcome = operation(attempts) => outcome,
        };

        match outcome {
            Attempt::Done(value) => return Ok(value),
            Attempt::Fatal(e) => return Err(RetryError::Fatal(e)),
            Attempt::Retry => {}
        }

        if attempts >= policy.max_attempts {
            return Err(RetryError::Exhausted { attempts });
        }

        let delay = policy.delay_after(attempts);
        tracing::debug!(
            "Attempt {}/{} not ready, retrying in {}ms",
            attempts,
            policy.max_attempts,
            delay.as_millis()
        );

        tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(RetryError::Cancelled { attempts }),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
