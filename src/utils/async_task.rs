use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::metrics::RETRY_ATTEMPTS;
use crate::Error;
use crate::NetworkError;
use crate::Result;
use crate::RetryPolicy;

/// A retry loop that ran out of attempts or time.
#[derive(Debug)]
pub struct RetryExhausted {
    pub operation: String,
    pub attempts: u32,
    pub elapsed: Duration,
    pub last_error: Error,
}

impl From<RetryExhausted> for Error {
    fn from(e: RetryExhausted) -> Self {
        NetworkError::RetryExhausted {
            operation: format!("{}: {}", e.operation, e.last_error),
            attempts: e.attempts,
            elapsed: e.elapsed,
        }
        .into()
    }
}

/// Runs `task` until it succeeds or `policy` is used up.
///
/// The closure receives the 1-based attempt number. Sleeps between attempts
/// are clipped to the remaining deadline, so a bounded policy never overruns
/// it by more than one attempt's own duration.
pub(crate) async fn retry_until<F, Fut, T>(
    operation: &str,
    policy: &RetryPolicy,
    mut task: F,
) -> std::result::Result<T, RetryExhausted>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let last_error = match task(attempts).await {
            Ok(value) => {
                if attempts > 1 {
                    debug!("{operation} succeeded after {attempts} attempts");
                }
                return Ok(value);
            }
            Err(e) => e,
        };
        RETRY_ATTEMPTS.with_label_values(&[operation]).inc();

        let elapsed = started.elapsed();
        let out_of_attempts = policy.attempts_cap().is_some_and(|cap| attempts >= cap);
        let out_of_time = policy.deadline().is_some_and(|deadline| elapsed >= deadline);
        if out_of_attempts || out_of_time {
            error!("{operation} gave up after {attempts} attempts: {last_error}");
            return Err(RetryExhausted {
                operation: operation.to_string(),
                attempts,
                elapsed,
                last_error,
            });
        }

        if attempts == 1 {
            warn!("{operation} not yet successful, retrying every {:?}: {last_error}", policy.interval());
        } else {
            debug!("{operation} attempt {attempts} failed: {last_error}");
        }

        let pause = match policy.deadline() {
            Some(deadline) => policy.interval().min(deadline.saturating_sub(elapsed)),
            None => policy.interval(),
        };
        sleep(pause).await;
    }
}

// Helper function to spawn tasks and track their JoinHandles
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<tokio::task::JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}
