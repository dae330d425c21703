use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::BackoffPolicy;

/// Why a retried task gave up
#[derive(Debug)]
pub(crate) enum RetryError<E> {
    /// Every attempt failed; carries the last failure
    Exhausted { attempts: usize, last: E },
    /// The task failed with an error that retrying cannot fix
    Aborted(E),
    /// Cancellation was observed before the next attempt could start
    Cancelled { last: Option<E> },
}

/// Runs `task` until it succeeds, at most `policy.max_retries` times.
///
/// Every attempt is bounded by `policy.timeout_ms`; a timed out attempt is
/// mapped through `on_timeout`. Between attempts the delay doubles from
/// `base_delay_ms` up to `max_delay_ms`, plus up to 20% jitter. An attempt
/// already in flight is never interrupted by `cancel`; only the next one is
/// not started.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, Fut, T, E>(
    mut task: F,
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
    is_retryable: impl Fn(&E) -> bool,
    on_timeout: impl Fn(Duration) -> E,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let timeout_duration = policy.timeout();
    let mut attempts = 0;
    let mut last = None;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled { last });
        }

        let error = match timeout(timeout_duration, task()).await {
            Ok(Ok(r)) => return Ok(r),
            Ok(Err(error)) => error,
            Err(_) => on_timeout(timeout_duration),
        };
        attempts += 1;

        if !is_retryable(&error) {
            return Err(RetryError::Aborted(error));
        }

        if attempts >= policy.max_retries {
            debug!("Task failed after {} attempts", attempts);
            return Err(RetryError::Exhausted { attempts, last: error });
        }

        let delay = with_jitter(policy.delay_for(attempts - 1));
        debug!(attempts, ?delay, "attempt failed, backing off");
        last = Some(error);

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(RetryError::Cancelled { last });
            }
            _ = sleep(delay) => {}
        }
    }
}

fn with_jitter(delay: Duration) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    let factor = rand::thread_rng().gen_range(1.0..1.2);
    delay.mul_f64(factor)
}
