/*!
 * Utility functions and helpers for avroute.
 *
 * The driver layer never retries on its own; these helpers are for callers
 * that want resilience on top of it.
 */
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Run a fallible operation, retrying it after a fixed delay.
///
/// # Arguments
///
/// * `retries` - The number of retries after the first attempt
/// * `delay` - The pause between attempts
/// * `future_factory` - A function that creates a new future for each attempt
///
/// # Returns
///
/// The first successful result, or the last error if every attempt fails
pub async fn with_retry<F, Fut, T, E>(
    retries: usize,
    delay: Duration,
    future_factory: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    with_retry_if(retries, delay, |_| true, future_factory).await
}

/// Like [`with_retry`], but only errors accepted by `retryable` are retried.
/// Any other error is returned immediately.
pub async fn with_retry_if<F, Fut, T, E, P>(
    retries: usize,
    delay: Duration,
    retryable: P,
    mut future_factory: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        match future_factory().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("Succeeded after {} retries", attempt);
                }
                return Ok(result);
            }
            Err(e) if attempt < retries && retryable(&e) => {
                attempt += 1;
                warn!("Attempt {} failed: {}; retrying in {:?}", attempt, e, delay);
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if attempt > 0 {
                    warn!("Giving up after {} retries and {:?}", attempt, start.elapsed());
                }
                return Err(e);
            }
        }
    }
}
