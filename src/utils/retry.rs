// src/utils/retry.rs

use std::{future::Future, time::Duration};

/// Runs `op` up to `max_attempts` times, sleeping `base_delay`, then twice that,
/// and so on between failures. Errors rejected by `is_transient` are returned
/// at once; otherwise the last error is returned once the budget is spent.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    max_attempts: u32,
    base_delay: Duration,
    is_transient: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut delay = base_delay;
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_transient(&e) => {
                tracing::warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
