use std::fmt;
use std::future::Future;

use archive_core::BackoffPolicy;
use archive_logging::{archive_error, archive_warn};

/// Run `operation` until it succeeds or the policy's schedule is exhausted.
///
/// The operation is re-invoked from scratch on every retry, so it must be safe
/// to repeat. After the last scheduled retry fails, that error is returned.
pub async fn run_with_backoff<T, E, F, Fut>(
    policy: &BackoffPolicy,
    label: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    run_with_backoff_if(policy, label, operation, |_: &E| true).await
}

/// Like [`run_with_backoff`], but errors rejected by `retryable` are returned
/// immediately without consuming the schedule.
pub async fn run_with_backoff_if<T, E, F, Fut, P>(
    policy: &BackoffPolicy,
    label: &str,
    mut operation: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !retryable(&err) => {
                archive_error!("{} failed with a permanent error: {}", label, err);
                return Err(err);
            }
            Err(err) => match policy.delay_for(retry) {
                Some(delay) => {
                    archive_warn!(
                        "{} failed on attempt {}: {}; retrying in {:?}",
                        label,
                        retry + 1,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                None => {
                    archive_error!(
                        "{} failed on attempt {}, giving up: {}",
                        label,
                        retry + 1,
                        err
                    );
                    return Err(err);
                }
            },
        }
    }
}
