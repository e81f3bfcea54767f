//! Exponential-backoff retry for the client runtime.
//!
//! Only `ConnectionFailed`/`ConnectTimeout`/`NetworkTimeout` are retried;
//! everything else (a server-reported `NotFound`, a `ProtocolMismatch`)
//! is returned to the caller on the first attempt.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::Error;
use crate::config::ClientConfig;

fn is_retryable(err: &Error) -> bool {
    matches!(err, Error::ConnectionFailed | Error::ConnectTimeout | Error::NetworkTimeout)
}

/// Runs `attempt` up to `config.retry_count + 1` times, waiting
/// `retry_base * 2^(attempt_index)` between tries, stopping as soon as an
/// attempt succeeds or fails with a non-retryable error.
pub async fn with_retry<F, Fut, T>(config: &ClientConfig, mut attempt: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut last_err = None;
    for attempt_index in 0..=config.retry_count {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && attempt_index < config.retry_count => {
                let backoff = config.retry_base() * 2u32.saturating_pow(attempt_index);
                debug!(attempt_index, ?backoff, error = %err, "retrying after transient client error");
                tokio::time::sleep(backoff).await;
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.expect("loop always runs at least once"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(retry_count: u32) -> ClientConfig {
        ClientConfig {
            tracker_addresses: vec![],
            max_connections: 1,
            connect_timeout_ms: 1,
            network_timeout_ms: 1,
            idle_timeout_ms: 1,
            retry_count,
            retry_base_ms: 1,
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_without_retrying() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&config(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(())
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_connection_failures_up_to_the_configured_count() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Error> = with_retry(&config(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::ConnectionFailed)
        })
        .await;
        assert!(matches!(result, Err(Error::ConnectionFailed)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Error> = with_retry(&config(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Server(2))
        })
        .await;
        assert!(matches!(result, Err(Error::Server(2))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
