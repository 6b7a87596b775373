//! Bounded exponential backoff around transient object-store failures:
//! timeouts and 5xx-shaped errors retry, everything else short-circuits.
//! Digest mismatches are never seen here — they're checked one layer up,
//! once bytes are already retrieved.
//!
//! `backoff::future::retry` drives an `ExponentialBackoff` policy, with
//! `backoff::Error::Permanent` short-circuiting non-transient failures.

use std::future::Future;
use std::time::Duration;

use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use tracing::warn;

use crate::error::StoreError;

/// Retries `op` with exponential backoff (250ms initial, capped at 1 minute
/// of total elapsed time) as long as it returns a transient [`StoreError`].
/// A non-transient error is returned immediately.
pub async fn with_retry<T, F, Fut>(description: &str, mut op: F) -> Result<T, StoreError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, StoreError>>,
{
	let backoff = ExponentialBackoffBuilder::new()
		.with_initial_interval(Duration::from_millis(250))
		.with_max_elapsed_time(Some(Duration::from_secs(60)))
		.build();

	retry(backoff, || {
		let fut = op();
		async move {
			fut.await.map_err(|err| {
				if err.is_transient() {
					warn!(operation = description, error = %err, "retrying transient object-store failure");
					backoff::Error::transient(err)
				} else {
					backoff::Error::permanent(err)
				}
			})
		}
	})
	.await
}
