use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{IsRetryable, SchemaGenError};

/// Runs `attempt` until it succeeds, fails with a non-retryable error, or the policy gives up.
///
/// Each attempt must start from a fresh catalog snapshot; only schema conflicts are retried.
pub(crate) async fn with_conflict_retry<T, F, Fut>(
    policy: ExponentialBuilder,
    op: &'static str,
    resource: &str,
    attempt: F,
) -> Result<T, SchemaGenError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SchemaGenError>>,
{
    attempt
        .retry(policy)
        .when(|err: &SchemaGenError| err.is_retryable())
        .notify(|err: &SchemaGenError, after: Duration| {
            warn!(
                op,
                resource,
                error = %err,
                retry_in_ms = after.as_millis() as u64,
                "schema conflict, retrying"
            );
        })
        .await
}
