//! The retry wrapper (component I, ambient stack).
//!
//! Grounded on `examples/Clikengo-foundationdb-rs/foundationdb/src/database.rs`'s
//! `Database::transact`: create a transaction, run the body, commit, and on a
//! retryable error hand the transaction to `on_error` and loop. This wrapper
//! additionally clears the process-wide [`CacheContext`] on every retry,
//! since a retryable error means the transaction's read version (and with it
//! any validation chain a cached lookup relied on) is no longer current.
use std::future::Future;
use std::time::{Duration, Instant};

use foundationdb::Database;

use crate::cache::CacheContext;
use crate::error::{DirError, DirResult};
use crate::txn_state::DirTransaction;

/// Controls how long [`with_directory_retry`] keeps retrying a highly
/// contended transaction body.
///
/// Mirrors `examples/Clikengo-foundationdb-rs/foundationdb/src/database.rs`'s
/// `TransactOption`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryOptions {
    pub retry_limit: Option<u32>,
    pub time_out: Option<Duration>,
}

impl RetryOptions {
    pub fn with_retry_limit(limit: u32) -> Self {
        RetryOptions {
            retry_limit: Some(limit),
            time_out: None,
        }
    }
}

/// Runs `body` inside a retry loop: creates a fresh [`DirTransaction`],
/// invokes `body`, and commits. On a retryable `DirError::Fdb` (from either
/// the body or the commit) it clears `cache` and tries again with a new
/// transaction, up to `options`'s limit. Any other error — including a
/// non-retryable FDB error — is returned immediately.
///
/// # Warning
///
/// With no `retry_limit` or `time_out` set, a sufficiently contended body
/// retries indefinitely.
pub async fn with_directory_retry<F, Fut, T>(
    db: &Database,
    cache: &CacheContext,
    options: RetryOptions,
    mut body: F,
) -> DirResult<T>
where
    F: FnMut(DirTransaction) -> Fut,
    Fut: Future<Output = DirResult<T>>,
{
    let deadline = options.time_out.map(|d| Instant::now() + d);
    let mut tries: u32 = 0;
    let mut can_retry = move || {
        tries += 1;
        options.retry_limit.map_or(true, |limit| tries < limit)
            && deadline.map_or(true, |t| Instant::now() < t)
    };

    loop {
        let txn = db.create_trx()?;
        let dir_trx = DirTransaction::new(txn);

        match body(dir_trx.clone()).await {
            Ok(value) => match dir_trx.commit().await {
                Ok(()) => return Ok(value),
                Err(e) if e.is_retryable() && can_retry() => {
                    cache.clear()?;
                    continue;
                }
                Err(e) => return Err(DirError::Fdb(e)),
            },
            Err(DirError::Fdb(e)) if e.is_retryable() && can_retry() => {
                cache.clear()?;
                continue;
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_options_default_has_no_bound() {
        let options = RetryOptions::default();
        assert!(options.retry_limit.is_none());
        assert!(options.time_out.is_none());
    }

    #[test]
    fn with_retry_limit_sets_only_the_limit() {
        let options = RetryOptions::with_retry_limit(5);
        assert_eq!(options.retry_limit, Some(5));
        assert!(options.time_out.is_none());
    }
}
