// Copyright 2018 foundationdb-rs developers, https://github.com/Clikengo/foundationdb-rs/graphs/contributors
// Copyright 2013-2018 Apple, Inc and the FoundationDB project authors.
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The high-contention allocator (component D).
//!
//! Mints unique `i64` ids under many concurrent writers with minimal commit
//! conflicts, by probing a randomly-chosen candidate in a sliding window
//! rather than handing out a single shared counter value. Directly grounded
//! on `examples/Clikengo-foundationdb-rs/foundationdb/src/tuple/hca.rs`,
//! which already implements this algorithm; adapted here to operate through
//! [`DirTransaction`] and to report [`DirError`] instead of a bespoke
//! `HcaError`.
//!
//! The allocation process works over candidate value windows, using two
//! subspaces: "counters" holds a single key per window, `window_start ->
//! count`, the number of allocations made in that window; "recents" holds one
//! key per candidate that has ever been handed out, `candidate -> ()`.
//!
//! Assignment has two stages, run in a loop until both succeed:
//! 1. Find the current window. Scan "counters" for the highest `window_start`
//!    and its count. If the window is more than half full, advance it
//!    (clear both subspaces below the new start) and retry step 1.
//! 2. Pick a candidate in `[window_start, window_start + window_size)` and
//!    try to claim "recents : candidate". If the write succeeds (the key was
//!    empty), the candidate is the allocated id.

use std::sync::Mutex;

use foundationdb::future::FdbValues;
use foundationdb::options::{ConflictRangeType, MutationType, TransactionOption};
use foundationdb::tuple::Subspace;
use foundationdb::{KeySelector, RangeOption};
use rand::Rng;

use crate::error::DirError;
use crate::txn_state::DirTransaction;

const ONE_BYTES: &[u8] = &1i64.to_le_bytes();

/// Mints unique short `i64` ids for one subspace. The subspace passed to
/// [`HighContentionAllocator::new`] must not be used for anything else.
#[derive(Debug)]
pub struct HighContentionAllocator {
    counters: Subspace,
    recent: Subspace,
    allocation_mutex: Mutex<()>,
}

impl HighContentionAllocator {
    /// Constructs an allocator scoped to `subspace` (conventionally
    /// `Nodes+encode(Nodes, "hca")` for a partition's directory allocator).
    pub fn new(subspace: Subspace) -> Self {
        HighContentionAllocator {
            counters: subspace.subspace(&0i64),
            recent: subspace.subspace(&1i64),
            allocation_mutex: Mutex::new(()),
        }
    }

    /// Returns an id that (1) has never and will never be returned again by
    /// this allocator, and (2) is nearly as short as possible given (1).
    pub async fn allocate(&self, trx: &DirTransaction) -> Result<i64, DirError> {
        let (begin, end) = self.counters.range();
        let counters_range = RangeOption {
            begin: KeySelector::first_greater_or_equal(begin),
            end: KeySelector::first_greater_than(end),
            limit: Some(1),
            reverse: true,
            ..RangeOption::default()
        };
        let mut rng = rand::thread_rng();

        loop {
            let kvs = trx.inner().get_range(&counters_range, 1, true).await?;
            let mut start = latest_window_start(&self.counters, &kvs)?;
            let mut window_advanced = false;

            let window = loop {
                let counters_start = self.counters.subspace(&start);
                let guard = self
                    .allocation_mutex
                    .lock()
                    .map_err(|_| DirError::CacheMisuse("allocator mutex poisoned".to_string()))?;

                if window_advanced {
                    trx.inner()
                        .clear_range(self.counters.bytes(), counters_start.bytes());
                    trx.inner()
                        .set_option(TransactionOption::NextWriteNoWriteConflictRange)?;
                    trx.inner().clear_range(
                        self.recent.bytes(),
                        self.recent.subspace(&start).bytes(),
                    );
                    tracing::debug!(new_start = start, "high-contention allocator window advanced");
                }

                trx.inner()
                    .atomic_op(counters_start.bytes(), ONE_BYTES, MutationType::Add);
                let count_future = trx.inner().get(counters_start.bytes(), true);
                drop(guard);

                let count = match count_future.await? {
                    None => 0,
                    Some(bytes) => {
                        if bytes.len() != 8 {
                            return Err(DirError::IncompatibleLayerVersion(
                                "malformed allocator counter".to_string(),
                            ));
                        }
                        let mut arr = [0u8; 8];
                        arr.copy_from_slice(&bytes);
                        i64::from_le_bytes(arr)
                    }
                };

                let window = window_size(start);
                if count * 2 < window {
                    break window;
                }
                start += window;
                window_advanced = true;
            };

            loop {
                // As of the snapshot read from, the window is less than half
                // full, so this is expected to take 2 tries on average. Under
                // contention there is an additional risk of conflict.
                let candidate = rng.gen_range(start..start + window);
                let recent_candidate = self.recent.subspace(&candidate);

                let guard = self
                    .allocation_mutex
                    .lock()
                    .map_err(|_| DirError::CacheMisuse("allocator mutex poisoned".to_string()))?;
                let latest = trx.inner().get_range(&counters_range, 1, true);
                let candidate_value = trx.inner().get(recent_candidate.bytes(), false);
                trx.inner()
                    .set_option(TransactionOption::NextWriteNoWriteConflictRange)?;
                trx.inner().set(recent_candidate.bytes(), &[]);
                drop(guard);

                let (latest, candidate_value) =
                    futures::future::try_join(latest, candidate_value).await?;

                let current_window_start = latest_window_start(&self.counters, &latest)?;
                if current_window_start > start {
                    break;
                }

                if candidate_value.is_none() {
                    let mut after = recent_candidate.bytes().to_vec();
                    after.push(0x00);
                    trx.inner().add_conflict_range(
                        recent_candidate.bytes(),
                        &after,
                        ConflictRangeType::Write,
                    )?;
                    return Ok(candidate);
                }
            }
        }
    }

}

fn latest_window_start(counters: &Subspace, kvs: &FdbValues) -> Result<i64, DirError> {
    match kvs.iter().next() {
        None => Ok(0),
        Some(kv) => Ok(counters.unpack(kv.key())?),
    }
}

/// Larger windows are better under high contention (fewer probes to find a
/// free candidate); smaller windows keep keys short when there is little
/// contention. Windows only grow, never shrink, for a given allocator.
fn window_size(start: i64) -> i64 {
    match start {
        s if s < 255 => 64,
        s if s < 65535 => 1024,
        _ => 8192,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_size_steps() {
        assert_eq!(window_size(0), 64);
        assert_eq!(window_size(254), 64);
        assert_eq!(window_size(255), 1024);
        assert_eq!(window_size(65534), 1024);
        assert_eq!(window_size(65535), 8192);
        assert_eq!(window_size(1_000_000), 8192);
    }

    #[test]
    fn window_size_is_monotonic_non_decreasing() {
        let mut prev = 0;
        for start in (0..200_000).step_by(997) {
            let w = window_size(start);
            assert!(w >= prev);
            prev = w;
        }
    }

}
