// Copyright 2018 foundationdb-rs developers, https://github.com/Clikengo/foundationdb-rs/graphs/contributors
// Copyright 2013-2018 Apple, Inc and the FoundationDB project authors.
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A Directory Layer for FoundationDB.
//!
//! The FoundationDB API provides directories as a tool for managing related
//! subspaces. Directories are identified by hierarchical paths analogous to
//! paths in a Unix-like file system, and each directory is mapped to a short,
//! allocated byte prefix so application keys stay small.
//!
//! This crate implements the layer on top of the `foundationdb` crate: the
//! node tree encoding, the high-contention allocator, nested partitions, a
//! per-process cache of path-to-subspace bindings, and the transaction mode
//! lock that keeps cached reads and mutations from interfering within one
//! transaction.
//!
//! It is a backport, generalized and extended, of the
//! [Flow implementation](https://github.com/apple/foundationdb/tree/master/bindings/flow).
//!
//! ```no_run
//! use fdb_directory::{Directory, DirectoryLayer};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = foundationdb::Database::default()?;
//!     let layer = DirectoryLayer::default();
//!     let trx = fdb_directory::DirTransaction::new(db.create_trx()?);
//!
//!     let app = layer
//!         .create_or_open(&trx, &fdb_directory::FdbPath::parse("/my-app/users")?, None, None)
//!         .await?;
//!     let _ = app.bytes();
//!
//!     trx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod allocator;
pub mod cache;
pub mod directory;
pub mod directory_layer;
pub mod directory_partition;
pub mod directory_subspace;
pub mod error;
pub(crate) mod metadata_version;
pub(crate) mod node;
pub mod partition;
pub mod path;
pub mod retry;
pub mod txn_state;

pub use crate::allocator::HighContentionAllocator;
pub use crate::cache::CacheContext;
pub use crate::directory::{Directory, DirectoryOutput};
pub use crate::directory_layer::DirectoryLayer;
pub use crate::directory_partition::DirectoryPartition;
pub use crate::directory_subspace::DirectorySubspace;
pub use crate::error::DirError;
pub use crate::path::FdbPath;
pub use crate::retry::with_directory_retry;
pub use crate::txn_state::DirTransaction;

pub(crate) fn compare_slice<T: Ord>(a: &[T], b: &[T]) -> std::cmp::Ordering {
    for (ai, bi) in a.iter().zip(b.iter()) {
        match ai.cmp(bi) {
            std::cmp::Ordering::Equal => continue,
            ord => return ord,
        }
    }
    a.len().cmp(&b.len())
}

/// Returns the first key that would sort outside the range prefixed by `key`.
pub(crate) fn strinc(key: Vec<u8>) -> Vec<u8> {
    let mut key = key;

    for i in (0..key.len()).rev() {
        if key[i] != 0xff {
            key[i] += 1;
            key.truncate(i + 1);
            return key;
        }
    }
    panic!("failed to strinc: key is all 0xff bytes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// `strinc(prefix)` is the first key that sorts outside the range of
        /// keys prefixed by `prefix`: every key starting with `prefix` compares
        /// less than `strinc(prefix)`, and `prefix` itself always does too —
        /// the property the directory layer's node-tree and content clears
        /// rely on to bound a `clear_range` to exactly one subtree.
        #[test]
        fn strinc_bounds_the_prefix_range(
            prefix in proptest::collection::vec(0u8..0xff, 1..8),
            suffix in proptest::collection::vec(any::<u8>(), 0..8),
        ) {
            let mut key = prefix.clone();
            key.extend_from_slice(&suffix);
            let bound = strinc(prefix.clone());

            prop_assert!(compare_slice(&prefix, &bound) == std::cmp::Ordering::Less);
            prop_assert!(compare_slice(&key, &bound) == std::cmp::Ordering::Less);
        }
    }

    // https://github.com/apple/foundationdb/blob/e34df983ee8c0db333babf36fb620318d026553d/bindings/c/test/unit/unit_tests.cpp#L95
    #[test]
    fn test_strinc() {
        assert_eq!(strinc(Vec::from("a".as_bytes())), Vec::from("b".as_bytes()));
        assert_eq!(strinc(Vec::from("y".as_bytes())), Vec::from("z".as_bytes()));
        assert_eq!(
            strinc(Vec::from("!".as_bytes())),
            Vec::from("\"".as_bytes())
        );
        assert_eq!(strinc(Vec::from("*".as_bytes())), Vec::from("+".as_bytes()));
        assert_eq!(
            strinc(Vec::from("fdb".as_bytes())),
            Vec::from("fdc".as_bytes())
        );

        assert_eq!(strinc(vec![61u8, 62u8, 255u8]), vec![61u8, 63u8]);
        assert_eq!(strinc(vec![253u8, 255u8]), vec![254u8]);
        assert_eq!(strinc(vec![253u8, 255u8, 255u8]), vec![254u8]);
    }

    #[test]
    #[should_panic(expected = "failed to strinc")]
    fn test_strinc_all_ff_panics() {
        strinc(vec![0xff, 0xff]);
    }
}
