//! Access to FoundationDB's well-known `\xFF/metadataVersion` system key.
//!
//! The metadata-version key changes value (to an opaque version-stamp) at
//! most once per committed transaction, regardless of how many other keys
//! that transaction touched. The cache context (`crate::cache`) uses it as a
//! cheap "has anything in the whole cluster changed since I last checked"
//! gate before falling back to the more targeted per-partition stamp checks.

use foundationdb::options::MutationType;
use foundationdb::Transaction;

const METADATA_VERSION_KEY: &[u8] = b"\xff/metadataVersion";
const ZERO_VERSIONSTAMP: &[u8] = &[0u8; 14];

/// Reads the current value of the metadata-version key.
///
/// Returns `None` if the key was touched earlier in the *same* transaction
/// (FoundationDB returns the key as unreadable mid-transaction in that case,
/// per spec §4.F) — callers must treat that as "bypass the cache for this
/// transaction" rather than "nothing has changed".
pub(crate) async fn read(trx: &Transaction) -> Result<Option<Vec<u8>>, foundationdb::FdbError> {
    Ok(trx
        .get(METADATA_VERSION_KEY, false)
        .await?
        .map(|slice| slice.to_vec()))
}

/// Marks the metadata-version key dirty for this transaction's commit,
/// causing every reader that later calls [`read`] to observe a new value.
pub(crate) fn touch(trx: &Transaction) {
    trx.atomic_op(
        METADATA_VERSION_KEY,
        ZERO_VERSIONSTAMP,
        MutationType::SetVersionstampedValue,
    );
}
