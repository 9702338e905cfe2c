//! The process-wide directory cache (component F).
//!
//! Caches the binding from a path to its allocated prefix and layer id, plus
//! the validation chain ([`crate::node::ValidationChain`]) that proves the
//! binding still holds as of a transaction's read version. Shared by every
//! transaction in the process (it is keyed by absolute path, not by
//! transaction), so a hit saves a full tree traversal even for a
//! transaction that has never looked up that path before.
//!
//! Two layers of staleness defense, cheapest first:
//! 1. FoundationDB's `\xFF/metadataVersion` key (`crate::metadata_version`):
//!    if it changed since the cache last checked, something in the cluster
//!    mutated and the whole cache is dropped rather than trusted piecemeal.
//! 2. The per-entry validation chain: re-read, non-snapshot, within the
//!    transaction doing the lookup. A stale chain evicts just that entry.
//!
//! A lookup miss on the metadata-version key (because this transaction
//! already wrote to it) is treated the same as "changed": the cache is
//! bypassed for that transaction, per spec §4.F.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::DirError;
use crate::node::ValidationChain;
use crate::path::FdbPath;
use crate::txn_state::DirTransaction;

/// The cached shape of a resolved directory: its allocated prefix, stored
/// layer id, and the chain that proves the binding.
#[derive(Debug, Clone)]
pub struct CachedSubspace {
    pub prefix: Vec<u8>,
    pub layer: Vec<u8>,
    pub chain: ValidationChain,
}

/// Either a confirmed binding (`Some`) or a confirmed absence (`None`) —
/// negative caching, so repeatedly probing a path that doesn't exist doesn't
/// cost a traversal every time either.
pub type CacheSlot = Option<CachedSubspace>;

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<FdbPath, CacheSlot>,
    last_metadata_version: Option<Vec<u8>>,
}

/// A process-wide, `Clone`-cheap handle to the directory cache. Every
/// `DirectoryLayer` built from the same root shares one `CacheContext`.
#[derive(Debug, Clone, Default)]
pub struct CacheContext {
    inner: Arc<RwLock<CacheInner>>,
}

impl CacheContext {
    pub fn new() -> Self {
        CacheContext::default()
    }

    /// Checks the metadata-version key for `trx`. If it has changed (or
    /// cannot be read because this transaction already wrote it), drops every
    /// cached entry and returns `false`: the caller must not trust any cache
    /// slot already read, and should not bother cache-reading further lookups
    /// for this transaction. Returns `true` if the cache remains usable.
    pub async fn admit(&self, trx: &DirTransaction) -> Result<bool, DirError> {
        let current = crate::metadata_version::read(trx.inner()).await?;

        let mut inner = self
            .inner
            .write()
            .map_err(|_| DirError::CacheMisuse("cache lock poisoned".to_string()))?;

        match &current {
            None => {
                inner.entries.clear();
                inner.last_metadata_version = None;
                Ok(false)
            }
            Some(value) => {
                if inner.last_metadata_version.as_ref() != Some(value) {
                    inner.entries.clear();
                    inner.last_metadata_version = Some(value.clone());
                }
                Ok(true)
            }
        }
    }

    /// Returns a cached slot for `path`, re-validating its chain against
    /// `trx` first. A chain that no longer validates is evicted and treated
    /// as a miss (`None`), not a negative hit.
    pub async fn lookup(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
    ) -> Result<Option<CacheSlot>, DirError> {
        let candidate = {
            let inner = self
                .inner
                .read()
                .map_err(|_| DirError::CacheMisuse("cache lock poisoned".to_string()))?;
            inner.entries.get(path).cloned()
        };

        let slot = match candidate {
            None => return Ok(None),
            Some(slot) => slot,
        };

        let still_valid = match &slot {
            None => true,
            Some(cached) => cached.chain.still_valid(trx).await?,
        };

        if !still_valid {
            self.evict_subtree(path)?;
            return Ok(None);
        }

        Ok(Some(slot))
    }

    /// Records a resolved (or negatively resolved) lookup for `path`.
    pub fn insert(&self, path: FdbPath, slot: CacheSlot) -> Result<(), DirError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| DirError::CacheMisuse("cache lock poisoned".to_string()))?;
        inner.entries.insert(path, slot);
        Ok(())
    }

    /// Drops `path` and every cached path below it, since a mutation at
    /// `path` (create, remove, move) invalidates anything that depended on
    /// its subtree having a particular shape.
    pub fn evict_subtree(&self, path: &FdbPath) -> Result<(), DirError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| DirError::CacheMisuse("cache lock poisoned".to_string()))?;
        inner
            .entries
            .retain(|cached_path, _| !cached_path.starts_with(path) && cached_path != path);
        Ok(())
    }

    /// Drops every cached entry unconditionally (used after a move, since
    /// both the source and destination subtrees may be cached under paths
    /// the mover doesn't itself enumerate).
    pub fn clear(&self) -> Result<(), DirError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| DirError::CacheMisuse("cache lock poisoned".to_string()))?;
        inner.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_context_default_is_empty() {
        let cache = CacheContext::new();
        let inner = cache.inner.read().unwrap();
        assert!(inner.entries.is_empty());
        assert!(inner.last_metadata_version.is_none());
    }

    #[test]
    fn insert_then_direct_lookup_bypassing_validation() {
        let cache = CacheContext::new();
        let path = FdbPath::from_names(vec!["a", "b"]);
        cache
            .insert(
                path.clone(),
                Some(CachedSubspace {
                    prefix: vec![0x15],
                    layer: Vec::new(),
                    chain: ValidationChain::new(),
                }),
            )
            .unwrap();
        let inner = cache.inner.read().unwrap();
        assert!(inner.entries.contains_key(&path));
    }

    #[test]
    fn evict_subtree_removes_descendants_but_not_siblings() {
        let cache = CacheContext::new();
        let parent = FdbPath::from_names(vec!["a"]);
        let child = FdbPath::from_names(vec!["a", "b"]);
        let sibling = FdbPath::from_names(vec!["c"]);
        for p in [&parent, &child, &sibling] {
            cache.insert(p.clone(), None).unwrap();
        }
        cache.evict_subtree(&parent).unwrap();
        let inner = cache.inner.read().unwrap();
        assert!(!inner.entries.contains_key(&parent));
        assert!(!inner.entries.contains_key(&child));
        assert!(inner.entries.contains_key(&sibling));
    }
}
