//! The node finder (component C).
//!
//! Traverses the node tree for a path, crossing partition boundaries as it
//! goes, and returns both the resulting node's metadata and the validation
//! chain a cache can later use to detect staleness without re-traversing.

use foundationdb::tuple::Subspace;

use crate::error::DirError;
use crate::partition::PartitionDescriptor;
use crate::path::{FdbPath, PARTITION_LAYER};
use crate::txn_state::DirTransaction;

pub(crate) const SUB_DIRS: i64 = 0;
pub(crate) const LAYER_SUFFIX: &[u8] = b"layer";

/// One `(key, observed value)` pair read while locating a directory, whose
/// continued truth at a later read-version implies the binding found is
/// still valid (spec invariant 5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// The ordered set of [`ValidationPair`]s produced by one traversal. Grows
/// O(depth-of-partitions-crossed), not O(depth-of-path): only partition stamp
/// keys are recorded, since child-edge reads within one partition are already
/// covered transitively by that partition's stamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationChain {
    pairs: Vec<ValidationPair>,
}

impl ValidationChain {
    pub fn new() -> Self {
        ValidationChain { pairs: Vec::new() }
    }

    pub fn push(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.pairs.push(ValidationPair { key, value });
    }

    pub fn pairs(&self) -> &[ValidationPair] {
        &self.pairs
    }

    /// Re-reads every key in the chain (non-snapshot, so FDB's own
    /// conflict-range machinery protects this transaction against concurrent
    /// changes) and compares against the recorded value. Returns `true` if
    /// every pair still holds.
    pub async fn still_valid(&self, trx: &DirTransaction) -> Result<bool, DirError> {
        for pair in &self.pairs {
            let current = trx.inner().get(&pair.key, false).await?;
            match current {
                Some(v) if v.as_ref() == pair.value.as_slice() => continue,
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}

/// The result of locating a path: either the node exists (with its prefix,
/// layer id, and owning partition) or it does not.
#[derive(Debug, Clone)]
pub struct Node {
    /// `None` if no node exists at the target path.
    pub subspace: Option<Subspace>,
    /// The path actually walked so far (used to compute partition subpaths).
    pub current_path: FdbPath,
    /// The path the caller asked for.
    pub target_path: FdbPath,
    /// The stored layer id, once metadata has been loaded.
    pub layer: Vec<u8>,
    /// The partition this node belongs to (the traversal never crosses a
    /// partition boundary by itself, so this is always the `partition`
    /// argument `find` was called with).
    pub partition: PartitionDescriptor,
    /// The subspace under which this node's own child-edge key lives — the
    /// last node subspace visited before this one. Used to write or clear
    /// this node's entry in its parent, and (when this node does not exist)
    /// as the insertion point for a new child.
    pub parent_subspace: Subspace,
    /// The validation chain accumulated while locating this node.
    pub chain: ValidationChain,
}

impl Node {
    pub fn exists(&self) -> bool {
        self.subspace.is_some()
    }

    /// True if this node's layer id is `"partition"` and (unless
    /// `include_empty_subpath`) there is more path left beyond this node.
    pub fn is_partition_root(&self, include_empty_subpath: bool) -> bool {
        self.exists()
            && self.layer == PARTITION_LAYER.as_bytes()
            && (include_empty_subpath || self.target_path.len() > self.current_path.len())
    }

    /// The remaining path segments below this node, to hand to the nested
    /// partition's own traversal once the caller has crossed into it.
    pub fn partition_subpath(&self) -> FdbPath {
        FdbPath::from_segments(self.target_path.suffix_after(self.current_path.len()))
    }
}

/// Walks `path` within `partition` only — stops (without crossing) the
/// moment it reaches a node whose layer is `"partition"`, exactly like
/// `examples/Clikengo-foundationdb-rs/foundationdb/src/directory/directory_layer.rs`'s
/// `find`. Crossing into that nested partition for any remaining segments is
/// the caller's job (`crate::directory_layer` re-invokes `find` rooted at the
/// nested partition for [`Node::partition_subpath`]), mirroring the way the
/// teacher re-dispatches to the nested partition's own `DirectoryLayer`.
pub async fn find(
    trx: &DirTransaction,
    partition: &PartitionDescriptor,
    path: &FdbPath,
) -> Result<Node, DirError> {
    let mut current_subspace = partition.root_node.clone();
    let mut current_path = FdbPath::root();
    let mut layer: Vec<u8> = Vec::new();
    let mut chain = ValidationChain::new();

    let stamp = partition.get_stamp_value(trx).await?;
    chain.push(partition.stamp_key(), stamp.to_le_bytes().to_vec());

    let mut node_subspace: Option<Subspace> = Some(current_subspace.clone());
    let mut parent_subspace = current_subspace.clone();

    for segment in path.segments() {
        parent_subspace = current_subspace.clone();
        current_path = current_path.add(segment.name.clone());

        let child_key = current_subspace.pack(&(SUB_DIRS, segment.name.clone()));
        let child_value = trx.inner().get(&child_key, false).await?;

        match child_value {
            None => {
                return Ok(Node {
                    subspace: None,
                    current_path,
                    target_path: path.clone(),
                    layer: Vec::new(),
                    partition: partition.clone(),
                    parent_subspace,
                    chain,
                });
            }
            Some(prefix) => {
                let prefix = prefix.to_vec();
                let child_subspace = partition.nodes.subspace(&prefix);
                let layer_key = child_subspace.pack(&LAYER_SUFFIX.to_vec());
                layer = match trx.inner().get(&layer_key, false).await? {
                    None => Vec::new(),
                    Some(v) => v.to_vec(),
                };

                current_subspace = child_subspace.clone();
                node_subspace = Some(child_subspace);

                if layer == PARTITION_LAYER.as_bytes() {
                    return Ok(Node {
                        subspace: node_subspace,
                        current_path,
                        target_path: path.clone(),
                        layer,
                        partition: partition.clone(),
                        parent_subspace,
                        chain,
                    });
                }
            }
        }
    }

    Ok(Node {
        subspace: node_subspace,
        current_path,
        target_path: path.clone(),
        layer,
        partition: partition.clone(),
        parent_subspace,
        chain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_chain_push_and_pairs() {
        let mut chain = ValidationChain::new();
        chain.push(b"a".to_vec(), b"1".to_vec());
        chain.push(b"b".to_vec(), b"2".to_vec());
        assert_eq!(chain.pairs().len(), 2);
        assert_eq!(chain.pairs()[0].key, b"a".to_vec());
    }

    #[test]
    fn partition_subpath_is_suffix_beyond_current() {
        let target = FdbPath::from_names(vec!["part", "inside", "deep"]);
        let node = Node {
            subspace: None,
            current_path: FdbPath::from_names(vec!["part"]),
            target_path: target.clone(),
            layer: PARTITION_LAYER.as_bytes().to_vec(),
            partition: PartitionDescriptor::new(
                Subspace::from_bytes(b"\xFE"),
                Subspace::from_bytes(b""),
            ),
            parent_subspace: Subspace::from_bytes(b"\xFE"),
            chain: ValidationChain::new(),
        };
        assert!(node.is_partition_root(true));
        let sub = node.partition_subpath();
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.segments()[0].name, "inside");
    }
}
