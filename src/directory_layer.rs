// Copyright 2018 foundationdb-rs developers, https://github.com/Clikengo/foundationdb-rs/graphs/contributors
// Copyright 2013-2018 Apple, Inc and the FoundationDB project authors.
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The default `Directory` implementation (component E, main entry point).
//!
//! Grounded on
//! `examples/Clikengo-foundationdb-rs/foundationdb/src/directory/directory_layer.rs`.
//! The teacher represents a nested partition as a *second* `DirectoryLayer`
//! instance (built with a different node/content subspace) and re-dispatches
//! whole operations to it recursively. This crate has exactly one
//! `DirectoryLayer` per root; [`locate`](DirectoryLayer::locate) plays the
//! same role by threading the active [`PartitionDescriptor`] through the
//! recursion explicitly instead of swapping `self`.

use std::cmp::Ordering;
use std::sync::Arc;

use async_recursion::async_recursion;
use async_trait::async_trait;
use foundationdb::tuple::{Element, Subspace};
use foundationdb::RangeOption;

use crate::cache::{CacheContext, CachedSubspace};
use crate::compare_slice;
use crate::directory::{Directory, DirectoryOutput};
use crate::directory_partition::DirectoryPartition;
use crate::directory_subspace::DirectorySubspace;
use crate::error::{DirError, DirResult};
use crate::node::{self, Node, LAYER_SUFFIX, SUB_DIRS};
use crate::partition::PartitionDescriptor;
use crate::path::{FdbPath, PARTITION_LAYER};
use crate::strinc;
use crate::txn_state::DirTransaction;

const DEFAULT_NODE_PREFIX: &[u8] = b"\xFE";

/// The root of one Directory Layer tree. The node subspace and content
/// subspace control where directory metadata and contents, respectively, are
/// stored; the default has node subspace `\xFE` and content subspace empty.
#[derive(Clone)]
pub struct DirectoryLayer {
    pub(crate) inner: Arc<DirectoryLayerInner>,
}

pub(crate) struct DirectoryLayerInner {
    root: PartitionDescriptor,
    allow_manual_prefixes: bool,
    cache: CacheContext,
}

impl std::fmt::Debug for DirectoryLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryLayer")
            .field("root_nodes_prefix", &self.inner.root.nodes.bytes())
            .field("allow_manual_prefixes", &self.inner.allow_manual_prefixes)
            .finish()
    }
}

impl Default for DirectoryLayer {
    /// Stores directory layer metadata in keys beginning with `\xFE`, and
    /// allocates newly created directories in unused prefixes starting with
    /// `\x00` through `\xFD`. Appropriate for an otherwise empty database.
    fn default() -> Self {
        Self::new(
            Subspace::from_bytes(DEFAULT_NODE_PREFIX),
            Subspace::all(),
            false,
        )
    }
}

impl DirectoryLayer {
    pub fn new(node_subspace: Subspace, content_subspace: Subspace, allow_manual_prefixes: bool) -> Self {
        DirectoryLayer {
            inner: Arc::new(DirectoryLayerInner {
                root: PartitionDescriptor::new(node_subspace, content_subspace),
                allow_manual_prefixes,
                cache: CacheContext::new(),
            }),
        }
    }

    /// The process-wide cache backing this layer's cached reads. Shared by
    /// every `DirectoryLayer` value cloned from this one.
    pub fn cache(&self) -> &CacheContext {
        &self.inner.cache
    }

    fn contents_of(&self, prefix: Vec<u8>, path: FdbPath, layer: Vec<u8>) -> DirectoryOutput {
        if layer == PARTITION_LAYER.as_bytes() {
            DirectoryOutput::DirectoryPartition(DirectoryPartition::new(path, prefix, self.clone()))
        } else {
            DirectoryOutput::DirectorySubspace(DirectorySubspace::new(path, prefix, self.clone(), layer))
        }
    }

    fn contents_of_node(&self, node: &Node, path: FdbPath) -> DirResult<DirectoryOutput> {
        let subspace = node
            .subspace
            .as_ref()
            .expect("contents_of_node called on a missing node");
        let prefix: Vec<u8> = node.partition.nodes.unpack(subspace.bytes())?;
        Ok(self.contents_of(prefix, path, node.layer.clone()))
    }

    /// Walks `subpath` within `partition`, crossing into a nested partition
    /// (and recursing with the remaining subpath) whenever the walk reaches
    /// a partition root with more path left to resolve. Stops, without
    /// crossing, at a partition root that is itself the final target.
    #[async_recursion]
    async fn locate(
        &self,
        trx: &DirTransaction,
        partition: &PartitionDescriptor,
        subpath: &FdbPath,
    ) -> DirResult<Node> {
        let node = node::find(trx, partition, subpath).await?;
        if node.is_partition_root(false) {
            let remaining = node.partition_subpath();
            let (_, child_partition) = self.enter_partition(&node)?;
            self.locate(trx, &child_partition, &remaining).await
        } else {
            Ok(node)
        }
    }

    /// If `node` is itself a partition root, returns the nested partition's
    /// root subspace and descriptor. Otherwise returns the node's own
    /// subspace and partition unchanged. Used both by [`Self::locate`]
    /// (crossing mid-walk) and by operations that need to treat an
    /// already-resolved node as a container for new children (e.g. creating
    /// a directory whose parent turns out to be a partition).
    fn enter_partition(&self, node: &Node) -> DirResult<(Subspace, PartitionDescriptor)> {
        if node.exists() && node.layer == PARTITION_LAYER.as_bytes() {
            let subspace = node.subspace.as_ref().unwrap();
            let prefix: Vec<u8> = node.partition.nodes.unpack(subspace.bytes())?;
            let child = node.partition.create_child(prefix);
            Ok((child.root_node.clone(), child))
        } else {
            let subspace = node
                .subspace
                .clone()
                .ok_or_else(|| DirError::NotFound { path: node.current_path.to_string() })?;
            Ok((subspace, node.partition.clone()))
        }
    }

    /// Resolves `path` using the process-wide cache when the transaction's
    /// mode allows it, falling back to [`Self::locate`] (and populating the
    /// cache afterwards) on a miss.
    async fn resolve(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<Resolution> {
        let cache_usable = trx.enter_cached()?;
        if cache_usable && self.inner.cache.admit(trx).await? {
            if let Some(slot) = self.inner.cache.lookup(trx, path).await? {
                return Ok(Resolution::Cached(
                    slot.map(|cached| self.contents_of(cached.prefix, path.clone(), cached.layer)),
                ));
            }
        }

        let node = self.locate(trx, &self.inner.root, path).await?;
        let slot = if node.exists() {
            let subspace = node.subspace.as_ref().unwrap();
            let prefix: Vec<u8> = node.partition.nodes.unpack(subspace.bytes())?;
            Some(CachedSubspace {
                prefix,
                layer: node.layer.clone(),
                chain: node.chain.clone(),
            })
        } else {
            None
        };
        self.inner.cache.insert(path.clone(), slot)?;
        Ok(Resolution::Fresh(node))
    }

    #[async_recursion]
    async fn create_or_open_internal(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Option<Vec<u8>>,
        layer: Option<Vec<u8>>,
        allow_create: bool,
        allow_open: bool,
    ) -> DirResult<DirectoryOutput> {
        if path.is_root() {
            return Err(DirError::InvalidPath {
                reason: "path must not be empty".to_string(),
            });
        }
        if prefix.is_some() && !self.inner.allow_manual_prefixes {
            return Err(DirError::PrefixCollision {
                reason: "this directory layer does not allow manually-specified prefixes".to_string(),
            });
        }
        // `allow_manual_prefixes` is a tree-wide flag, but a manual prefix is only ever
        // safe directly under the root partition; `create_internal` rejects it again
        // once the parent partition actually resolved, so a permissive root layer can't
        // leak the permission into a nested partition's own node tree.
        self.inner.root.check_version(trx, allow_create, allow_create).await?;

        match self.resolve(trx, path).await? {
            Resolution::Cached(Some(output)) => {
                Self::open_existing(layer, &output.get_layer(), output, allow_open)
            }
            Resolution::Cached(None) => {
                self.create_internal(trx, path, layer, prefix, allow_create).await
            }
            Resolution::Fresh(node) if node.exists() => {
                let output = self.contents_of_node(&node, path.clone())?;
                Self::open_existing(layer, &node.layer, output, allow_open)
            }
            Resolution::Fresh(_) => {
                self.create_internal(trx, path, layer, prefix, allow_create).await
            }
        }
    }

    fn open_existing(
        requested_layer: Option<Vec<u8>>,
        stored_layer: &[u8],
        output: DirectoryOutput,
        allow_open: bool,
    ) -> DirResult<DirectoryOutput> {
        if !allow_open {
            return Err(DirError::AlreadyExists {
                path: output.get_path().to_string(),
            });
        }
        if let Some(requested) = requested_layer {
            if !requested.is_empty() && compare_slice(&requested, stored_layer) != Ordering::Equal {
                return Err(DirError::LayerMismatch {
                    path: output.get_path().to_string(),
                    expected: String::from_utf8_lossy(&requested).into_owned(),
                    found: String::from_utf8_lossy(stored_layer).into_owned(),
                });
            }
        }
        Ok(output)
    }

    async fn create_internal(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        layer: Option<Vec<u8>>,
        prefix: Option<Vec<u8>>,
        allow_create: bool,
    ) -> DirResult<DirectoryOutput> {
        if !allow_create {
            return Err(DirError::NotFound { path: path.to_string() });
        }
        trx.enter_mutated()?;
        let layer = layer.unwrap_or_default();

        let (parent_subspace, parent_partition) = self.get_or_create_parent(trx, path).await?;
        parent_partition.check_version(trx, true, true).await?;

        if prefix.is_some() && parent_partition.nodes.bytes() != self.inner.root.nodes.bytes() {
            return Err(DirError::PrefixCollision {
                reason: "manually-specified prefixes are only allowed directly under the root directory layer, not inside a partition".to_string(),
            });
        }

        let new_prefix = self.get_prefix(trx, &parent_partition, prefix.clone()).await?;
        if !self
            .is_prefix_free(trx, &parent_partition, &new_prefix, prefix.is_none())
            .await?
        {
            return Err(DirError::PrefixCollision {
                reason: format!("prefix {new_prefix:?} is already in use"),
            });
        }

        let name = path
            .last_name()
            .expect("create_internal is never called with the root path")
            .to_string();
        let edge_key = parent_subspace.pack(&(SUB_DIRS, name));
        let child_subspace = parent_partition.nodes.subspace(&new_prefix);
        let layer_key = child_subspace.pack(&LAYER_SUFFIX.to_vec());

        trx.inner().set(&edge_key, &new_prefix);
        trx.inner().set(&layer_key, &layer);
        parent_partition.bump_stamp(trx);
        crate::metadata_version::touch(trx.inner());
        self.inner.cache.evict_subtree(path)?;

        tracing::debug!(path = %path, layer = %String::from_utf8_lossy(&layer), "directory created");

        Ok(self.contents_of(new_prefix, path.clone(), layer))
    }

    /// Ensures the parent directory of `path` exists (creating missing
    /// ancestors, mirroring `mkdir -p`), and returns the subspace and
    /// partition a new child of `path`'s parent should be written into.
    async fn get_or_create_parent(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
    ) -> DirResult<(Subspace, PartitionDescriptor)> {
        let parent_path = path.parent();
        if parent_path.is_root() {
            return Ok((self.inner.root.root_node.clone(), self.inner.root.clone()));
        }

        self.create_or_open_internal(trx, &parent_path, None, None, true, true)
            .await?;
        let parent_node = self.locate(trx, &self.inner.root, &parent_path).await?;
        self.enter_partition(&parent_node)
    }

    async fn is_prefix_free(
        &self,
        trx: &DirTransaction,
        partition: &PartitionDescriptor,
        prefix: &[u8],
        snapshot: bool,
    ) -> DirResult<bool> {
        if prefix.is_empty() {
            return Ok(false);
        }
        if self
            .node_containing_key(trx, partition, prefix, snapshot)
            .await?
            .is_some()
        {
            return Ok(false);
        }

        let begin = partition.nodes.pack(&prefix.to_vec());
        let end = partition.nodes.pack(&strinc(prefix.to_vec()));
        let range = RangeOption::from((begin, end));
        let result = trx.inner().get_range(&range, 1, snapshot).await?;
        Ok(result.is_empty())
    }

    async fn node_containing_key(
        &self,
        trx: &DirTransaction,
        partition: &PartitionDescriptor,
        key: &[u8],
        snapshot: bool,
    ) -> DirResult<Option<Subspace>> {
        if key.starts_with(partition.nodes.bytes()) {
            return Ok(Some(partition.root_node.clone()));
        }

        let mut key_after = key.to_vec();
        key_after.push(0x00);
        let range_end = partition.nodes.pack(&key_after);
        let mut range = RangeOption::from((partition.nodes.range().0, range_end));
        range.reverse = true;
        range.limit = Some(1);

        let values = trx.inner().get_range(&range, 1, snapshot).await?;
        if let Some(kv) = values.get(0) {
            let unpacked: Vec<Element> = partition.nodes.unpack(kv.key())?;
            if let Some(Element::Bytes(candidate)) = unpacked.first() {
                let candidate = candidate.to_vec();
                if key.starts_with(&candidate) {
                    return Ok(Some(partition.nodes.subspace(&candidate)));
                }
            }
        }
        Ok(None)
    }

    async fn get_prefix(
        &self,
        trx: &DirTransaction,
        partition: &PartitionDescriptor,
        prefix: Option<Vec<u8>>,
    ) -> DirResult<Vec<u8>> {
        match prefix {
            Some(p) => Ok(p),
            None => {
                let id = partition.allocator().allocate(trx).await?;
                let subspace = partition.content.subspace(&id);
                let range = RangeOption::from(subspace.range());
                let existing = trx.inner().get_range(&range, 1, false).await?;
                if !existing.is_empty() {
                    return Err(DirError::PrefixCollision {
                        reason: "allocated prefix is not empty".to_string(),
                    });
                }
                Ok(subspace.bytes().to_vec())
            }
        }
    }

    async fn exists_internal(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<bool> {
        self.inner.root.check_version(trx, false, false).await?;
        match self.resolve(trx, path).await? {
            Resolution::Cached(output) => Ok(output.is_some()),
            Resolution::Fresh(node) => Ok(node.exists()),
        }
    }

    async fn list_internal(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<Vec<String>> {
        self.inner.root.check_version(trx, false, false).await?;
        let node = self.locate(trx, &self.inner.root, path).await?;
        if !node.exists() {
            return Err(DirError::NotFound { path: path.to_string() });
        }
        let (subspace, _partition) = self.enter_partition(&node)?;

        let sub_dirs = subspace.subspace(&SUB_DIRS);
        let range = RangeOption::from(sub_dirs.range());
        let values = trx.inner().get_range(&range, 1024, false).await?;

        let mut names = Vec::with_capacity(values.len());
        for kv in &values {
            let (_sub_dirs, name): (i64, String) = subspace.unpack(kv.key())?;
            names.push(name);
        }
        Ok(names)
    }

    async fn move_to_internal(
        &self,
        trx: &DirTransaction,
        old_path: &FdbPath,
        new_path: &FdbPath,
    ) -> DirResult<DirectoryOutput> {
        trx.enter_mutated()?;
        self.inner.root.check_version(trx, true, true).await?;
        if new_path.is_root() {
            return Err(DirError::InvalidMove("cannot move a directory to the root".to_string()));
        }
        if new_path.starts_with(old_path) {
            return Err(DirError::InvalidMove(
                "the destination directory cannot be a subdirectory of the source directory".to_string(),
            ));
        }

        let old_node = self.locate(trx, &self.inner.root, old_path).await?;
        if !old_node.exists() {
            return Err(DirError::NotFound { path: old_path.to_string() });
        }

        let new_node = self.locate(trx, &self.inner.root, new_path).await?;
        if new_node.exists() {
            return Err(DirError::AlreadyExists { path: new_path.to_string() });
        }

        let new_parent_path = new_path.parent();
        let new_parent_node = self.locate(trx, &self.inner.root, &new_parent_path).await?;
        if !new_parent_node.exists() {
            return Err(DirError::NotFound { path: new_parent_path.to_string() });
        }

        let (new_parent_subspace, new_parent_partition) = self.enter_partition(&new_parent_node)?;
        if new_parent_partition.nodes.bytes() != old_node.partition.nodes.bytes() {
            return Err(DirError::InvalidMove(
                "move cannot cross a partition boundary".to_string(),
            ));
        }

        let value: Vec<u8> = old_node.partition.nodes.unpack(old_node.subspace.as_ref().unwrap().bytes())?;
        let name = new_path.last_name().expect("new_path is not root").to_string();
        let key = new_parent_subspace.pack(&(SUB_DIRS, name));
        trx.inner().set(&key, &value);

        let old_name = old_path.last_name().expect("old_path is not root").to_string();
        let old_edge_key = old_node.parent_subspace.pack(&(SUB_DIRS, old_name));
        trx.inner().clear(&old_edge_key);

        new_parent_partition.bump_stamp(trx);
        crate::metadata_version::touch(trx.inner());
        self.inner.cache.clear()?;

        tracing::debug!(from = %old_path, to = %new_path, "directory moved");

        Ok(self.contents_of(value, new_path.clone(), old_node.layer))
    }

    #[async_recursion]
    async fn remove_internal(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        fail_on_nonexistent: bool,
    ) -> DirResult<bool> {
        trx.enter_mutated()?;
        self.inner.root.check_version(trx, true, true).await?;
        if path.is_root() {
            return Err(DirError::RootNotModifiable);
        }

        let node = self.locate(trx, &self.inner.root, path).await?;
        if !node.exists() {
            return if fail_on_nonexistent {
                Err(DirError::NotFound { path: path.to_string() })
            } else {
                Ok(false)
            };
        }

        self.remove_recursive(trx, &node.partition, node.subspace.clone().unwrap())
            .await?;
        let name = path.last_name().expect("path is not root").to_string();
        trx.inner().clear(&node.parent_subspace.pack(&(SUB_DIRS, name)));
        node.partition.bump_stamp(trx);
        crate::metadata_version::touch(trx.inner());
        self.inner.cache.evict_subtree(path)?;

        tracing::debug!(path = %path, "directory removed");
        Ok(true)
    }

    #[async_recursion]
    async fn remove_recursive(
        &self,
        trx: &DirTransaction,
        partition: &PartitionDescriptor,
        node_subspace: Subspace,
    ) -> DirResult<()> {
        let sub_dirs = node_subspace.subspace(&SUB_DIRS);
        let (mut begin, end) = sub_dirs.range();

        loop {
            let range = RangeOption::from((begin.as_slice(), end.as_slice()));
            let values = trx.inner().get_range(&range, 1024, false).await?;
            let has_more = values.more();

            for kv in &values {
                let child_subspace = partition.nodes.subspace(&kv.value().to_vec());
                self.remove_recursive(trx, partition, child_subspace).await?;
                let mut next = kv.key().to_vec();
                next.push(0x00);
                begin = next;
            }

            if !has_more {
                break;
            }
        }

        let prefix: Vec<u8> = partition.nodes.unpack(node_subspace.bytes())?;
        trx.inner().clear_range(&prefix, &strinc(prefix.clone()));
        trx.inner().clear_subspace_range(&node_subspace);
        Ok(())
    }

    async fn change_layer_internal(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        new_layer: Vec<u8>,
    ) -> DirResult<DirectoryOutput> {
        trx.enter_mutated()?;
        if path.is_root() {
            return Err(DirError::RootNotModifiable);
        }
        if new_layer == PARTITION_LAYER.as_bytes() {
            return Err(DirError::InvalidMove(
                "change_layer cannot turn a directory into a partition".to_string(),
            ));
        }

        let node = self.locate(trx, &self.inner.root, path).await?;
        if !node.exists() {
            return Err(DirError::NotFound { path: path.to_string() });
        }
        if node.layer == PARTITION_LAYER.as_bytes() {
            return Err(DirError::InvalidMove(
                "change_layer cannot change the layer of a partition root".to_string(),
            ));
        }

        let subspace = node.subspace.as_ref().unwrap();
        let layer_key = subspace.pack(&LAYER_SUFFIX.to_vec());
        trx.inner().set(&layer_key, &new_layer);
        node.partition.bump_stamp(trx);
        crate::metadata_version::touch(trx.inner());
        self.inner.cache.evict_subtree(path)?;

        let prefix: Vec<u8> = node.partition.nodes.unpack(subspace.bytes())?;
        Ok(self.contents_of(prefix, path.clone(), new_layer))
    }
}

/// The outcome of [`DirectoryLayer::resolve`]: either a cache hit (already a
/// finished [`DirectoryOutput`] or a confirmed absence) or a fresh traversal
/// result that still needs interpreting.
enum Resolution {
    Cached(Option<DirectoryOutput>),
    Fresh(Node),
}

#[async_trait]
impl Directory for DirectoryLayer {
    async fn create_or_open(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Option<Vec<u8>>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput> {
        self.create_or_open_internal(trx, path, prefix, layer, true, true).await
    }

    async fn create(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Option<Vec<u8>>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput> {
        self.create_or_open_internal(trx, path, prefix, layer, true, false).await
    }

    async fn open(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput> {
        self.create_or_open_internal(trx, path, None, layer, false, true).await
    }

    async fn register(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Vec<u8>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput> {
        self.create_or_open_internal(trx, path, Some(prefix), layer, true, false).await
    }

    async fn exists(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<bool> {
        self.exists_internal(trx, path).await
    }

    async fn move_directory(&self, _trx: &DirTransaction, _new_path: &FdbPath) -> DirResult<DirectoryOutput> {
        Err(DirError::RootNotModifiable)
    }

    async fn move_to(
        &self,
        trx: &DirTransaction,
        old_path: &FdbPath,
        new_path: &FdbPath,
    ) -> DirResult<DirectoryOutput> {
        self.move_to_internal(trx, old_path, new_path).await
    }

    async fn remove(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<bool> {
        self.remove_internal(trx, path, true).await
    }

    async fn remove_if_exists(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<bool> {
        self.remove_internal(trx, path, false).await
    }

    async fn list(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<Vec<String>> {
        self.list_internal(trx, path).await
    }

    async fn change_layer(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        new_layer: Vec<u8>,
    ) -> DirResult<DirectoryOutput> {
        self.change_layer_internal(trx, path, new_layer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layer_uses_fe_node_prefix() {
        let layer = DirectoryLayer::default();
        assert_eq!(layer.inner.root.nodes.bytes(), DEFAULT_NODE_PREFIX);
        assert!(!layer.inner.allow_manual_prefixes);
    }
}
