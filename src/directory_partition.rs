// Copyright 2018 foundationdb-rs developers, https://github.com/Clikengo/foundationdb-rs/graphs/contributors
// Copyright 2013-2018 Apple, Inc and the FoundationDB project authors.
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The root of a nested partition (component B).
//!
//! Grounded on
//! `examples/Clikengo-foundationdb-rs/foundationdb/src/directory/directory_partition.rs`.
//! The teacher builds a brand new `DirectoryLayer` rooted at the partition's
//! own prefix and wraps it in a `DirectorySubspace`. This crate keeps exactly
//! one `DirectoryLayer` per root, so a `DirectoryPartition` is just a marker:
//! a path and prefix remembered for display and equality, with every
//! operation delegated straight back to the single shared `DirectoryLayer`
//! using absolute paths. Crossing into the partition's own node subtree is
//! handled entirely by `DirectoryLayer::locate`/`enter_partition`, not here.

use async_trait::async_trait;
use foundationdb::tuple::{PackResult, Subspace, TuplePack, TupleUnpack};

use crate::directory::{Directory, DirectoryOutput};
use crate::directory_layer::DirectoryLayer;
use crate::error::DirResult;
use crate::path::{FdbPath, PARTITION_LAYER};
use crate::txn_state::DirTransaction;

/// A directory whose layer is `"partition"`: the root of an independently
/// numbered node tree. Cannot be used as a `Subspace` directly — only its
/// descendants hold keys.
#[derive(Debug, Clone)]
pub struct DirectoryPartition {
    directory_layer: DirectoryLayer,
    path: FdbPath,
    prefix: Vec<u8>,
}

impl DirectoryPartition {
    pub fn new(path: FdbPath, prefix: Vec<u8>, directory_layer: DirectoryLayer) -> Self {
        DirectoryPartition {
            directory_layer,
            path,
            prefix,
        }
    }

    fn absolute(&self, relative: &FdbPath) -> FdbPath {
        self.path.join(relative.segments())
    }

    pub fn get_path(&self) -> FdbPath {
        self.path.clone()
    }

    pub fn get_layer(&self) -> Vec<u8> {
        PARTITION_LAYER.as_bytes().to_vec()
    }

    /// The partition's own prefix, as stored in its parent's node tree. Not a
    /// usable key prefix by itself — see [`DirectoryOutput::bytes`].
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn subspace<T: TuplePack>(&self, _t: &T) -> Subspace {
        panic!("cannot open a subspace at the root of a directory partition")
    }

    pub fn bytes(&self) -> &[u8] {
        panic!("cannot get the key of the root of a directory partition")
    }

    pub fn pack<T: TuplePack>(&self, _t: &T) -> Vec<u8> {
        panic!("cannot pack using the root of a directory partition")
    }

    pub fn unpack<'de, T: TupleUnpack<'de>>(&self, _key: &'de [u8]) -> PackResult<T> {
        panic!("cannot unpack keys using the root of a directory partition")
    }

    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        panic!("cannot get a range for the root of a directory partition")
    }
}

#[async_trait]
impl Directory for DirectoryPartition {
    async fn create_or_open(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Option<Vec<u8>>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput> {
        self.directory_layer
            .create_or_open(trx, &self.absolute(path), prefix, layer)
            .await
    }

    async fn create(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Option<Vec<u8>>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput> {
        self.directory_layer
            .create(trx, &self.absolute(path), prefix, layer)
            .await
    }

    async fn open(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput> {
        self.directory_layer.open(trx, &self.absolute(path), layer).await
    }

    async fn register(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Vec<u8>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput> {
        self.directory_layer
            .register(trx, &self.absolute(path), prefix, layer)
            .await
    }

    async fn exists(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<bool> {
        self.directory_layer.exists(trx, &self.absolute(path)).await
    }

    async fn move_directory(&self, trx: &DirTransaction, new_path: &FdbPath) -> DirResult<DirectoryOutput> {
        self.directory_layer.move_to(trx, &self.path, new_path).await
    }

    async fn move_to(
        &self,
        trx: &DirTransaction,
        old_path: &FdbPath,
        new_path: &FdbPath,
    ) -> DirResult<DirectoryOutput> {
        self.directory_layer
            .move_to(trx, &self.absolute(old_path), &self.absolute(new_path))
            .await
    }

    async fn remove(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<bool> {
        self.directory_layer.remove(trx, &self.absolute(path)).await
    }

    async fn remove_if_exists(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<bool> {
        self.directory_layer.remove_if_exists(trx, &self.absolute(path)).await
    }

    async fn list(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<Vec<String>> {
        self.directory_layer.list(trx, &self.absolute(path)).await
    }

    async fn change_layer(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        new_layer: Vec<u8>,
    ) -> DirResult<DirectoryOutput> {
        self.directory_layer
            .change_layer(trx, &self.absolute(path), new_layer)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_layer_is_partition() {
        let partition = DirectoryPartition::new(
            FdbPath::from_names(vec!["part"]),
            vec![0x01],
            DirectoryLayer::default(),
        );
        assert_eq!(partition.get_layer(), PARTITION_LAYER.as_bytes().to_vec());
        assert_eq!(partition.prefix(), &[0x01]);
    }

    #[test]
    #[should_panic]
    fn bytes_panics() {
        let partition = DirectoryPartition::new(FdbPath::root(), vec![], DirectoryLayer::default());
        partition.bytes();
    }
}
