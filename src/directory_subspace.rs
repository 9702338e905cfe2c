// Copyright 2018 foundationdb-rs developers, https://github.com/Clikengo/foundationdb-rs/graphs/contributors
// Copyright 2013-2018 Apple, Inc and the FoundationDB project authors.
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The resulting subspace of an opened or created directory.
//!
//! Grounded on
//! `examples/Clikengo-foundationdb-rs/foundationdb/src/directory/directory_subspace.rs`.
//! The teacher computes a "partition subpath" on every delegated call because
//! a nested partition owns its own `DirectoryLayer` instance with its own
//! relative `path`. This crate has exactly one `DirectoryLayer`, so every
//! path is already absolute and no such adjustment is needed — a
//! `DirectorySubspace` just joins its own path onto the relative path it was
//! given and hands the whole thing to `self.directory_layer`.

use async_trait::async_trait;
use foundationdb::tuple::{PackResult, Subspace, TuplePack, TupleUnpack};

use crate::directory::{Directory, DirectoryOutput};
use crate::directory_layer::DirectoryLayer;
use crate::error::DirResult;
use crate::path::FdbPath;
use crate::txn_state::DirTransaction;

/// The contents of a directory: a short allocated prefix, remembered
/// alongside the path it was opened at and its stored layer id. Usable for
/// all the ordinary `Subspace` operations, and as a `Directory` for
/// operating on descendants of the path it represents.
#[derive(Debug, Clone)]
pub struct DirectorySubspace {
    pub(crate) directory_layer: DirectoryLayer,
    subspace: Subspace,
    path: FdbPath,
    layer: Vec<u8>,
}

impl DirectorySubspace {
    pub fn new(path: FdbPath, prefix: Vec<u8>, directory_layer: DirectoryLayer, layer: Vec<u8>) -> Self {
        DirectorySubspace {
            directory_layer,
            subspace: Subspace::from_bytes(&prefix),
            path,
            layer,
        }
    }

    fn absolute(&self, relative: &FdbPath) -> FdbPath {
        self.path.join(relative.segments())
    }
}

impl DirectorySubspace {
    pub fn subspace<T: TuplePack>(&self, t: &T) -> Subspace {
        self.subspace.subspace(t)
    }

    pub fn bytes(&self) -> &[u8] {
        self.subspace.bytes()
    }

    pub fn pack<T: TuplePack>(&self, t: &T) -> Vec<u8> {
        self.subspace.pack(t)
    }

    pub fn unpack<'de, T: TupleUnpack<'de>>(&self, key: &'de [u8]) -> PackResult<T> {
        self.subspace.unpack(key)
    }

    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        self.subspace.range()
    }

    pub fn get_path(&self) -> FdbPath {
        self.path.clone()
    }

    pub fn get_layer(&self) -> Vec<u8> {
        self.layer.clone()
    }

    pub fn is_start_of(&self, key: &[u8]) -> bool {
        self.subspace.is_start_of(key)
    }
}

#[async_trait]
impl Directory for DirectorySubspace {
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
    fn absolute_joins_own_path_with_relative() {
        let subspace = DirectorySubspace::new(
            FdbPath::from_names(vec!["app"]),
            vec![0x15],
            DirectoryLayer::default(),
            Vec::new(),
        );
        let abs = subspace.absolute(&FdbPath::from_names(vec!["users"]));
        assert_eq!(abs.format(), "/app/users");
    }
}
