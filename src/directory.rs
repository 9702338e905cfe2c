//! The `Directory` trait and the `DirectoryOutput` dispatch enum (component E).
//!
//! Mirrors `examples/Clikengo-foundationdb-rs/foundationdb/src/directory/mod.rs`:
//! one trait implemented by `DirectoryLayer`, `DirectorySubspace`, and
//! `DirectoryPartition`, and one enum tying the latter two together so
//! callers can hold "a directory" without caring which kind it is.

use async_trait::async_trait;
use foundationdb::tuple::{PackResult, Subspace, TuplePack, TupleUnpack};

use crate::directory_partition::DirectoryPartition;
use crate::directory_subspace::DirectorySubspace;
use crate::error::{DirError, DirResult};
use crate::path::FdbPath;
use crate::txn_state::DirTransaction;

/// A subspace of keys identified by a hierarchical [`FdbPath`], with a short
/// allocated byte prefix standing in for the full path on the wire.
#[async_trait]
pub trait Directory {
    /// Opens the directory at `path`, creating it (and any missing parent
    /// directories) if it does not already exist.
    async fn create_or_open(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Option<Vec<u8>>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput>;

    /// Creates the directory at `path` (and any missing parents). Fails with
    /// [`DirError::AlreadyExists`] if a directory is already there.
    async fn create(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Option<Vec<u8>>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput>;

    /// Opens the directory at `path`. Fails with [`DirError::NotFound`] if it
    /// does not exist.
    async fn open(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput>;

    /// **(added)** Creates the directory at `path` with a caller-chosen
    /// prefix, never allocating one. Fails if the prefix is already in use or
    /// the layer disallows manual prefixes.
    async fn register(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Vec<u8>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput>;

    /// True if a directory exists at `path`.
    async fn exists(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<bool>;

    /// Moves this directory as a whole to `new_path` (relative to the same
    /// `DirectoryLayer` root, i.e. not crossing a partition boundary).
    async fn move_directory(
        &self,
        trx: &DirTransaction,
        new_path: &FdbPath,
    ) -> DirResult<DirectoryOutput>;

    /// Moves the directory at `old_path` (relative to this directory) to
    /// `new_path`.
    async fn move_to(
        &self,
        trx: &DirTransaction,
        old_path: &FdbPath,
        new_path: &FdbPath,
    ) -> DirResult<DirectoryOutput>;

    /// Removes the directory at `path` and everything below it. Fails with
    /// [`DirError::NotFound`] if nothing is there.
    async fn remove(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<bool>;

    /// Like [`Directory::remove`], but returns `Ok(false)` instead of failing
    /// when nothing is there.
    async fn remove_if_exists(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<bool>;

    /// Lists the names of the immediate subdirectories of `path`.
    async fn list(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<Vec<String>>;

    /// **(added)** Rewrites the stored layer id of the directory at `path`.
    /// Rejects the root directory and any transition into or out of the
    /// `"partition"` layer.
    async fn change_layer(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        new_layer: Vec<u8>,
    ) -> DirResult<DirectoryOutput>;

    /// **(added)** [`Directory::create_or_open`], absorbing
    /// [`DirError::NotFound`] into `None` instead of failing.
    async fn try_create_or_open(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Option<Vec<u8>>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<Option<DirectoryOutput>> {
        absorb_not_found(self.create_or_open(trx, path, prefix, layer).await)
    }

    /// **(added)** [`Directory::create`], absorbing
    /// [`DirError::AlreadyExists`] into `None` instead of failing.
    async fn try_create(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Option<Vec<u8>>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<Option<DirectoryOutput>> {
        absorb_already_exists(self.create(trx, path, prefix, layer).await)
    }

    /// **(added)** [`Directory::open`], absorbing [`DirError::NotFound`] into
    /// `None` instead of failing.
    async fn try_open(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        layer: Option<Vec<u8>>,
    ) -> DirResult<Option<DirectoryOutput>> {
        absorb_not_found(self.open(trx, path, layer).await)
    }

    /// **(added)** [`Directory::register`], absorbing
    /// [`DirError::AlreadyExists`] and [`DirError::PrefixCollision`] into
    /// `None` instead of failing.
    async fn try_register(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Vec<u8>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<Option<DirectoryOutput>> {
        match self.register(trx, path, prefix, layer).await {
            Ok(out) => Ok(Some(out)),
            Err(e) if e.is_already_exists() => Ok(None),
            Err(DirError::PrefixCollision { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn absorb_not_found(result: DirResult<DirectoryOutput>) -> DirResult<Option<DirectoryOutput>> {
    match result {
        Ok(out) => Ok(Some(out)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

fn absorb_already_exists(result: DirResult<DirectoryOutput>) -> DirResult<Option<DirectoryOutput>> {
    match result {
        Ok(out) => Ok(Some(out)),
        Err(e) if e.is_already_exists() => Ok(None),
        Err(e) => Err(e),
    }
}

/// A directory that has been located or created: either ordinary content
/// (usable as a `Subspace`) or the root of a nested partition (which cannot
/// be used as a subspace directly — see spec invariant on partition roots).
#[derive(Clone, Debug)]
pub enum DirectoryOutput {
    DirectorySubspace(DirectorySubspace),
    DirectoryPartition(DirectoryPartition),
}

impl DirectoryOutput {
    pub fn subspace<T: TuplePack>(&self, t: &T) -> Subspace {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.subspace(t),
            DirectoryOutput::DirectoryPartition(_) => {
                panic!("cannot open a subspace at the root of a directory partition")
            }
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.bytes(),
            DirectoryOutput::DirectoryPartition(_) => {
                panic!("cannot get the key of the root of a directory partition")
            }
        }
    }

    pub fn pack<T: TuplePack>(&self, t: &T) -> Vec<u8> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.pack(t),
            DirectoryOutput::DirectoryPartition(_) => {
                panic!("cannot pack using the root of a directory partition")
            }
        }
    }

    pub fn unpack<'de, T: TupleUnpack<'de>>(&self, key: &'de [u8]) -> PackResult<T> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.unpack(key),
            DirectoryOutput::DirectoryPartition(_) => {
                panic!("cannot unpack keys using the root of a directory partition")
            }
        }
    }

    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.range(),
            DirectoryOutput::DirectoryPartition(_) => {
                panic!("cannot get a range for the root of a directory partition")
            }
        }
    }

    pub fn get_path(&self) -> FdbPath {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.get_path(),
            DirectoryOutput::DirectoryPartition(d) => d.get_path(),
        }
    }

    pub fn get_layer(&self) -> Vec<u8> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.get_layer(),
            DirectoryOutput::DirectoryPartition(d) => d.get_layer(),
        }
    }
}

#[async_trait]
impl Directory for DirectoryOutput {
    async fn create_or_open(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Option<Vec<u8>>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.create_or_open(trx, path, prefix, layer).await,
            DirectoryOutput::DirectoryPartition(d) => d.create_or_open(trx, path, prefix, layer).await,
        }
    }

    async fn create(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Option<Vec<u8>>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.create(trx, path, prefix, layer).await,
            DirectoryOutput::DirectoryPartition(d) => d.create(trx, path, prefix, layer).await,
        }
    }

    async fn open(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.open(trx, path, layer).await,
            DirectoryOutput::DirectoryPartition(d) => d.open(trx, path, layer).await,
        }
    }

    async fn register(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        prefix: Vec<u8>,
        layer: Option<Vec<u8>>,
    ) -> DirResult<DirectoryOutput> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.register(trx, path, prefix, layer).await,
            DirectoryOutput::DirectoryPartition(d) => d.register(trx, path, prefix, layer).await,
        }
    }

    async fn exists(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<bool> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.exists(trx, path).await,
            DirectoryOutput::DirectoryPartition(d) => d.exists(trx, path).await,
        }
    }

    async fn move_directory(
        &self,
        trx: &DirTransaction,
        new_path: &FdbPath,
    ) -> DirResult<DirectoryOutput> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.move_directory(trx, new_path).await,
            DirectoryOutput::DirectoryPartition(d) => d.move_directory(trx, new_path).await,
        }
    }

    async fn move_to(
        &self,
        trx: &DirTransaction,
        old_path: &FdbPath,
        new_path: &FdbPath,
    ) -> DirResult<DirectoryOutput> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.move_to(trx, old_path, new_path).await,
            DirectoryOutput::DirectoryPartition(d) => d.move_to(trx, old_path, new_path).await,
        }
    }

    async fn remove(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<bool> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.remove(trx, path).await,
            DirectoryOutput::DirectoryPartition(d) => d.remove(trx, path).await,
        }
    }

    async fn remove_if_exists(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<bool> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.remove_if_exists(trx, path).await,
            DirectoryOutput::DirectoryPartition(d) => d.remove_if_exists(trx, path).await,
        }
    }

    async fn list(&self, trx: &DirTransaction, path: &FdbPath) -> DirResult<Vec<String>> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.list(trx, path).await,
            DirectoryOutput::DirectoryPartition(d) => d.list(trx, path).await,
        }
    }

    async fn change_layer(
        &self,
        trx: &DirTransaction,
        path: &FdbPath,
        new_layer: Vec<u8>,
    ) -> DirResult<DirectoryOutput> {
        match self {
            DirectoryOutput::DirectorySubspace(d) => d.change_layer(trx, path, new_layer).await,
            DirectoryOutput::DirectoryPartition(d) => d.change_layer(trx, path, new_layer).await,
        }
    }
}
