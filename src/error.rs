// Copyright 2018 foundationdb-rs developers, https://github.com/Clikengo/foundationdb-rs/graphs/contributors
// Copyright 2013-2018 Apple, Inc and the FoundationDB project authors.
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Errors that can be raised by the directory layer.
//!
//! [`DirError`] is the single error type returned by every [`Directory`](crate::Directory)
//! method. `Try…` variants absorb [`DirError::NotFound`] into `None`; every other
//! variant always bubbles up to the caller.

use thiserror::Error;

/// All errors the directory layer can raise.
#[derive(Debug, Error)]
pub enum DirError {
    /// The directory at the given path does not exist.
    #[error("directory does not exist: {path}")]
    NotFound {
        /// The path that was looked up.
        path: String,
    },

    /// `create` was called on a path that already has a directory, or `move`'s
    /// destination is already occupied.
    #[error("directory already exists: {path}")]
    AlreadyExists {
        /// The path that collided.
        path: String,
    },

    /// A layer id was supplied on open and did not match the stored one.
    #[error("layer mismatch at {path}: expected `{expected}`, found `{found}`")]
    LayerMismatch {
        /// The path that was opened.
        path: String,
        /// The layer id the caller supplied.
        expected: String,
        /// The layer id actually stored on the node.
        found: String,
    },

    /// The path was empty, relative where absolute was required, or escapes
    /// the current Directory Layer.
    #[error("invalid path: {reason}")]
    InvalidPath {
        /// What was wrong with the path.
        reason: String,
    },

    /// An operation targeted the root directory; the root can never be
    /// opened, moved, renamed, removed, or have its layer changed.
    #[error("the root directory cannot be modified by this operation")]
    RootNotModifiable,

    /// A caller-supplied prefix overlaps an existing allocated prefix, or was
    /// supplied where manual prefixes are not allowed.
    #[error("prefix collision: {reason}")]
    PrefixCollision {
        /// Why the prefix was rejected.
        reason: String,
    },

    /// The partition's on-disk major/minor version exceeds what this library
    /// can read or write.
    #[error("incompatible directory layer version: {0}")]
    IncompatibleLayerVersion(String),

    /// A cache mode transition violated the per-transaction state machine, or
    /// a cached subspace was used after its transaction completed.
    #[error("cache misuse: {0}")]
    CacheMisuse(String),

    /// The destination of a `move` would nest a directory inside itself, or a
    /// move crosses a partition boundary.
    #[error("invalid move: {0}")]
    InvalidMove(String),

    /// An underlying FoundationDB error. Transaction-retryable errors should
    /// be handled by [`crate::retry::with_directory_retry`] rather than
    /// surfacing here; this variant is for errors the caller must see.
    #[error("foundationdb error: {0}")]
    Fdb(#[from] foundationdb::FdbError),

    /// A tuple could not be packed or unpacked.
    #[error("tuple pack error: {0}")]
    Pack(#[from] foundationdb::tuple::PackError),
}

impl DirError {
    /// True for [`DirError::NotFound`] — the case `Try…` variants absorb into `None`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirError::NotFound { .. })
    }

    /// True for [`DirError::AlreadyExists`] — the other case `Try…` variants absorb.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, DirError::AlreadyExists { .. })
    }
}

/// A `Result` specialized to [`DirError`].
pub type DirResult<T> = Result<T, DirError>;
