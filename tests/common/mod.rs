// Copyright 2018 foundationdb-rs developers, https://github.com/Clikengo/foundationdb-rs/graphs/contributors
// Copyright 2013-2018 Apple, Inc and the FoundationDB project authors.
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use foundationdb::Database;

/// Boots the FDB client network for the duration of the test process.
///
/// Mirrors `examples/Clikengo-foundationdb-rs/foundationdb/tests/hca.rs`'s
/// `unsafe { foundationdb::boot() }` guard; kept alive for as long as the
/// returned handle is, the same way the teacher's `TestEnv` keeps its network
/// thread alive for the duration of the test binary.
#[allow(unused)]
pub fn boot() -> foundationdb::api::NetworkAutoStop {
    unsafe { foundationdb::boot() }
}

#[allow(unused)]
pub async fn database() -> foundationdb::FdbResult<Database> {
    Database::default()
}

/// A node-subspace prefix unique to one test, so concurrent `cargo test`
/// runs against the same cluster don't trip over each other's directories.
#[allow(unused)]
pub fn test_prefix(name: &str) -> Vec<u8> {
    let mut prefix = b"fdb-directory-test/".to_vec();
    prefix.extend_from_slice(name.as_bytes());
    prefix
}
