// Copyright 2018 foundationdb-rs developers, https://github.com/Clikengo/foundationdb-rs/graphs/contributors
// Copyright 2013-2018 Apple, Inc and the FoundationDB project authors.
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//
// Requires a running FoundationDB cluster, mirroring
// `examples/Clikengo-foundationdb-rs/foundationdb/tests/hca.rs`.

use std::collections::HashSet;

use foundationdb::tuple::Subspace;

use fdb_directory::{DirTransaction, HighContentionAllocator};

mod common;

#[tokio::test]
async fn s6_allocations_are_unique_across_window_advances() {
    let _guard = common::boot();
    let db = common::database().await.expect("database");
    const N: usize = 1024;

    let prefix = common::test_prefix("s6-hca");
    {
        let trx = db.create_trx().expect("create_trx");
        trx.clear_subspace_range(&Subspace::from_bytes(&prefix));
        trx.commit().await.expect("clear old run");
    }

    let hca = HighContentionAllocator::new(Subspace::from_bytes(&prefix));
    let mut allocated = Vec::with_capacity(N);

    for _ in 0..N {
        let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
        let id = hca.allocate(&trx).await.expect("allocate");
        trx.commit().await.expect("commit");
        allocated.push(id);
    }

    let unique: HashSet<i64> = allocated.iter().copied().collect();
    assert_eq!(
        unique.len(),
        allocated.len(),
        "high-contention allocator returned a duplicate id across {} allocations",
        N
    );
}
