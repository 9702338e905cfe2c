// Copyright 2018 foundationdb-rs developers, https://github.com/Clikengo/foundationdb-rs/graphs/contributors
// Copyright 2013-2018 Apple, Inc and the FoundationDB project authors.
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//
// Requires a running FoundationDB cluster reachable via the default cluster
// file, exactly like the teacher's own `tests/directory.rs` and
// `tests/hca.rs`. Scenarios mirror spec.md's S1-S5 and S7.

use foundationdb::tuple::Subspace;
use foundationdb::RangeOption;

use fdb_directory::{DirError, DirTransaction, Directory, DirectoryLayer, DirectoryOutput, FdbPath};

mod common;

fn layer_for(name: &str) -> DirectoryLayer {
    let nodes = common::test_prefix(&format!("{name}/nodes"));
    let content = common::test_prefix(&format!("{name}/content"));
    DirectoryLayer::new(
        Subspace::from_bytes(&nodes),
        Subspace::from_bytes(&content),
        false,
    )
}

#[tokio::test]
async fn s1_create_and_open() {
    let _guard = common::boot();
    let db = common::database().await.expect("database");
    let layer = layer_for("s1");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    let users = layer
        .create(&trx, &FdbPath::parse("/users").unwrap(), None, None)
        .await
        .expect("create users");
    let p1 = users.bytes().to_vec();
    trx.commit().await.expect("commit");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    let opened = layer
        .open(&trx, &FdbPath::parse("/users").unwrap(), None)
        .await
        .expect("open users");
    assert_eq!(opened.bytes(), p1.as_slice());
    assert_eq!(opened.get_layer(), Vec::<u8>::new());

    let names = layer
        .list(&trx, &FdbPath::root())
        .await
        .expect("list root");
    assert_eq!(names, vec!["users".to_string()]);
    trx.cancel();
}

#[tokio::test]
async fn s2_layer_check() {
    let _guard = common::boot();
    let db = common::database().await.expect("database");
    let layer = layer_for("s2");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    layer
        .create(
            &trx,
            &FdbPath::parse("/queue").unwrap(),
            None,
            Some(b"mq".to_vec()),
        )
        .await
        .expect("create queue");
    trx.commit().await.expect("commit");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    layer
        .open(&trx, &FdbPath::parse("/queue").unwrap(), Some(b"mq".to_vec()))
        .await
        .expect("open with matching layer");

    let err = layer
        .open(
            &trx,
            &FdbPath::parse("/queue").unwrap(),
            Some(b"mqv2".to_vec()),
        )
        .await
        .expect_err("layer mismatch expected");
    assert!(matches!(err, DirError::LayerMismatch { .. }));
    trx.cancel();
}

#[tokio::test]
async fn s3_move() {
    let _guard = common::boot();
    let db = common::database().await.expect("database");
    let layer = layer_for("s3");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    let a = layer
        .create(&trx, &FdbPath::parse("/a").unwrap(), None, None)
        .await
        .expect("create a");
    let p1 = a.bytes().to_vec();
    layer
        .create(&trx, &FdbPath::parse("/b").unwrap(), None, None)
        .await
        .expect("create b");
    trx.commit().await.expect("commit");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    layer
        .move_to(
            &trx,
            &FdbPath::parse("/a").unwrap(),
            &FdbPath::parse("/c").unwrap(),
        )
        .await
        .expect("move a to c");
    trx.commit().await.expect("commit");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    assert!(!layer.exists(&trx, &FdbPath::parse("/a").unwrap()).await.unwrap());
    assert!(layer.exists(&trx, &FdbPath::parse("/c").unwrap()).await.unwrap());
    let c = layer
        .open(&trx, &FdbPath::parse("/c").unwrap(), None)
        .await
        .expect("open c");
    assert_eq!(c.bytes(), p1.as_slice());

    let err = layer
        .move_to(
            &trx,
            &FdbPath::parse("/b").unwrap(),
            &FdbPath::parse("/c").unwrap(),
        )
        .await
        .expect_err("c already occupied");
    assert!(matches!(err, DirError::AlreadyExists { .. }));
    trx.cancel();
}

#[tokio::test]
async fn s4_recursive_remove() {
    let _guard = common::boot();
    let db = common::database().await.expect("database");
    let layer = layer_for("s4");
    let content_prefix = common::test_prefix("s4/content");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    let x = layer
        .create(&trx, &FdbPath::parse("/x").unwrap(), None, None)
        .await
        .expect("create x");
    trx.inner().set(&x.pack(&"marker"), b"1");
    let xy = layer
        .create(&trx, &FdbPath::parse("/x/y").unwrap(), None, None)
        .await
        .expect("create x/y");
    trx.inner().set(&xy.pack(&"marker"), b"1");
    let xyz = layer
        .create(&trx, &FdbPath::parse("/x/y/z").unwrap(), None, None)
        .await
        .expect("create x/y/z");
    trx.inner().set(&xyz.pack(&"marker"), b"1");
    trx.commit().await.expect("commit");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    let removed = layer.remove(&trx, &FdbPath::parse("/x").unwrap()).await.expect("remove x");
    assert!(removed);
    trx.commit().await.expect("commit");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    assert!(!layer.exists(&trx, &FdbPath::parse("/x").unwrap()).await.unwrap());

    let range = RangeOption::from(Subspace::from_bytes(&content_prefix).range());
    let remaining = trx.inner().get_range(&range, 1, false).await.expect("range scan");
    assert!(remaining.is_empty());
    trx.cancel();
}

#[tokio::test]
async fn s5_partition() {
    let _guard = common::boot();
    let db = common::database().await.expect("database");
    let layer = layer_for("s5");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    let part = layer
        .create(
            &trx,
            &FdbPath::parse("/part").unwrap(),
            None,
            Some(b"partition".to_vec()),
        )
        .await
        .expect("create partition");
    assert!(matches!(part, DirectoryOutput::DirectoryPartition(_)));

    layer
        .create(&trx, &FdbPath::parse("/part/inside").unwrap(), None, None)
        .await
        .expect("create nested directory");
    trx.commit().await.expect("commit");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    let err = layer
        .move_to(
            &trx,
            &FdbPath::parse("/part/inside").unwrap(),
            &FdbPath::parse("/outside").unwrap(),
        )
        .await
        .expect_err("cross-partition move must be rejected");
    assert!(matches!(err, DirError::InvalidMove(_)));
    trx.cancel();
}

#[tokio::test]
async fn manual_prefix_rejected_inside_partition() {
    let _guard = common::boot();
    let db = common::database().await.expect("database");

    let nodes = common::test_prefix("manual-prefix/nodes");
    let content = common::test_prefix("manual-prefix/content");
    let layer = DirectoryLayer::new(Subspace::from_bytes(&nodes), Subspace::from_bytes(&content), true);

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    layer
        .create(
            &trx,
            &FdbPath::parse("/part").unwrap(),
            None,
            Some(b"partition".to_vec()),
        )
        .await
        .expect("create partition");
    trx.commit().await.expect("commit");

    // A manually-specified prefix is accepted directly under the root, even
    // though the same layer allows it, a nested partition must always reject one.
    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    layer
        .register(&trx, &FdbPath::parse("/registered").unwrap(), vec![0x77], None)
        .await
        .expect("manual prefix accepted at the root");
    trx.commit().await.expect("commit");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    let err = layer
        .register(
            &trx,
            &FdbPath::parse("/part/registered").unwrap(),
            vec![0x78],
            None,
        )
        .await
        .expect_err("manual prefix inside a partition must be rejected");
    assert!(matches!(err, DirError::PrefixCollision { .. }));
    trx.cancel();
}

#[tokio::test]
async fn s7_cached_open_is_consistent() {
    let _guard = common::boot();
    let db = common::database().await.expect("database");
    let layer = layer_for("s7");

    let trx = DirTransaction::new(db.create_trx().expect("create_trx"));
    let created = layer
        .create(&trx, &FdbPath::parse("/users").unwrap(), None, None)
        .await
        .expect("create users");
    trx.commit().await.expect("commit");

    let trx_a = DirTransaction::new(db.create_trx().expect("create_trx"));
    let first = layer
        .open(&trx_a, &FdbPath::parse("/users").unwrap(), None)
        .await
        .expect("first open");
    trx_a.cancel();

    let trx_b = DirTransaction::new(db.create_trx().expect("create_trx"));
    let second = layer
        .open(&trx_b, &FdbPath::parse("/users").unwrap(), None)
        .await
        .expect("second open, should hit the process cache");
    trx_b.cancel();

    assert_eq!(first.bytes(), created.bytes());
    assert_eq!(second.bytes(), created.bytes());
}
