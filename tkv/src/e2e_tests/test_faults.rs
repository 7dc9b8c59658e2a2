//! Store failures surface as wrapped errors and leave no partial writes.

use crate::e2e_tests::helpers::{TestKv, new_record, ts};
use crate::error::TkvError;
use crate::kv::Record;
use crate::store::{StoreError, StoreOp};
use crate::time::TimeRange;

fn assert_wrapped(error: &TkvError, op: &str) {
    match error {
        TkvError::Store { op: actual, source } => {
            assert_eq!(*actual, op);
            assert!(matches!(source, StoreError::Transport(_)), "{source}");
        }
        other => panic!("expected store error for {op}, got {other}"),
    }
}

#[test]
fn test_get_failure() {
    let client = TestKv::new();
    client.store().inject_fault(StoreOp::Get);

    let error = client
        .block_on(client.kv.get(&["a"]))
        .expect_err("get fails");
    assert_wrapped(&error, "failed to get entity");
}

#[test]
fn test_set_failure_applies_nothing() {
    let client = TestKv::new();
    client.store().inject_fault(StoreOp::Exec);

    let error = client
        .block_on(client.kv.set(&["a"], "v", ts(1)))
        .expect_err("set fails");
    assert_wrapped(&error, "failed to set entity");

    assert_eq!(client.store().key_count(), 0);
    assert!(!client.block_on(client.kv.exists(&["a"])).expect("exists"));
}

#[test]
fn test_bulk_set_failure_applies_nothing() {
    let client = TestKv::new();
    client.store().inject_fault(StoreOp::Exec);
    let records: Vec<Record> = (1..=5).map(new_record).collect();

    let error = client
        .block_on(client.kv.bulk_set(&records))
        .expect_err("bulk_set fails");
    assert_wrapped(&error, "failed to bulk insert records");
    assert_eq!(client.store().key_count(), 0);

    // The fault is consumed; a retry by the caller goes through
    client.bulk_set(&records);
    assert_eq!(client.store().index_len(&client.kv.keys().index_key()), 5);
}

#[test]
fn test_delete_failure_keeps_record() {
    let client = TestKv::new();
    client.set(&["a"], "v", 1);
    client.store().inject_fault(StoreOp::Exec);

    let error = client
        .block_on(client.kv.delete(&["a"]))
        .expect_err("delete fails");
    assert_wrapped(&error, "failed to delete entity");
    assert!(client.block_on(client.kv.exists(&["a"])).expect("exists"));
}

#[test]
fn test_exists_failure() {
    let client = TestKv::new();
    client.store().inject_fault(StoreOp::Exists);

    let error = client
        .block_on(client.kv.exists(&["a"]))
        .expect_err("exists fails");
    assert_wrapped(&error, "failed to check if entity exists");
}

#[test]
fn test_fetch_page_failure_at_each_step() {
    let cases = [
        (StoreOp::ZCount, "failed to count"),
        (StoreOp::ZRange, "failed to execute zrangebyscore"),
        (StoreOp::MGet, "failed to execute mget"),
    ];

    for (op, name) in cases {
        let client = TestKv::new();
        client.set(&["a"], "v", 1);
        client.store().inject_fault(op);

        let error = client
            .block_on(client.kv.fetch_page(TimeRange::all(), 0, 10))
            .expect_err("fetch fails");
        assert_wrapped(&error, name);
    }
}

#[test]
fn test_fetch_page_consistent_eval_failure() {
    let client = TestKv::new();
    client.set(&["a"], "v", 1);
    client.store().inject_fault(StoreOp::EvalScript);

    let error = client
        .block_on(client.kv.fetch_page_consistent(TimeRange::all(), 0, 10))
        .expect_err("eval fails");
    assert_wrapped(&error, "failed to execute range script");

    // Only NOSCRIPT triggers re-registration
    assert_eq!(client.store().calls(StoreOp::LoadScript), 1);
    assert_eq!(client.store().calls(StoreOp::EvalScript), 1);
}

#[test]
fn test_first_page_failure_from_paginate() {
    let client = TestKv::new();
    client.set(&["a"], "v", 1);
    client.store().inject_fault(StoreOp::ZCount);

    let result = client.block_on(client.kv.paginate(
        crate::kv::FetchStrategy::Scan,
        TimeRange::all(),
        0,
        10,
    ));
    let Err(error) = result else {
        panic!("paginate should fail on the first page");
    };

    assert!(matches!(
        error,
        TkvError::Page {
            context: "fetching first page failed",
            ..
        }
    ));
    assert_eq!(
        error.store_error(),
        Some(&StoreError::Transport("injected fault in ZCOUNT".to_string()))
    );
}
