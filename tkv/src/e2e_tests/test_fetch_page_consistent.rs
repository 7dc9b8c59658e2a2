//! Consistent range pages through the server-side range script.

use bytes::Bytes;

use crate::e2e_tests::helpers::{TestKv, new_record, record_payload, ts};
use crate::error::TkvError;
use crate::key::{Delimiter, KeyComposer};
use crate::kv::{FetchStrategy, Record, TimeKv};
use crate::store::{Command, MemoryStore, Reply, ScoreStore, ScriptHandle, StoreError, StoreOp};
use crate::time::TimeRange;

fn seeded(count: i64) -> TestKv {
    let client = TestKv::new();
    let records: Vec<Record> = (1..=count).map(new_record).collect();
    client.bulk_set(&records);
    client
}

#[test]
fn test_consistent_page_size_is_min_of_limit_and_matches() {
    let client = seeded(10);

    let full = client.fetch(FetchStrategy::Consistent, TimeRange::all(), 0, 4);
    assert_eq!(full.total(), 10);
    assert_eq!(full.len(), 4);

    let tail = client.fetch(FetchStrategy::Consistent, TimeRange::all(), 8, 4);
    assert_eq!(tail.total(), 10);
    assert_eq!(
        tail.into_payloads(),
        vec![record_payload(9), record_payload(10)]
    );
}

#[test]
fn test_consistent_page_only_contains_in_range_records() {
    let client = seeded(20);

    let page = client.fetch(
        FetchStrategy::Consistent,
        TimeRange::between(ts(5), ts(8)),
        0,
        100,
    );

    assert_eq!(page.total(), 4);
    assert_eq!(
        page.into_payloads(),
        (5..=8).map(record_payload).collect::<Vec<_>>()
    );
}

#[test]
fn test_consistent_empty_range() {
    let client = seeded(3);

    let page = client.fetch(
        FetchStrategy::Consistent,
        TimeRange::between(ts(50), ts(60)),
        0,
        10,
    );
    assert_eq!(page.total(), 0);
    assert!(page.is_empty());
}

#[test]
fn test_consistent_offset_past_end_keeps_total() {
    let client = seeded(3);

    let page = client.fetch(FetchStrategy::Consistent, TimeRange::all(), 10, 10);
    assert_eq!(page.total(), 3);
    assert!(page.is_empty());
}

#[test]
fn test_script_registered_once() {
    let client = seeded(5);

    for offset in 0..5 {
        client.fetch(FetchStrategy::Consistent, TimeRange::all(), offset, 1);
    }

    assert_eq!(client.store().calls(StoreOp::LoadScript), 1);
    assert_eq!(client.store().calls(StoreOp::EvalScript), 5);
}

#[test]
fn test_script_reregistered_after_store_forgets_it() {
    let client = seeded(5);

    client.fetch(FetchStrategy::Consistent, TimeRange::all(), 0, 2);
    client.store().flush_scripts().expect("flush");

    let page = client.fetch(FetchStrategy::Consistent, TimeRange::all(), 0, 2);

    assert_eq!(page.total(), 5);
    assert_eq!(page.len(), 2);
    assert_eq!(client.store().calls(StoreOp::LoadScript), 2);
    // First evaluation, the one that hit NOSCRIPT, and its retry
    assert_eq!(client.store().calls(StoreOp::EvalScript), 3);
}

#[test]
fn test_registration_failure_is_reported_and_retried() {
    let client = seeded(2);
    client.store().inject_fault(StoreOp::LoadScript);

    let error = client
        .block_on(client.kv.fetch_page_consistent(TimeRange::all(), 0, 10))
        .expect_err("registration fails");
    assert!(error.to_string().starts_with("failed to load range script"));
    assert_eq!(client.store().calls(StoreOp::EvalScript), 0);

    // The failure is not cached
    let page = client.fetch(FetchStrategy::Consistent, TimeRange::all(), 0, 10);
    assert_eq!(page.total(), 2);
}

#[test]
fn test_consistent_skips_values_missing_from_primary() {
    let client = seeded(3);
    let key = client.kv.keys().key(["rec", "0001"]);
    client
        .block_on(client.store().exec_atomic(vec![Command::Del { key }]))
        .expect("del");

    let page = client.fetch(FetchStrategy::Consistent, TimeRange::all(), 0, 10);

    assert_eq!(page.total(), 3);
    assert_eq!(
        page.into_payloads(),
        vec![record_payload(2), record_payload(3)]
    );
}

/// Store whose range script replies with a fixed value.
struct FixedReplyStore {
    inner: MemoryStore,
    reply: Reply,
}

impl ScoreStore for FixedReplyStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.inner.get(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Bytes>>, StoreError> {
        self.inner.mget(keys).await
    }

    async fn zcount(&self, index: &str, range: &TimeRange) -> Result<usize, StoreError> {
        self.inner.zcount(index, range).await
    }

    async fn zrange_by_score(
        &self,
        index: &str,
        range: &TimeRange,
        offset: usize,
        count: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.inner.zrange_by_score(index, range, offset, count).await
    }

    async fn exec_atomic(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StoreError> {
        self.inner.exec_atomic(commands).await
    }

    async fn load_script(&self, _body: &str) -> Result<ScriptHandle, StoreError> {
        Ok(ScriptHandle::new("fixed"))
    }

    async fn eval_script(
        &self,
        _handle: &ScriptHandle,
        _keys: &[String],
        _args: &[String],
    ) -> Result<Reply, StoreError> {
        Ok(self.reply.clone())
    }
}

fn fetch_with_reply(reply: Reply) -> Result<crate::page::Page, TkvError> {
    let kv = TimeKv::new(
        FixedReplyStore {
            inner: MemoryStore::new(),
            reply,
        },
        KeyComposer::new("fixed", Delimiter::Unit),
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    runtime.block_on(kv.fetch_page_consistent(TimeRange::all(), 0, 10))
}

#[test]
fn test_unexpected_script_result_shapes() {
    let malformed = [
        Reply::Nil,
        Reply::Integer(3),
        Reply::Array(vec![Reply::Integer(1)]),
        Reply::Array(vec![Reply::Integer(1), Reply::Integer(2)]),
        Reply::Array(vec![
            Reply::Bulk(Bytes::from_static(b"1")),
            Reply::Array(Vec::new()),
        ]),
        Reply::Array(vec![Reply::Integer(-1), Reply::Array(Vec::new())]),
        Reply::Array(vec![Reply::Integer(1), Reply::Array(vec![Reply::Integer(7)])]),
    ];

    for reply in malformed {
        let error = fetch_with_reply(reply.clone()).expect_err("malformed reply");
        assert!(
            error.is_unexpected_script_result(),
            "reply {reply:?} produced {error}"
        );
    }
}

#[test]
fn test_well_formed_fixed_reply() {
    let page = fetch_with_reply(Reply::Array(vec![
        Reply::Integer(5),
        Reply::Array(vec![Reply::Bulk(Bytes::from_static(b"x")), Reply::Nil]),
    ]))
    .expect("decoded");

    assert_eq!(page.total(), 5);
    assert_eq!(page.len(), 2);
    assert_eq!(page.into_payloads().len(), 1);
}
