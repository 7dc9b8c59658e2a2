//! Non-atomic range pages: count, select, fetch.

use crate::e2e_tests::helpers::{TestKv, new_record, payload_strings, record_payload, ts};
use crate::kv::{FetchStrategy, Record};
use crate::page::Payload;
use crate::store::{Command, ScoreStore, StoreOp};
use crate::time::{TimeRange, Timestamp};

fn seeded(count: i64) -> TestKv {
    let client = TestKv::new();
    let records: Vec<Record> = (1..=count).map(new_record).collect();
    client.bulk_set(&records);
    client
}

#[test]
fn test_fetch_page_first_page() {
    let client = seeded(10);

    let page = client.fetch(FetchStrategy::Scan, TimeRange::all(), 0, 4);

    assert_eq!(page.total(), 10);
    assert_eq!(
        page.into_payloads(),
        (1..=4).map(record_payload).collect::<Vec<_>>()
    );
}

#[test]
fn test_fetch_page_bounds_are_inclusive() {
    let client = seeded(10);

    let page = client.fetch(FetchStrategy::Scan, TimeRange::between(ts(4), ts(6)), 0, 10);

    assert_eq!(page.total(), 3);
    assert_eq!(
        payload_strings(&page.into_payloads()),
        vec!["value-4", "value-5", "value-6"]
    );
}

#[test]
fn test_fetch_page_open_ended_ranges() {
    let client = seeded(10);

    let from_seven = client.fetch(
        FetchStrategy::Scan,
        TimeRange::new(Some(ts(7)), None),
        0,
        10,
    );
    assert_eq!(from_seven.total(), 4);

    let up_to_two = client.fetch(
        FetchStrategy::Scan,
        TimeRange::new(None, Some(ts(2))),
        0,
        10,
    );
    assert_eq!(up_to_two.total(), 2);
}

#[test]
fn test_fetch_page_empty_range_skips_value_fetch() {
    let client = seeded(5);

    let page = client.fetch(
        FetchStrategy::Scan,
        TimeRange::between(ts(100), ts(200)),
        0,
        10,
    );

    assert_eq!(page.total(), 0);
    assert!(page.is_empty());
    assert_eq!(client.store().calls(StoreOp::MGet), 0);
}

#[test]
fn test_fetch_page_on_empty_store() {
    let client = TestKv::new();
    let page = client.fetch(FetchStrategy::Scan, TimeRange::all(), 0, 10);
    assert_eq!(page.total(), 0);
    assert!(page.is_empty());
}

#[test]
fn test_fetch_page_skips_values_missing_from_primary() {
    let client = seeded(3);

    // Remove one primary value but leave its index entry behind, as a
    // concurrent delete landing between selection and fetch would.
    let key = client.kv.keys().key(["rec", "0002"]);
    client
        .block_on(client.store().exec_atomic(vec![Command::Del { key }]))
        .expect("del");

    let page = client.fetch(FetchStrategy::Scan, TimeRange::all(), 0, 10);

    assert_eq!(page.total(), 3);
    assert_eq!(page.len(), 3);
    assert_eq!(
        page.into_payloads(),
        vec![record_payload(1), record_payload(3)]
    );
}

#[test]
fn test_fetch_page_equal_timestamps_order_by_key() {
    let client = TestKv::new();
    client.set(&["b"], "b", 5);
    client.set(&["a"], "a", 5);
    client.set(&["c"], "c", 5);

    let page = client.fetch(FetchStrategy::Scan, TimeRange::all(), 0, 10);

    assert_eq!(
        page.into_payloads(),
        vec![Payload::from("a"), Payload::from("b"), Payload::from("c")]
    );
}

#[test]
fn test_fetch_page_negative_timestamps() {
    let client = TestKv::new();
    client
        .block_on(client.kv.set(&["old"], "old", Timestamp::from_nanos(-10)))
        .expect("set");
    client.set(&["new"], "new", 10);

    let page = client.fetch(
        FetchStrategy::Scan,
        TimeRange::new(None, Some(ts(0))),
        0,
        10,
    );

    assert_eq!(page.into_payloads(), vec![Payload::from("old")]);
}
