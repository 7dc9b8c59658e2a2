//! Paginating over a populated store with both fetch strategies.

use futures::StreamExt;

use crate::e2e_tests::helpers::{TestKv, new_record, record_payload, ts};
use crate::kv::{FetchStrategy, Record};
use crate::paginate::paginate;
use crate::store::StoreOp;
use crate::time::TimeRange;

const STRATEGIES: [FetchStrategy; 2] = [FetchStrategy::Scan, FetchStrategy::Consistent];

fn seeded(count: i64) -> TestKv {
    let client = TestKv::new();
    let records: Vec<Record> = (1..=count).map(new_record).collect();
    client.bulk_set(&records);
    client
}

#[test]
fn test_paginate_thousand_records_in_pages_of_hundred() {
    for strategy in STRATEGIES {
        let client = seeded(1000);

        let payloads = client.paginate_all(strategy, TimeRange::all(), 100);

        assert_eq!(payloads.len(), 1000, "{strategy:?}");
        assert_eq!(
            payloads,
            (1..=1000).map(record_payload).collect::<Vec<_>>(),
            "{strategy:?}"
        );
    }
}

#[test]
fn test_paginate_scan_fetch_counts() {
    let client = seeded(250);

    client.paginate_all(FetchStrategy::Scan, TimeRange::all(), 100);

    // Pages at offsets 0, 100 and 200
    assert_eq!(client.store().calls(StoreOp::ZCount), 3);
    assert_eq!(client.store().calls(StoreOp::MGet), 3);
    assert_eq!(client.store().calls(StoreOp::EvalScript), 0);
}

#[test]
fn test_paginate_consistent_fetch_counts() {
    let client = seeded(250);

    client.paginate_all(FetchStrategy::Consistent, TimeRange::all(), 100);

    assert_eq!(client.store().calls(StoreOp::EvalScript), 3);
    assert_eq!(client.store().calls(StoreOp::LoadScript), 1);
    assert_eq!(client.store().calls(StoreOp::ZCount), 0);
}

#[test]
fn test_paginate_sub_range() {
    for strategy in STRATEGIES {
        let client = seeded(100);

        let payloads =
            client.paginate_all(strategy, TimeRange::between(ts(41), ts(60)), 7);

        assert_eq!(
            payloads,
            (41..=60).map(record_payload).collect::<Vec<_>>(),
            "{strategy:?}"
        );
    }
}

#[test]
fn test_paginate_empty_range_yields_nothing() {
    for strategy in STRATEGIES {
        let client = seeded(10);
        let payloads =
            client.paginate_all(strategy, TimeRange::between(ts(500), ts(600)), 5);
        assert!(payloads.is_empty());
    }
}

#[test]
fn test_paginate_with_explicit_page_source() {
    let client = seeded(30);

    let payloads: Vec<_> = client.block_on(async {
        let stream = paginate(
            client.kv.pages(FetchStrategy::Consistent),
            TimeRange::all(),
            10,
            8,
        )
        .await
        .expect("paginate");
        stream.map(|item| item.expect("item")).collect().await
    });

    assert_eq!(payloads, (11..=30).map(record_payload).collect::<Vec<_>>());
}

#[test]
fn test_paginate_early_exit_stops_fetching() {
    let client = seeded(1000);

    let taken = client.block_on(async {
        let stream = client
            .kv
            .paginate(FetchStrategy::Scan, TimeRange::all(), 0, 100)
            .await
            .expect("paginate");
        stream.take(150).count().await
    });

    assert_eq!(taken, 150);
    assert_eq!(client.store().calls(StoreOp::ZCount), 2);
}

#[test]
fn test_paginate_next_page_failure_ends_stream() {
    let client = seeded(10);

    let results = client.block_on(async {
        let stream = client
            .kv
            .paginate(FetchStrategy::Scan, TimeRange::all(), 0, 4)
            .await
            .expect("paginate");
        client.store().inject_fault(StoreOp::ZRange);
        stream.collect::<Vec<_>>().await
    });

    assert_eq!(results.len(), 5);
    assert!(results[..4].iter().all(Result::is_ok));

    let error = results[4].as_ref().expect_err("fifth item is the error");
    assert!(error.to_string().starts_with("fetching next page failed"));
    assert!(error.store_error().is_some());
}
