//! Bulk writes go through one pipeline and keep the index in step.

use crate::e2e_tests::helpers::{TestKv, new_record, record_payload, ts};
use crate::kv::{FetchStrategy, Record};
use crate::store::StoreOp;
use crate::time::TimeRange;

#[test]
fn test_bulk_set_writes_every_record() {
    let client = TestKv::new();
    let records: Vec<Record> = (1..=50).map(new_record).collect();

    client.bulk_set(&records);

    assert_eq!(client.store().calls(StoreOp::Exec), 1);
    assert_eq!(client.store().index_len(&client.kv.keys().index_key()), 50);

    for seed in [1, 25, 50] {
        let id = format!("{seed:04}");
        let payload = client.block_on(client.kv.get(&["rec", &id])).expect("get");
        assert_eq!(payload, Some(record_payload(seed)));
    }
}

#[test]
fn test_bulk_set_empty_sends_nothing() {
    let client = TestKv::new();
    client.bulk_set(&[]);
    assert_eq!(client.store().calls(StoreOp::Exec), 0);
    assert_eq!(client.store().key_count(), 0);
}

#[test]
fn test_bulk_set_duplicate_id_last_wins() {
    let client = TestKv::new();
    let records = vec![
        Record::new(["dup"], "old", ts(10)),
        Record::new(["dup"], "new", ts(20)),
    ];

    client.bulk_set(&records);

    let index = client.kv.keys().index_key();
    assert_eq!(client.store().index_len(&index), 1);
    assert_eq!(
        client
            .store()
            .index_score(&index, &client.kv.keys().key(["dup"])),
        Some(20)
    );
}

#[test]
fn test_bulk_set_records_are_range_ordered() {
    let client = TestKv::new();
    // Written out of timestamp order
    let records: Vec<Record> = [5, 3, 9, 1, 7].into_iter().map(new_record).collect();
    client.bulk_set(&records);

    let page = client.fetch(FetchStrategy::Scan, TimeRange::between(ts(3), ts(7)), 0, 10);

    assert_eq!(page.total(), 3);
    assert_eq!(
        page.into_payloads(),
        vec![record_payload(3), record_payload(5), record_payload(7)]
    );
}
