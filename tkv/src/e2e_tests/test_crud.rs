//! Single-record writes, reads, existence checks and deletes.

use crate::e2e_tests::helpers::{TestKv, ts};
use crate::page::Payload;

#[test]
fn test_set_get_roundtrip() {
    let client = TestKv::new();

    assert!(!client.set(&["a", "a"], "{\"id\": \"a\"}", 1));

    let payload = client.block_on(client.kv.get(&["a", "a"])).expect("get");
    assert_eq!(payload, Some(Payload::from("{\"id\": \"a\"}")));
}

#[test]
fn test_overwrite_reports_existing_and_moves_index_entry() {
    let client = TestKv::new();
    let index = client.kv.keys().index_key();
    let key = client.kv.keys().key(["user", "7"]);

    assert!(!client.set(&["user", "7"], "first", 100));
    assert_eq!(client.store().index_score(&index, &key), Some(100));

    assert!(client.set(&["user", "7"], "second", 50));
    assert_eq!(client.store().index_score(&index, &key), Some(50));
    assert_eq!(client.store().index_len(&index), 1);

    let payload = client.block_on(client.kv.get(&["user", "7"])).expect("get");
    assert_eq!(payload, Some(Payload::from("second")));
}

#[test]
fn test_exists_tracks_writes_and_deletes() {
    let client = TestKv::new();

    assert!(!client.block_on(client.kv.exists(&["x"])).expect("exists"));
    client.set(&["x"], "v", 1);
    assert!(client.block_on(client.kv.exists(&["x"])).expect("exists"));

    client.block_on(client.kv.delete(&["x"])).expect("delete");
    assert!(!client.block_on(client.kv.exists(&["x"])).expect("exists"));
}

#[test]
fn test_delete_removes_index_entry() {
    let client = TestKv::new();
    let index = client.kv.keys().index_key();

    client.set(&["a"], "a", 1);
    client.set(&["b"], "b", 2);
    client.block_on(client.kv.delete(&["a"])).expect("delete");

    assert_eq!(client.store().index_len(&index), 1);
    assert_eq!(
        client
            .store()
            .index_score(&index, &client.kv.keys().key(["a"])),
        None
    );

    let page = client
        .block_on(client.kv.fetch_page(crate::time::TimeRange::all(), 0, 10))
        .expect("fetch");
    assert_eq!(page.total(), 1);
    assert_eq!(page.into_payloads(), vec![Payload::from("b")]);
}

#[test]
fn test_delete_missing_is_ok() {
    let client = TestKv::new();
    client
        .block_on(client.kv.delete(&["never", "written"]))
        .expect("delete of a missing record succeeds");
}

#[test]
fn test_empty_payload_is_stored() {
    let client = TestKv::new();
    client
        .block_on(client.kv.set(&["empty"], Vec::<u8>::new(), ts(1)))
        .expect("set");

    let payload = client.block_on(client.kv.get(&["empty"])).expect("get");
    assert_eq!(payload, Some(Payload::default()));
}

#[test]
fn test_binary_payload_preserved() {
    let client = TestKv::new();
    let bytes: Vec<u8> = (0..=255).collect();

    client
        .block_on(client.kv.set(&["bin"], bytes.clone(), ts(1)))
        .expect("set");

    let payload = client
        .block_on(client.kv.get(&["bin"]))
        .expect("get")
        .expect("present");
    assert_eq!(payload.to_vec(), bytes);
}
