use std::sync::atomic::{AtomicU64, Ordering};

use crate::key::{Delimiter, KeyComposer};
use crate::kv::TimeKv;
use crate::store::MemoryStore;

static TEST_NAMESPACE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A unique namespace for one test.
pub fn unique_namespace(prefix: &str) -> String {
    let counter = TEST_NAMESPACE_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{prefix}_{}_{counter}", std::process::id())
}

/// Create a store accessor over a fresh in-memory store.
///
/// Each call gets its own store and a unique namespace, so keys printed in
/// failures identify the test instance.
pub fn new_test_kv() -> TimeKv<MemoryStore> {
    TimeKv::new(
        MemoryStore::new(),
        KeyComposer::new(unique_namespace("tkv_test"), Delimiter::Pipe),
    )
}
