//! Common helpers for end-to-end tests.

use futures::StreamExt;

use crate::kv::{FetchStrategy, Record, TimeKv};
use crate::page::{Page, Payload};
use crate::store::MemoryStore;
use crate::testing::new_test_kv;
use crate::time::{TimeRange, Timestamp};

/// A store accessor with its own runtime, for synchronous tests.
pub struct TestKv {
    pub kv: TimeKv<MemoryStore>,
    pub runtime: tokio::runtime::Runtime,
}

impl TestKv {
    /// Create a test accessor over a fresh store.
    #[must_use]
    pub fn new() -> Self {
        #[allow(clippy::expect_used)]
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to create runtime");

        Self {
            kv: new_test_kv(),
            runtime,
        }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &MemoryStore {
        self.kv.store()
    }

    /// Run a future to completion.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Write a record, panicking on failure.
    pub fn set(&self, id: &[&str], payload: &str, last_modified: i64) -> bool {
        #[allow(clippy::expect_used)]
        self.block_on(
            self.kv
                .set(id, payload.as_bytes().to_vec(), ts(last_modified)),
        )
        .expect("set should succeed")
    }

    /// Write `records`, panicking on failure.
    pub fn bulk_set(&self, records: &[Record]) {
        #[allow(clippy::expect_used)]
        self.block_on(self.kv.bulk_set(records))
            .expect("bulk_set should succeed");
    }

    /// Fetch one page, panicking on failure.
    pub fn fetch(
        &self,
        strategy: FetchStrategy,
        range: TimeRange,
        offset: usize,
        limit: usize,
    ) -> Page {
        #[allow(clippy::expect_used)]
        self.block_on(self.kv.fetch(strategy, range, offset, limit))
            .expect("fetch should succeed")
    }

    /// Paginate over `range` and collect every payload, panicking on failure.
    pub fn paginate_all(
        &self,
        strategy: FetchStrategy,
        range: TimeRange,
        limit: usize,
    ) -> Vec<Payload> {
        self.block_on(async {
            #[allow(clippy::expect_used)]
            let stream = self
                .kv
                .paginate(strategy, range, 0, limit)
                .await
                .expect("first page should succeed");

            stream
                .map(|item| {
                    #[allow(clippy::expect_used)]
                    item.expect("page should succeed")
                })
                .collect()
                .await
        })
    }
}

/// Timestamp from raw nanoseconds.
#[must_use]
pub const fn ts(nanos: i64) -> Timestamp {
    Timestamp::from_nanos(nanos)
}

/// A record with id `["rec", "{seed}"]`, payload `value-{seed}` and
/// timestamp `seed`.
#[must_use]
pub fn new_record(seed: i64) -> Record {
    Record::new(
        ["rec".to_string(), format!("{seed:04}")],
        format!("value-{seed}").into_bytes(),
        ts(seed),
    )
}

/// Payload written by `new_record(seed)`.
#[must_use]
pub fn record_payload(seed: i64) -> Payload {
    Payload::from(format!("value-{seed}").into_bytes())
}

/// Decode payloads as UTF-8 for readable assertions.
#[must_use]
pub fn payload_strings(payloads: &[Payload]) -> Vec<String> {
    payloads
        .iter()
        .map(|p| String::from_utf8_lossy(p.as_bytes()).into_owned())
        .collect()
}
