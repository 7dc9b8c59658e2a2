//! Consistent pages stay self-consistent while writers move records around.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::kv::TimeKv;
use crate::page::{Page, Payload};
use crate::store::MemoryStore;
use crate::testing::new_test_kv;
use crate::time::{TimeRange, Timestamp};

const RECORDS: usize = 64;
const WRITERS: u64 = 4;
const WRITES_PER_WRITER: usize = 200;
const READS: usize = 100;
const MAX_NANOS: i64 = 1_000;

/// Payloads carry their own timestamp so readers can check range membership.
fn encode(nanos: i64) -> Vec<u8> {
    nanos.to_be_bytes().to_vec()
}

fn decode(payload: &Payload) -> i64 {
    let bytes: [u8; 8] = payload.as_bytes().try_into().expect("8-byte payload");
    i64::from_be_bytes(bytes)
}

fn check_page(page: Page, range: TimeRange, offset: usize, limit: usize) {
    let expected = page.total().saturating_sub(offset).min(limit);
    assert_eq!(page.len(), expected, "page of {} at {offset}", page.total());

    for payload in page {
        let nanos = decode(&payload);
        assert!(range.contains(nanos), "{nanos} outside {range}");
    }
}

#[allow(clippy::disallowed_methods)] // Arc::clone is safe and expected
async fn run(seed: u64) {
    let kv: Arc<TimeKv<MemoryStore>> = Arc::new(new_test_kv());
    let mut rng = StdRng::seed_from_u64(seed);

    for i in 0..RECORDS {
        let id = i.to_string();
        let nanos = rng.random_range(0..MAX_NANOS);
        kv.set(&[id.as_str()], encode(nanos), Timestamp::from_nanos(nanos))
            .await
            .expect("seed write");
    }

    let mut writers = Vec::new();
    for writer in 0..WRITERS {
        let kv = Arc::clone(&kv);
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(writer + 1));
        writers.push(tokio::spawn(async move {
            for _ in 0..WRITES_PER_WRITER {
                let id = rng.random_range(0..RECORDS).to_string();
                let nanos = rng.random_range(0..MAX_NANOS);
                kv.set(&[id.as_str()], encode(nanos), Timestamp::from_nanos(nanos))
                    .await
                    .expect("write");
                tokio::task::yield_now().await;
            }
        }));
    }

    let reader = {
        let kv = Arc::clone(&kv);
        let mut rng = StdRng::seed_from_u64(seed.wrapping_mul(31));
        tokio::spawn(async move {
            for _ in 0..READS {
                let from = rng.random_range(0..MAX_NANOS);
                let to = rng.random_range(from..MAX_NANOS);
                let range =
                    TimeRange::between(Timestamp::from_nanos(from), Timestamp::from_nanos(to));
                let offset = rng.random_range(0..8);
                let limit = rng.random_range(1..16);

                let page = kv
                    .fetch_page_consistent(range, offset, limit)
                    .await
                    .expect("consistent read");
                check_page(page, range, offset, limit);
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers {
        writer.await.expect("writer task");
    }
    reader.await.expect("reader task");

    // Every record still has exactly one index entry
    assert_eq!(kv.store().index_len(&kv.keys().index_key()), RECORDS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_consistent_reads_under_concurrent_writes() {
    for seed in [1, 7, 42] {
        run(seed).await;
    }
}
