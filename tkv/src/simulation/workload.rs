//! Seeded operation generator.

// Simulation code legitimately needs cloning for test data
#![allow(clippy::disallowed_methods)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::kv::Record;
use crate::time::{TimeRange, Timestamp};

/// Configuration for workload generation.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Number of distinct record ids.
    pub id_pool_size: usize,
    /// Maximum payload length in bytes.
    pub max_payload_len: usize,
    /// Timestamps are drawn from `0..max_timestamp`.
    pub max_timestamp: i64,
    /// Maximum records per bulk write.
    pub max_bulk_len: usize,
    /// Maximum page size for reads.
    pub max_page_size: usize,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            id_pool_size: 40,
            max_payload_len: 32,
            max_timestamp: 500,
            max_bulk_len: 8,
            max_page_size: 12,
        }
    }
}

/// One generated operation.
#[derive(Debug, Clone)]
pub enum Operation {
    Set {
        id: String,
        payload: Vec<u8>,
        last_modified: Timestamp,
    },
    BulkSet(Vec<Record>),
    Delete {
        id: String,
    },
    Get {
        id: String,
    },
    FetchScan {
        range: TimeRange,
        offset: usize,
        limit: usize,
    },
    FetchConsistent {
        range: TimeRange,
        offset: usize,
        limit: usize,
    },
    /// The store forgets its registered scripts.
    FlushScripts,
}

impl Operation {
    /// Whether this operation writes to the store.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Set { .. } | Self::BulkSet(_) | Self::Delete { .. }
        )
    }
}

/// Generator for reproducible operation sequences.
pub struct WorkloadGenerator {
    rng: StdRng,
    config: WorkloadConfig,
}

impl WorkloadGenerator {
    /// Create a generator with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, WorkloadConfig::default())
    }

    /// Create a generator with custom configuration.
    #[must_use]
    pub fn with_config(seed: u64, config: WorkloadConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    /// Generate the next operation.
    pub fn next_operation(&mut self) -> Operation {
        match self.rng.random_range(0..100) {
            0..35 => Operation::Set {
                id: self.id(),
                payload: self.payload(),
                last_modified: self.timestamp(),
            },
            35..45 => {
                let len = self.rng.random_range(1..=self.config.max_bulk_len);
                let records = (0..len)
                    .map(|_| Record::new([self.id()], self.payload(), self.timestamp()))
                    .collect();
                Operation::BulkSet(records)
            }
            45..55 => Operation::Delete { id: self.id() },
            55..65 => Operation::Get { id: self.id() },
            65..80 => {
                let (range, offset, limit) = self.read();
                Operation::FetchScan {
                    range,
                    offset,
                    limit,
                }
            }
            80..98 => {
                let (range, offset, limit) = self.read();
                Operation::FetchConsistent {
                    range,
                    offset,
                    limit,
                }
            }
            _ => Operation::FlushScripts,
        }
    }

    /// Whether to inject a fault into the next operation.
    pub fn should_inject_fault(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        self.rng.random::<f64>() < rate
    }

    fn id(&mut self) -> String {
        format!("r{}", self.rng.random_range(0..self.config.id_pool_size))
    }

    fn payload(&mut self) -> Vec<u8> {
        let len = self.rng.random_range(0..=self.config.max_payload_len);
        let mut payload = vec![0u8; len];
        self.rng.fill(payload.as_mut_slice());
        payload
    }

    fn timestamp(&mut self) -> Timestamp {
        Timestamp::from_nanos(self.rng.random_range(0..self.config.max_timestamp))
    }

    fn read(&mut self) -> (TimeRange, usize, usize) {
        let max = self.config.max_timestamp;
        let from = self.rng.random_range(0..max);
        let to = self.rng.random_range(from..max);

        let range = match self.rng.random_range(0..4) {
            0 => TimeRange::all(),
            1 => TimeRange::new(Some(Timestamp::from_nanos(from)), None),
            2 => TimeRange::new(None, Some(Timestamp::from_nanos(to))),
            _ => TimeRange::between(Timestamp::from_nanos(from), Timestamp::from_nanos(to)),
        };
        let offset = self.rng.random_range(0..self.config.id_pool_size);
        let limit = self.rng.random_range(1..=self.config.max_page_size);

        (range, offset, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = WorkloadGenerator::new(99);
        let mut b = WorkloadGenerator::new(99);

        for _ in 0..200 {
            let left = format!("{:?}", a.next_operation());
            let right = format!("{:?}", b.next_operation());
            assert_eq!(left, right);
        }
    }

    #[test]
    fn test_generates_every_kind() {
        let mut generator = WorkloadGenerator::new(5);
        let operations: Vec<Operation> = (0..1000).map(|_| generator.next_operation()).collect();

        let has = |kind: fn(&Operation) -> bool| operations.iter().any(kind);

        assert!(has(|op| matches!(op, Operation::Set { .. })));
        assert!(has(|op| matches!(op, Operation::BulkSet(_))));
        assert!(has(|op| matches!(op, Operation::Delete { .. })));
        assert!(has(|op| matches!(op, Operation::FetchConsistent { .. })));
        assert!(has(|op| matches!(op, Operation::FlushScripts)));
    }
}
