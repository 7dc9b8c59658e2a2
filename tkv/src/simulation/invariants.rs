//! Expected-state model and invariant checks.

// Simulation code legitimately needs cloning for test data
#![allow(clippy::disallowed_methods)]

use std::collections::HashMap;
use std::fmt;

use crate::kv::{Record, TimeKv};
use crate::page::Page;
use crate::store::{MemoryStore, ScoreStore};
use crate::time::TimeRange;

/// What the store must contain: composed key to (payload, score).
#[derive(Debug, Default)]
pub struct Model {
    records: HashMap<String, (Vec<u8>, i64)>,
}

impl Model {
    /// Create an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record a successful write. Returns whether the key already existed.
    pub fn set(&mut self, key: String, payload: Vec<u8>, score: i64) -> bool {
        self.records.insert(key, (payload, score)).is_some()
    }

    /// Record a successful bulk write.
    pub fn bulk_set(&mut self, kv: &TimeKv<MemoryStore>, records: &[Record]) {
        for record in records {
            self.set(
                kv.keys().key(&record.id),
                record.payload.to_vec(),
                record.last_modified.as_nanos(),
            );
        }
    }

    /// Record a successful delete.
    pub fn delete(&mut self, key: &str) {
        self.records.remove(key);
    }

    /// Payload of `key`, if live.
    #[must_use]
    pub fn payload(&self, key: &str) -> Option<&[u8]> {
        self.records.get(key).map(|(payload, _)| payload.as_slice())
    }

    /// The page a quiescent store must return.
    #[must_use]
    pub fn expected_page(
        &self,
        range: &TimeRange,
        offset: usize,
        limit: usize,
    ) -> (usize, Vec<Vec<u8>>) {
        let mut matches: Vec<(i64, &str, &[u8])> = self
            .records
            .iter()
            .filter(|(_, (_, score))| range.contains(*score))
            .map(|(key, (payload, score))| (*score, key.as_str(), payload.as_slice()))
            .collect();
        matches.sort_unstable();

        let values = matches
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(_, _, payload)| payload.to_vec())
            .collect();

        (matches.len(), values)
    }

    fn entries(&self) -> impl Iterator<Item = (&str, &[u8], i64)> {
        self.records
            .iter()
            .map(|(key, (payload, score))| (key.as_str(), payload.as_slice(), *score))
    }
}

/// A detected invariant violation.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violation.
    pub description: String,
    /// Operation index where it was detected.
    pub operation_index: usize,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation {}: {}", self.operation_index, self.description)
    }
}

/// Checker comparing the store against a `Model`.
#[derive(Debug, Default)]
pub struct InvariantChecker {
    violations: Vec<InvariantViolation>,
}

impl InvariantChecker {
    /// Create a new invariant checker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the checker, returning its violations.
    #[must_use]
    pub fn into_violations(self) -> Vec<InvariantViolation> {
        self.violations
    }

    /// Record a violation.
    pub fn violation(&mut self, operation_index: usize, description: impl Into<String>) {
        let description = description.into();
        tracing::warn!("invariant violated at operation {operation_index}: {description}");
        self.violations.push(InvariantViolation {
            description,
            operation_index,
        });
    }

    /// Check that primary values and the index both match `model`.
    pub async fn check_store(
        &mut self,
        kv: &TimeKv<MemoryStore>,
        model: &Model,
        operation_index: usize,
    ) {
        let store = kv.store();
        let index = kv.keys().index_key();

        let index_len = store.index_len(&index);
        if index_len != model.len() {
            self.violation(
                operation_index,
                format!("index has {index_len} entries, expected {}", model.len()),
            );
        }

        // Primary values plus the index itself, which vanishes when emptied
        let expected_keys = model.len() + usize::from(!model.is_empty());
        let key_count = store.key_count();
        if key_count != expected_keys {
            self.violation(
                operation_index,
                format!("store has {key_count} keys, expected {expected_keys}"),
            );
        }

        for (key, payload, score) in model.entries() {
            match store.index_score(&index, key) {
                Some(actual) if actual == score => {}
                actual => self.violation(
                    operation_index,
                    format!("index score of {key} is {actual:?}, expected {score}"),
                ),
            }

            match store.get(key).await {
                Ok(Some(actual)) if actual.as_ref() == payload => {}
                Ok(actual) => self.violation(
                    operation_index,
                    format!("payload of {key} is {actual:?}, expected {payload:?}"),
                ),
                Err(e) => self.violation(operation_index, format!("reading {key} failed: {e}")),
            }
        }
    }

    /// Check a page read from a quiescent store against `model`.
    pub fn check_page(
        &mut self,
        page: Page,
        model: &Model,
        range: &TimeRange,
        offset: usize,
        limit: usize,
        operation_index: usize,
    ) {
        let (total, values) = model.expected_page(range, offset, limit);

        if page.total() != total {
            self.violation(
                operation_index,
                format!("page total {} in {range}, expected {total}", page.total()),
            );
        }

        let actual: Vec<Vec<u8>> = page.into_iter().map(|p| p.to_vec()).collect();
        if actual != values {
            self.violation(
                operation_index,
                format!(
                    "page at offset {offset} in {range} has {} values, expected {}",
                    actual.len(),
                    values.len()
                ),
            );
        }
    }
}
