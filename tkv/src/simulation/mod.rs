//! Deterministic simulation testing.
//!
//! A seeded workload of writes, deletes and range reads runs against a
//! `MemoryStore` with injected faults. After every operation the store is
//! compared against a model of what it must contain:
//!
//! - every live record has its payload under its key and exactly one index
//!   entry scored with its latest timestamp
//! - deleted records have neither
//! - a failed write changes nothing
//! - consistent pages agree with the model's ordering
//!
//! Given the same seed, the operation sequence and fault schedule are
//! identical.

mod invariants;
mod simulator;
mod workload;
