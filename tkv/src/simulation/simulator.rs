//! Main simulator harness.

// Simulation code legitimately needs cloning for test data
#![allow(clippy::disallowed_methods)]

use crate::error::TkvError;
use crate::kv::TimeKv;
use crate::store::{MemoryStore, StoreError, StoreOp};
use crate::testing::new_test_kv;

use super::invariants::{InvariantChecker, InvariantViolation, Model};
use super::workload::{Operation, WorkloadConfig, WorkloadGenerator};

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Probability that an operation's first store call fails.
    pub fault_rate: f64,
    /// Workload generation configuration.
    pub workload: WorkloadConfig,
}

impl SimulatorConfig {
    /// Create a simulator config with the given seed and no faults.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            fault_rate: 0.0,
            workload: WorkloadConfig::default(),
        }
    }

    /// Set the fault rate.
    #[must_use]
    pub const fn with_fault_rate(mut self, rate: f64) -> Self {
        self.fault_rate = rate;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The seed used for this simulation.
    pub seed: u64,
    /// Number of operations executed.
    pub operations: usize,
    /// Operations that failed because of an injected fault.
    pub injected_failures: usize,
    /// Records live at the end of the run.
    pub live_records: usize,
    /// Invariant violations detected.
    pub invariant_violations: Vec<InvariantViolation>,
}

impl SimulationResult {
    /// Whether the run finished without invariant violations.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.invariant_violations.is_empty()
    }
}

/// Runs a seeded workload against a `MemoryStore` and checks the model after
/// every operation.
pub struct Simulator {
    config: SimulatorConfig,
    generator: WorkloadGenerator,
    kv: TimeKv<MemoryStore>,
    model: Model,
    checker: InvariantChecker,
    injected_failures: usize,
}

impl Simulator {
    /// Create a simulator with a fresh store.
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let generator = WorkloadGenerator::with_config(config.seed, config.workload.clone());

        Self {
            config,
            generator,
            kv: new_test_kv(),
            model: Model::new(),
            checker: InvariantChecker::new(),
            injected_failures: 0,
        }
    }

    /// Run `count` operations.
    pub async fn run(mut self, count: usize) -> SimulationResult {
        for index in 0..count {
            let operation = self.generator.next_operation();
            let fault = self.pick_fault(&operation);
            if let Some(op) = fault {
                self.kv.store().inject_fault(op);
            }

            let outcome = self.execute(&operation, index).await;
            match (outcome, fault) {
                (Ok(()), None) => {}
                (Ok(()), Some(op)) => self
                    .checker
                    .violation(index, format!("injected {op} fault did not surface")),
                (Err(e), Some(_)) if is_injected(&e) => self.injected_failures += 1,
                (Err(e), _) => self
                    .checker
                    .violation(index, format!("{operation:?} failed: {e}")),
            }

            if operation.is_write() {
                self.checker.check_store(&self.kv, &self.model, index).await;
            }
        }

        SimulationResult {
            seed: self.config.seed,
            operations: count,
            injected_failures: self.injected_failures,
            live_records: self.model.len(),
            invariant_violations: self.checker.into_violations(),
        }
    }

    /// The store call that fails when a fault is injected into `operation`.
    ///
    /// Only calls every execution of the operation makes are chosen, so an
    /// injected fault never lingers into the next operation.
    fn pick_fault(&mut self, operation: &Operation) -> Option<StoreOp> {
        if !self.generator.should_inject_fault(self.config.fault_rate) {
            return None;
        }
        match operation {
            Operation::Set { .. } | Operation::BulkSet(_) | Operation::Delete { .. } => {
                Some(StoreOp::Exec)
            }
            Operation::Get { .. } => Some(StoreOp::Get),
            Operation::FetchScan { .. } => Some(StoreOp::ZCount),
            Operation::FetchConsistent { .. } => Some(StoreOp::EvalScript),
            Operation::FlushScripts => None,
        }
    }

    async fn execute(&mut self, operation: &Operation, index: usize) -> Result<(), TkvError> {
        match operation {
            Operation::Set {
                id,
                payload,
                last_modified,
            } => {
                let existed = self
                    .kv
                    .set(&[id.as_str()], payload.clone(), *last_modified)
                    .await?;
                let key = self.kv.keys().key([id]);
                let expected = self
                    .model
                    .set(key, payload.clone(), last_modified.as_nanos());
                if existed != expected {
                    self.checker.violation(
                        index,
                        format!("set of {id} reported existed={existed}, expected {expected}"),
                    );
                }
            }
            Operation::BulkSet(records) => {
                self.kv.bulk_set(records).await?;
                self.model.bulk_set(&self.kv, records);
            }
            Operation::Delete { id } => {
                self.kv.delete(&[id.as_str()]).await?;
                self.model.delete(&self.kv.keys().key([id]));
            }
            Operation::Get { id } => {
                let actual = self.kv.get(&[id.as_str()]).await?;
                let key = self.kv.keys().key([id]);
                let expected = self.model.payload(&key);
                if actual.as_ref().map(|p| p.as_bytes()) != expected {
                    self.checker
                        .violation(index, format!("get of {id} returned {actual:?}"));
                }
            }
            Operation::FetchScan {
                range,
                offset,
                limit,
            } => {
                let page = self.kv.fetch_page(*range, *offset, *limit).await?;
                self.checker
                    .check_page(page, &self.model, range, *offset, *limit, index);
            }
            Operation::FetchConsistent {
                range,
                offset,
                limit,
            } => {
                let page = self
                    .kv
                    .fetch_page_consistent(*range, *offset, *limit)
                    .await?;
                self.checker
                    .check_page(page, &self.model, range, *offset, *limit, index);
            }
            Operation::FlushScripts => {
                if let Err(e) = self.kv.store().flush_scripts() {
                    self.checker
                        .violation(index, format!("flushing scripts failed: {e}"));
                }
            }
        }
        Ok(())
    }
}

fn is_injected(error: &TkvError) -> bool {
    matches!(
        error.store_error(),
        Some(StoreError::Transport(message)) if message.starts_with("injected fault")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(result: &SimulationResult) -> String {
        result
            .invariant_violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    #[tokio::test]
    async fn test_simulation_without_faults() {
        for seed in [1, 2, 3, 12345] {
            let result = Simulator::new(SimulatorConfig::new(seed)).run(500).await;
            assert!(result.passed(), "seed {seed}: {}", summary(&result));
            assert_eq!(result.injected_failures, 0);
        }
    }

    #[tokio::test]
    async fn test_simulation_with_faults() {
        for seed in [7, 8, 9] {
            let config = SimulatorConfig::new(seed).with_fault_rate(0.2);
            let result = Simulator::new(config).run(500).await;

            assert!(result.passed(), "seed {seed}: {}", summary(&result));
            assert!(result.injected_failures > 0, "seed {seed}");
        }
    }

    #[tokio::test]
    async fn test_simulation_is_deterministic() {
        let first = Simulator::new(SimulatorConfig::new(77).with_fault_rate(0.1))
            .run(300)
            .await;
        let second = Simulator::new(SimulatorConfig::new(77).with_fault_rate(0.1))
            .run(300)
            .await;

        assert_eq!(first.seed, 77);
        assert_eq!(first.operations, second.operations);
        assert_eq!(first.injected_failures, second.injected_failures);
        assert_eq!(first.live_records, second.live_records);
    }
}
