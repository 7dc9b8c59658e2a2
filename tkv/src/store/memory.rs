//! In-process implementation of `ScoreStore`.
//!
//! Strings and sorted sets share one keyspace behind a `RwLock`. Pipelines and
//! script evaluations each run under a single lock acquisition, which gives
//! them the same atomicity a real server provides. Individual commands take
//! the lock separately, so a sequence of them can interleave with writers.
//!
//! Scripts cannot be interpreted here. `load_script` only accepts the range
//! procedure, which the store evaluates natively, and rejects anything else
//! with `StoreError::UnsupportedScript`.
//!
//! For tests, the store supports:
//! - fault injection: `inject_fault` fails the next call of an operation
//! - call accounting: `calls` counts invocations per operation
//! - script cache flushes: `flush_scripts` forgets every registered handle

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;

use crate::range::RANGE_SCRIPT;
use crate::store::sorted_set::SortedSet;
use crate::store::{Command, Reply, ScoreStore, ScriptHandle, StoreError, StoreOp};
use crate::time::TimeRange;

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

fn wrong_type() -> StoreError {
    StoreError::Command(WRONG_TYPE.to_string())
}

fn not_an_integer() -> StoreError {
    StoreError::Command("ERR value is not an integer or out of range".to_string())
}

/// A stored value.
#[derive(Debug, Clone)]
enum Value {
    String(Bytes),
    SortedSet(SortedSet),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    SortedSet,
}

#[derive(Debug, Default)]
struct Keyspace {
    values: HashMap<String, Value>,
    /// Handles of loaded range procedures.
    scripts: HashSet<ScriptHandle>,
}

impl Keyspace {
    fn kind(&self, key: &str) -> Option<Kind> {
        self.values.get(key).map(|value| match value {
            Value::String(_) => Kind::String,
            Value::SortedSet(_) => Kind::SortedSet,
        })
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        match self.values.get(key) {
            Some(Value::String(bytes)) => Ok(Some(bytes.clone())),
            Some(Value::SortedSet(_)) => Err(wrong_type()),
            None => Ok(None),
        }
    }

    fn mget(&self, keys: &[String]) -> Vec<Option<Bytes>> {
        keys.iter()
            .map(|key| match self.values.get(key) {
                Some(Value::String(bytes)) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    fn sorted_set(&self, index: &str) -> Result<Option<&SortedSet>, StoreError> {
        match self.values.get(index) {
            Some(Value::SortedSet(set)) => Ok(Some(set)),
            Some(Value::String(_)) => Err(wrong_type()),
            None => Ok(None),
        }
    }

    fn zcount(&self, index: &str, range: &TimeRange) -> Result<usize, StoreError> {
        Ok(self.sorted_set(index)?.map_or(0, |set| set.count(range)))
    }

    fn zrange(
        &self,
        index: &str,
        range: &TimeRange,
        offset: usize,
        count: usize,
    ) -> Result<Vec<String>, StoreError> {
        Ok(self
            .sorted_set(index)?
            .map_or_else(Vec::new, |set| set.range(range, offset, count)))
    }

    /// Reject the pipeline if any command would fail against the state the
    /// earlier commands leave behind.
    fn check(&self, commands: &[Command]) -> Result<(), StoreError> {
        let mut pending: HashMap<&str, Option<Kind>> = HashMap::new();

        for command in commands {
            match command {
                Command::Set { key, .. } => {
                    pending.insert(key, Some(Kind::String));
                }
                Command::Del { key } => {
                    pending.insert(key, None);
                }
                Command::ZAdd { index, .. } | Command::ZRem { index, .. } => {
                    let kind = pending
                        .get(index.as_str())
                        .copied()
                        .unwrap_or_else(|| self.kind(index));
                    if kind == Some(Kind::String) {
                        return Err(wrong_type());
                    }
                    if matches!(command, Command::ZAdd { .. }) {
                        pending.insert(index, Some(Kind::SortedSet));
                    }
                }
            }
        }

        Ok(())
    }

    fn apply(&mut self, command: Command) -> Result<Reply, StoreError> {
        match command {
            Command::Set { key, value } => {
                self.values.insert(key, Value::String(value));
                Ok(Reply::Status("OK".to_string()))
            }
            Command::Del { key } => Ok(Reply::Integer(i64::from(
                self.values.remove(&key).is_some(),
            ))),
            Command::ZAdd {
                index,
                score,
                member,
            } => {
                let value = self
                    .values
                    .entry(index)
                    .or_insert_with(|| Value::SortedSet(SortedSet::default()));
                let Value::SortedSet(set) = value else {
                    return Err(wrong_type());
                };
                Ok(Reply::Integer(i64::from(set.insert(&member, score))))
            }
            Command::ZRem { index, member } => {
                let removed = match self.values.get_mut(&index) {
                    Some(Value::SortedSet(set)) => set.remove(&member),
                    Some(Value::String(_)) => return Err(wrong_type()),
                    None => false,
                };
                // An emptied sorted set no longer exists
                if self.sorted_set(&index)?.is_some_and(SortedSet::is_empty) {
                    self.values.remove(&index);
                }
                Ok(Reply::Integer(i64::from(removed)))
            }
        }
    }

    /// Count, select and fetch in one evaluation.
    fn eval_range(&self, keys: &[String], args: &[String]) -> Result<Reply, StoreError> {
        let [index] = keys else {
            return Err(StoreError::Command(
                "ERR range script expects one key".to_string(),
            ));
        };
        let [min, max, offset, count] = args else {
            return Err(StoreError::Command(
                "ERR range script expects four arguments".to_string(),
            ));
        };

        let range = TimeRange::from_args(min, max).ok_or_else(|| {
            StoreError::Command("ERR min or max is not a valid score".to_string())
        })?;
        let offset: usize = offset.parse().map_err(|_| not_an_integer())?;
        let count: usize = count.parse().map_err(|_| not_an_integer())?;

        let total = self.zcount(index, &range)?;
        if total == 0 {
            return Ok(Reply::Array(vec![
                Reply::Integer(0),
                Reply::Array(Vec::new()),
            ]));
        }
        let total = i64::try_from(total).map_err(|_| not_an_integer())?;

        let members = self.zrange(index, &range, offset, count)?;
        if members.is_empty() {
            return Ok(Reply::Array(vec![
                Reply::Integer(total),
                Reply::Array(Vec::new()),
            ]));
        }

        let values = self
            .mget(&members)
            .into_iter()
            .map(|value| value.map_or(Reply::Nil, Reply::Bulk))
            .collect();

        Ok(Reply::Array(vec![Reply::Integer(total), Reply::Array(values)]))
    }
}

#[derive(Debug, Default)]
struct Instrumentation {
    /// Operations that fail on their next call, in injection order.
    faults: Vec<StoreOp>,
    calls: HashMap<StoreOp, u64>,
}

/// In-process score-ordered key/value store.
///
/// # Thread Safety
///
/// All methods take `&self`; the keyspace is guarded by a `RwLock`, so reads
/// run concurrently and writes (pipelines, script registration) are
/// exclusive.
#[derive(Debug, Default)]
pub struct MemoryStore {
    keyspace: RwLock<Keyspace>,
    instrumentation: Mutex<Instrumentation>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with a transport error.
    ///
    /// Injecting the same operation twice fails its next two calls.
    pub fn inject_fault(&self, op: StoreOp) {
        if let Ok(mut instrumentation) = self.instrumentation.lock() {
            instrumentation.faults.push(op);
        }
    }

    /// Number of calls made to `op`, including failed ones.
    #[must_use]
    pub fn calls(&self, op: StoreOp) -> u64 {
        self.instrumentation
            .lock()
            .map_or(0, |instrumentation| {
                instrumentation.calls.get(&op).copied().unwrap_or(0)
            })
    }

    /// Forget every registered script, as a server restart would.
    pub fn flush_scripts(&self) -> Result<(), StoreError> {
        self.write()?.scripts.clear();
        Ok(())
    }

    /// Score of `member` in the sorted set at `index`.
    #[must_use]
    pub fn index_score(&self, index: &str, member: &str) -> Option<i64> {
        let keyspace = self.read().ok()?;
        let score = keyspace.sorted_set(index).ok()??.score(member);
        drop(keyspace);
        score
    }

    /// Number of members in the sorted set at `index`.
    #[must_use]
    pub fn index_len(&self, index: &str) -> usize {
        let Ok(keyspace) = self.read() else {
            return 0;
        };
        let len = keyspace
            .sorted_set(index)
            .ok()
            .flatten()
            .map_or(0, SortedSet::len);
        drop(keyspace);
        len
    }

    /// Number of keys of any type.
    #[must_use]
    pub fn key_count(&self) -> usize {
        let Ok(keyspace) = self.read() else {
            return 0;
        };
        let count = keyspace.values.len();
        drop(keyspace);
        count
    }

    /// Record a call of `op` and consume a pending fault for it.
    fn enter(&self, op: StoreOp) -> Result<(), StoreError> {
        let faulted = {
            let mut instrumentation = self
                .instrumentation
                .lock()
                .map_err(|_| StoreError::LockPoisoned)?;
            *instrumentation.calls.entry(op).or_insert(0) += 1;

            let position = instrumentation.faults.iter().position(|fault| *fault == op);
            position.map(|position| instrumentation.faults.remove(position))
        };

        if faulted.is_some() {
            return Err(StoreError::Transport(format!("injected fault in {op}")));
        }

        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Keyspace>, StoreError> {
        self.keyspace.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Keyspace>, StoreError> {
        self.keyspace.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl ScoreStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.enter(StoreOp::Get)?;
        self.read()?.get(key)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.enter(StoreOp::Exists)?;
        Ok(self.read()?.values.contains_key(key))
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Bytes>>, StoreError> {
        self.enter(StoreOp::MGet)?;
        Ok(self.read()?.mget(keys))
    }

    async fn zcount(&self, index: &str, range: &TimeRange) -> Result<usize, StoreError> {
        self.enter(StoreOp::ZCount)?;
        self.read()?.zcount(index, range)
    }

    async fn zrange_by_score(
        &self,
        index: &str,
        range: &TimeRange,
        offset: usize,
        count: usize,
    ) -> Result<Vec<String>, StoreError> {
        self.enter(StoreOp::ZRange)?;
        self.read()?.zrange(index, range, offset, count)
    }

    // The write lock spans check and apply so the pipeline is atomic
    #[allow(clippy::significant_drop_tightening)]
    async fn exec_atomic(&self, commands: Vec<Command>) -> Result<Vec<Reply>, StoreError> {
        self.enter(StoreOp::Exec)?;
        let mut keyspace = self.write()?;
        keyspace.check(&commands)?;

        commands
            .into_iter()
            .map(|command| keyspace.apply(command))
            .collect()
    }

    async fn load_script(&self, body: &str) -> Result<ScriptHandle, StoreError> {
        self.enter(StoreOp::LoadScript)?;
        if body != RANGE_SCRIPT {
            return Err(StoreError::UnsupportedScript);
        }
        let handle = ScriptHandle::new(format!("{:08x}", crc32fast::hash(body.as_bytes())));

        self.write()?.scripts.insert(handle.clone());
        Ok(handle)
    }

    async fn eval_script(
        &self,
        handle: &ScriptHandle,
        keys: &[String],
        args: &[String],
    ) -> Result<Reply, StoreError> {
        self.enter(StoreOp::EvalScript)?;
        let keyspace = self.read()?;

        if !keyspace.scripts.contains(handle) {
            return Err(StoreError::NoScript(handle.clone()));
        }
        keyspace.eval_range(keys, args)
    }
}
