//! Interface to the score-ordered key/value store.
//!
//! The store is an external collaborator (a networked server in production).
//! `ScoreStore` names the commands the core relies on:
//!
//! - string `GET` / `EXISTS` / `MGET`
//! - sorted set `ZCOUNT` and `ZRANGE ... BYSCORE LIMIT`
//! - `MULTI`/`EXEC` pipelines of `SET` / `ZADD` / `DEL` / `ZREM`
//! - script registration (`SCRIPT LOAD`) and evaluation by handle (`EVALSHA`)
//!
//! `MemoryStore` is an in-process implementation used by tests and the demo
//! binary.

mod memory;
mod sorted_set;

use std::fmt;
use std::future::Future;

use bytes::Bytes;

use crate::time::TimeRange;

pub use memory::MemoryStore;

/// A reply from the store, mirroring the store's reply protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Absent value.
    Nil,
    /// Simple status such as `OK`.
    Status(String),
    /// Integer reply.
    Integer(i64),
    /// Binary-safe string reply.
    Bulk(Bytes),
    /// Nested replies.
    Array(Vec<Self>),
}

impl Reply {
    /// The integer value, if this is an integer reply.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

/// A write command that can run inside an atomic pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Overwrite a string value. Replies `Status("OK")`.
    Set { key: String, value: Bytes },
    /// Insert or update a sorted set member. Replies the number of members
    /// added (`1` for an insert, `0` for an update).
    ZAdd {
        index: String,
        score: i64,
        member: String,
    },
    /// Delete a key of any type. Replies the number of keys removed.
    Del { key: String },
    /// Remove a sorted set member. Replies the number of members removed.
    ZRem { index: String, member: String },
}

/// Handle returned by script registration, used to invoke the script.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptHandle(String);

impl ScriptHandle {
    /// Wrap a store-issued handle.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// The handle text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store operations, used for fault injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Exists,
    MGet,
    ZCount,
    ZRange,
    Exec,
    LoadScript,
    EvalScript,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Exists => "EXISTS",
            Self::MGet => "MGET",
            Self::ZCount => "ZCOUNT",
            Self::ZRange => "ZRANGE",
            Self::Exec => "EXEC",
            Self::LoadScript => "SCRIPT LOAD",
            Self::EvalScript => "EVALSHA",
        };
        f.write_str(name)
    }
}

/// Errors reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Network or connection level failure.
    Transport(String),
    /// The store rejected a command (wrong type, bad argument, ...).
    Command(String),
    /// The script handle is not registered with the store.
    NoScript(ScriptHandle),
    /// The store cannot register this script body.
    UnsupportedScript,
    /// An internal lock was poisoned.
    LockPoisoned,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Command(msg) => write!(f, "command error: {msg}"),
            Self::NoScript(handle) => write!(f, "no script registered for handle {handle}"),
            Self::UnsupportedScript => write!(f, "script body not supported by store"),
            Self::LockPoisoned => write!(f, "store lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {}

/// A networked, score-ordered key/value store.
///
/// Implementations must be thread-safe; every method may be called
/// concurrently. Cancellation is future drop.
///
/// # Atomicity
///
/// - `exec_atomic` applies all commands as one indivisible unit.
/// - `eval_script` runs the script body without interleaving other commands.
pub trait ScoreStore: Send + Sync {
    /// Fetch a string value. `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Bytes>, StoreError>> + Send;

    /// Whether the key exists (any type).
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Fetch several string values in one round trip, in key order.
    ///
    /// Missing keys (or keys holding a non-string) yield `None`.
    fn mget(
        &self,
        keys: &[String],
    ) -> impl Future<Output = Result<Vec<Option<Bytes>>, StoreError>> + Send;

    /// Count sorted set members with a score in `range`.
    fn zcount(
        &self,
        index: &str,
        range: &TimeRange,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Members with a score in `range`, ascending by score, skipping `offset`
    /// matches and returning at most `count`.
    fn zrange_by_score(
        &self,
        index: &str,
        range: &TimeRange,
        offset: usize,
        count: usize,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Run `commands` as one atomic unit, returning one reply per command.
    fn exec_atomic(
        &self,
        commands: Vec<Command>,
    ) -> impl Future<Output = Result<Vec<Reply>, StoreError>> + Send;

    /// Register a script body, returning its handle. Idempotent.
    fn load_script(
        &self,
        body: &str,
    ) -> impl Future<Output = Result<ScriptHandle, StoreError>> + Send;

    /// Evaluate a registered script.
    ///
    /// Fails with `StoreError::NoScript` if the handle is unknown to the store.
    fn eval_script(
        &self,
        handle: &ScriptHandle,
        keys: &[String],
        args: &[String],
    ) -> impl Future<Output = Result<Reply, StoreError>> + Send;
}
