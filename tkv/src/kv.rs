//! Time-indexed key/value access.
//!
//! `TimeKv` stores opaque payloads under composed keys and keeps a sorted set
//! (the ordering index) that maps each key to its last-modified timestamp.
//! The index and the primary values are written in the same atomic pipeline,
//! so after any successful write there is exactly one index entry per key,
//! scored with the latest write's timestamp.
//!
//! Two strategies read ranges back:
//!
//! - `fetch_page`: count, select and fetch as three separate commands. Cheap,
//!   but a concurrent writer can slip in between the steps: a page may hold
//!   fewer values than `total` implies, or a value whose timestamp has since
//!   moved outside the range.
//! - `fetch_page_consistent`: the same three steps inside one script
//!   evaluation on the store, so `total` and the values form one snapshot.

use bytes::Bytes;

use crate::config::TkvConfig;
use crate::error::TkvError;
use crate::key::KeyComposer;
use crate::page::{Page, Payload};
use crate::paginate::{PageFetch, Paginated, paginate};
use crate::range::{RANGE_SCRIPT, ScriptCache, decode_range_reply, range_args};
use crate::store::{Command, Reply, ScoreStore, StoreError};
use crate::time::{TimeRange, Timestamp};

/// A record for `TimeKv::bulk_set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Identifier segments, composed into the storage key.
    pub id: Vec<String>,
    /// Opaque payload.
    pub payload: Bytes,
    /// Score of the record's index entry.
    pub last_modified: Timestamp,
}

impl Record {
    /// Create a record.
    pub fn new<I, T>(id: I, payload: impl Into<Bytes>, last_modified: Timestamp) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            id: id.into_iter().map(Into::into).collect(),
            payload: payload.into(),
            last_modified,
        }
    }
}

/// How a range page is read from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStrategy {
    /// Separate count, select and fetch commands (`fetch_page`).
    #[default]
    Scan,
    /// One server-side evaluation (`fetch_page_consistent`).
    Consistent,
}

/// Key/value store with a last-modified ordering index.
///
/// # Thread Safety
///
/// All operations take `&self` and may run concurrently. The only in-process
/// mutable state is the cached range script handle.
#[derive(Debug)]
pub struct TimeKv<S> {
    store: S,
    keys: KeyComposer,
    script: ScriptCache,
}

impl<S: ScoreStore> TimeKv<S> {
    /// Create a store accessor for the namespace of `keys`.
    #[must_use]
    pub fn new(store: S, keys: KeyComposer) -> Self {
        Self {
            store,
            keys,
            script: ScriptCache::new(),
        }
    }

    /// Create a store accessor using the configured namespace and delimiter.
    #[must_use]
    pub fn from_config(store: S, config: &TkvConfig) -> Self {
        Self::new(store, KeyComposer::new(&config.namespace, config.delimiter))
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The key composer for this namespace.
    #[must_use]
    pub const fn keys(&self) -> &KeyComposer {
        &self.keys
    }

    /// Get a record's payload. `Ok(None)` if the record does not exist.
    pub async fn get(&self, id: &[&str]) -> Result<Option<Payload>, TkvError> {
        let value = self
            .store
            .get(&self.keys.key(id))
            .await
            .map_err(TkvError::store("failed to get entity"))?;

        Ok(value.map(Payload::from))
    }

    /// Write a record, overwriting any previous value.
    ///
    /// Returns `true` if the record already existed. This is read from the
    /// index update's reply (update rather than insert), so no separate
    /// existence check is made.
    pub async fn set(
        &self,
        id: &[&str],
        payload: impl Into<Bytes> + Send,
        last_modified: Timestamp,
    ) -> Result<bool, TkvError> {
        const OP: &str = "failed to set entity";

        let key = self.keys.key(id);
        let commands = vec![
            Command::Set {
                key: key.clone(),
                value: payload.into(),
            },
            Command::ZAdd {
                index: self.keys.index_key(),
                score: last_modified.as_nanos(),
                member: key,
            },
        ];

        let replies = self
            .store
            .exec_atomic(commands)
            .await
            .map_err(TkvError::store(OP))?;

        let added = replies
            .get(1)
            .and_then(Reply::as_integer)
            .ok_or(TkvError::UnexpectedReply { op: OP })?;

        Ok(added == 0)
    }

    /// Write many records in one atomic pipeline.
    ///
    /// An empty batch issues no command. On failure nothing is guaranteed
    /// about which records were applied; that is up to the store.
    pub async fn bulk_set(&self, records: &[Record]) -> Result<(), TkvError> {
        if records.is_empty() {
            return Ok(());
        }

        let index = self.keys.index_key();
        let mut commands = Vec::with_capacity(records.len() * 2);

        for record in records {
            let key = self.keys.key(&record.id);
            commands.push(Command::Set {
                key: key.clone(),
                value: record.payload.clone(),
            });
            commands.push(Command::ZAdd {
                index: index.clone(),
                score: record.last_modified.as_nanos(),
                member: key,
            });
        }

        self.store
            .exec_atomic(commands)
            .await
            .map_err(TkvError::store("failed to bulk insert records"))?;

        tracing::debug!("bulk inserted {} records", records.len());
        Ok(())
    }

    /// Whether a record exists.
    pub async fn exists(&self, id: &[&str]) -> Result<bool, TkvError> {
        self.store
            .exists(&self.keys.key(id))
            .await
            .map_err(TkvError::store("failed to check if entity exists"))
    }

    /// Delete a record and its index entry. Deleting a missing record is not
    /// an error.
    pub async fn delete(&self, id: &[&str]) -> Result<(), TkvError> {
        let key = self.keys.key(id);
        let commands = vec![
            Command::Del { key: key.clone() },
            Command::ZRem {
                index: self.keys.index_key(),
                member: key,
            },
        ];

        self.store
            .exec_atomic(commands)
            .await
            .map_err(TkvError::store("failed to delete entity"))?;

        Ok(())
    }

    /// Read one page of records modified within `range`, ascending by
    /// timestamp.
    ///
    /// Count, selection and value fetch are separate commands and are not
    /// atomic with each other or with concurrent writers.
    pub async fn fetch_page(
        &self,
        range: TimeRange,
        offset: usize,
        limit: usize,
    ) -> Result<Page, TkvError> {
        let index = self.keys.index_key();

        let total = self
            .store
            .zcount(&index, &range)
            .await
            .map_err(TkvError::store("failed to count"))?;

        let keys = self
            .store
            .zrange_by_score(&index, &range, offset, limit)
            .await
            .map_err(TkvError::store("failed to execute zrangebyscore"))?;

        if keys.is_empty() {
            return Ok(Page::empty(total));
        }

        let values = self
            .store
            .mget(&keys)
            .await
            .map_err(TkvError::store("failed to execute mget"))?;

        tracing::debug!(
            "fetched {} of {} entries in {range} at offset {offset}",
            values.len(),
            total
        );
        Ok(Page::new(total, values))
    }

    /// Read one page of records modified within `range` as a consistent
    /// snapshot.
    ///
    /// Registers the range script on first use. If the store has forgotten
    /// the script, it is registered again and evaluated once more.
    pub async fn fetch_page_consistent(
        &self,
        range: TimeRange,
        offset: usize,
        limit: usize,
    ) -> Result<Page, TkvError> {
        const LOAD_OP: &str = "failed to load range script";
        const EVAL_OP: &str = "failed to execute range script";

        let keys = [self.keys.index_key()];
        let args = range_args(&range, offset, limit);

        let handle = self
            .script
            .get_or_load(&self.store, RANGE_SCRIPT)
            .await
            .map_err(TkvError::store(LOAD_OP))?;

        let reply = match self.store.eval_script(&handle, &keys, &args).await {
            Err(StoreError::NoScript(_)) => {
                tracing::warn!("range script {handle} unknown to store, registering again");
                self.script
                    .invalidate(&handle)
                    .map_err(TkvError::store(LOAD_OP))?;
                let handle = self
                    .script
                    .get_or_load(&self.store, RANGE_SCRIPT)
                    .await
                    .map_err(TkvError::store(LOAD_OP))?;
                self.store.eval_script(&handle, &keys, &args).await
            }
            other => other,
        }
        .map_err(TkvError::store(EVAL_OP))?;

        decode_range_reply(reply)
    }

    /// Read one page with the given strategy.
    pub async fn fetch(
        &self,
        strategy: FetchStrategy,
        range: TimeRange,
        offset: usize,
        limit: usize,
    ) -> Result<Page, TkvError> {
        match strategy {
            FetchStrategy::Scan => self.fetch_page(range, offset, limit).await,
            FetchStrategy::Consistent => self.fetch_page_consistent(range, offset, limit).await,
        }
    }

    /// A page source reading with `strategy`, for use with `paginate`.
    #[must_use]
    pub const fn pages(&self, strategy: FetchStrategy) -> KvPages<'_, S> {
        KvPages {
            kv: self,
            strategy,
        }
    }

    /// Stream every record in `range`, reading `limit` per page.
    pub async fn paginate(
        &self,
        strategy: FetchStrategy,
        range: TimeRange,
        offset: usize,
        limit: usize,
    ) -> Result<Paginated<'_>, TkvError> {
        paginate(self.pages(strategy), range, offset, limit).await
    }
}

/// Page source over a `TimeKv`.
#[derive(Debug)]
pub struct KvPages<'a, S> {
    kv: &'a TimeKv<S>,
    strategy: FetchStrategy,
}

impl<S: ScoreStore> PageFetch for KvPages<'_, S> {
    fn fetch_page(
        &mut self,
        range: TimeRange,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Page, TkvError>> + Send {
        self.kv.fetch(self.strategy, range, offset, limit)
    }
}
