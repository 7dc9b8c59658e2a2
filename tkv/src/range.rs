//! Server-evaluated range procedure and its registration cache.
//!
//! The procedure counts the index entries in a score range, selects one page
//! of members and fetches their values, all inside a single script
//! evaluation. Count, selection and values therefore come from one snapshot.
//!
//! Evaluation holds store resources proportional to the page size. Very large
//! pages (several thousand entries) are impractical; paginate instead.

use std::sync::RwLock;

use tokio::sync::Mutex;

use crate::error::TkvError;
use crate::page::Page;
use crate::store::{Reply, ScoreStore, ScriptHandle, StoreError};
use crate::time::TimeRange;

/// Body of the range procedure.
///
/// `KEYS[1]` is the index key; `ARGV` is `min, max, offset, count`.
/// Returns `{ total, values }`.
pub const RANGE_SCRIPT: &str = r#"
local index = KEYS[1]
local min = ARGV[1]
local max = ARGV[2]
local offset = tonumber(ARGV[3])
local count = tonumber(ARGV[4])

local total = redis.call("ZCOUNT", index, min, max)
if total == 0 then
  return { 0, {} }
end

local members = redis.call("ZRANGE", index, min, max, "BYSCORE", "LIMIT", offset, count)
if #members == 0 then
  return { total, {} }
end

return { total, redis.call("MGET", unpack(members)) }
"#;

/// Arguments of the range procedure, in `ARGV` order.
#[must_use]
pub fn range_args(range: &TimeRange, offset: usize, limit: usize) -> Vec<String> {
    vec![
        range.min_arg(),
        range.max_arg(),
        offset.to_string(),
        limit.to_string(),
    ]
}

/// Decode the procedure's `{ total, values }` reply into a page.
///
/// # Errors
///
/// Returns `TkvError::UnexpectedScriptResult` if the reply is not a
/// two-element array of an integer and an array of bulk/nil values.
pub fn decode_range_reply(reply: Reply) -> Result<Page, TkvError> {
    let Reply::Array(parts) = reply else {
        return Err(TkvError::UnexpectedScriptResult);
    };

    let Ok([Reply::Integer(total), Reply::Array(values)]) = <[Reply; 2]>::try_from(parts) else {
        return Err(TkvError::UnexpectedScriptResult);
    };

    let total = usize::try_from(total).map_err(|_| TkvError::UnexpectedScriptResult)?;
    let values = values
        .into_iter()
        .map(|value| match value {
            Reply::Bulk(bytes) => Ok(Some(bytes)),
            Reply::Nil => Ok(None),
            _ => Err(TkvError::UnexpectedScriptResult),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(total, values))
}

/// Lazily registered handle of the range procedure.
///
/// The first caller registers the body; every caller, including concurrent
/// ones, converges on the same handle. A failed registration leaves the cache
/// empty so a later call registers again.
#[derive(Debug, Default)]
pub struct ScriptCache {
    /// The registered handle, if any. Read on every call.
    handle: RwLock<Option<ScriptHandle>>,
    /// Serializes registration so only one caller talks to the store.
    loading: Mutex<()>,
}

impl ScriptCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached handle, without registering.
    pub fn cached(&self) -> Result<Option<ScriptHandle>, StoreError> {
        let handle = self.handle.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(handle.clone())
    }

    /// Return the cached handle or register `body` with `store`.
    pub async fn get_or_load<S: ScoreStore>(
        &self,
        store: &S,
        body: &str,
    ) -> Result<ScriptHandle, StoreError> {
        // Fast path: already registered
        if let Some(handle) = self.cached()? {
            return Ok(handle);
        }

        // Slow path: one registration at a time
        let _loading = self.loading.lock().await;

        // Another caller may have registered while we waited
        if let Some(handle) = self.cached()? {
            return Ok(handle);
        }

        let handle = store.load_script(body).await?;
        tracing::debug!("registered range script as {handle}");

        *self.handle.write().map_err(|_| StoreError::LockPoisoned)? = Some(handle.clone());
        Ok(handle)
    }

    /// Forget `stale` if it is still the cached handle.
    pub fn invalidate(&self, stale: &ScriptHandle) -> Result<(), StoreError> {
        {
            let mut handle = self.handle.write().map_err(|_| StoreError::LockPoisoned)?;
            if handle.as_ref() == Some(stale) {
                *handle = None;
            }
        }
        Ok(())
    }
}
