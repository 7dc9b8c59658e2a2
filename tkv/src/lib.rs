#![cfg_attr(
    test,
    allow(clippy::disallowed_methods, clippy::expect_used, clippy::unwrap_used)
)]

// Life of a write:
// 1. Id segments are composed into a namespaced key
// 2. The value and its index entry (scored by last-modified time) are
//    written in one atomic pipeline
//
// Life of a range read:
//    Scan: count, select keys by score, fetch values (three commands)
//    Consistent: the same three steps inside one server-side script
//
// Pages are stitched into one stream by `paginate`.
//
// System components:
//  - Score-ordered store (trait, with an in-memory implementation)
//  - Key composition
//  - Range script and its cached handle
//  - Page combinator

pub mod config;
mod e2e_tests;
pub mod error;
pub mod key;
pub mod kv;
pub mod page;
pub mod paginate;
pub mod range;
#[cfg(test)]
mod simulation;
pub mod store;
#[cfg(test)]
mod testing;
pub mod time;

pub use config::{ConfigError, TkvConfig};
pub use error::TkvError;
pub use key::{Delimiter, KeyComposer, compose_key};
pub use kv::{FetchStrategy, KvPages, Record, TimeKv};
pub use page::{Page, PageIter, Payload};
pub use paginate::{PageFetch, Paginated, paginate};
pub use store::{MemoryStore, ScoreStore, StoreError};
pub use time::{TimeRange, Timestamp};
