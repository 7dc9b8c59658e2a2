//! Page combinator.
//!
//! `paginate` turns repeated page fetches into one continuous stream of
//! payloads. It works with any `PageFetch`: both `TimeKv` strategies, or a
//! plain closure returning a page future.
//!
//! # Behavior
//!
//! - The first page is fetched eagerly. Its failure is returned from
//!   `paginate` itself, not from the stream.
//! - If the first page's `total` fits within `limit`, the stream yields that
//!   page only.
//! - Otherwise each exhausted page advances the offset by `limit` and fetches
//!   the next page, until the offset reaches the latest `total`.
//! - A failed later fetch yields exactly one `Err` item, then the stream
//!   ends. Items yielded before it stay valid.
//! - Fetches are driven by polling. A consumer that stops pulling (or drops
//!   the stream) causes no further fetches.

use std::future::Future;

use futures::StreamExt;
use futures::stream::{self, BoxStream};

use crate::error::TkvError;
use crate::page::{Page, PageIter, Payload};
use crate::time::TimeRange;

/// Stream produced by `paginate`.
pub type Paginated<'a> = BoxStream<'a, Result<Payload, TkvError>>;

/// A source of pages over a time range.
pub trait PageFetch: Send {
    /// Fetch up to `limit` payloads in `range`, skipping `offset` matches.
    fn fetch_page(
        &mut self,
        range: TimeRange,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Page, TkvError>> + Send;
}

impl<F, Fut> PageFetch for F
where
    F: FnMut(TimeRange, usize, usize) -> Fut + Send,
    Fut: Future<Output = Result<Page, TkvError>> + Send,
{
    fn fetch_page(
        &mut self,
        range: TimeRange,
        offset: usize,
        limit: usize,
    ) -> impl Future<Output = Result<Page, TkvError>> + Send {
        self(range, offset, limit)
    }
}

/// Stream all payloads in `range`, fetching `limit` at a time from `pages`.
///
/// A `limit` of zero yields the first page only.
pub async fn paginate<'a, P>(
    mut pages: P,
    range: TimeRange,
    offset: usize,
    limit: usize,
) -> Result<Paginated<'a>, TkvError>
where
    P: PageFetch + 'a,
{
    let first = pages
        .fetch_page(range, offset, limit)
        .await
        .map_err(|e| TkvError::page("fetching first page failed", e))?;

    let total = first.total();
    let cursor = Cursor {
        pages,
        range,
        offset,
        limit,
        total,
        current: first.into_iter(),
        done: total <= limit || limit == 0,
    };

    Ok(stream::unfold(cursor, Cursor::advance).boxed())
}

/// Pagination state carried between polls.
struct Cursor<P> {
    pages: P,
    range: TimeRange,
    offset: usize,
    limit: usize,
    /// Latest total reported by the page source.
    total: usize,
    current: PageIter,
    /// No further pages will be fetched.
    done: bool,
}

impl<P: PageFetch> Cursor<P> {
    async fn advance(mut self) -> Option<(Result<Payload, TkvError>, Self)> {
        loop {
            if let Some(payload) = self.current.next() {
                return Some((Ok(payload), self));
            }
            if self.done {
                return None;
            }

            self.offset = self.offset.saturating_add(self.limit);
            if self.offset >= self.total {
                return None;
            }

            match self
                .pages
                .fetch_page(self.range, self.offset, self.limit)
                .await
            {
                Ok(page) => {
                    tracing::debug!(
                        "fetched page at offset {} ({} values, total {})",
                        self.offset,
                        page.len(),
                        page.total()
                    );
                    self.total = page.total();
                    self.current = page.into_iter();
                }
                Err(e) => {
                    self.done = true;
                    let error = TkvError::page("fetching next page failed", e);
                    return Some((Err(error), self));
                }
            }
        }
    }
}
