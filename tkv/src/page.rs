//! Payloads and result pages.
//!
//! Payload bytes are reference-counted slices of the store's response buffer.
//! `Payload::as_bytes` borrows that buffer without copying; `Payload::to_vec`
//! makes an owned copy. Holding a `Payload` keeps its response buffer alive,
//! so copy out anything that must be retained long term.

use std::fmt;
use std::ops::Deref;

use bytes::Bytes;

/// An opaque record payload.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Payload(Bytes);

impl Payload {
    /// Borrowed view of the payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Owned copy of the payload bytes.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// The underlying shared buffer.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for Payload {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }
}

impl From<&'static str> for Payload {
    fn from(text: &'static str) -> Self {
        Self(Bytes::from_static(text.as_bytes()))
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bytes prints as an escaped byte string
        write!(f, "Payload({:?})", self.0)
    }
}

/// One page of a range query.
///
/// `total` is the number of index entries in the queried range at the time
/// it was counted, not the number of values on this page. Values are in
/// index order. A `None` value is a member whose primary record was missing
/// when values were fetched; iteration skips it.
#[derive(Debug, Clone, Default)]
pub struct Page {
    total: usize,
    values: Vec<Option<Bytes>>,
}

impl Page {
    /// Create a page from raw store values.
    #[must_use]
    pub const fn new(total: usize, values: Vec<Option<Bytes>>) -> Self {
        Self { total, values }
    }

    /// A page with no values.
    #[must_use]
    pub const fn empty(total: usize) -> Self {
        Self {
            total,
            values: Vec::new(),
        }
    }

    /// Create a page from payloads.
    #[must_use]
    pub fn from_payloads(total: usize, payloads: impl IntoIterator<Item = Payload>) -> Self {
        Self {
            total,
            values: payloads.into_iter().map(|p| Some(p.into_bytes())).collect(),
        }
    }

    /// Matches in the queried range.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Number of values on this page, including missing ones.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the page has no values.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Collect the page's payloads, skipping missing values.
    #[must_use]
    pub fn into_payloads(self) -> Vec<Payload> {
        self.into_iter().collect()
    }
}

impl IntoIterator for Page {
    type Item = Payload;
    type IntoIter = PageIter;

    fn into_iter(self) -> PageIter {
        PageIter {
            values: self.values.into_iter(),
        }
    }
}

/// Iterator over a page's payloads.
#[derive(Debug, Default)]
pub struct PageIter {
    values: std::vec::IntoIter<Option<Bytes>>,
}

impl Iterator for PageIter {
    type Item = Payload;

    fn next(&mut self) -> Option<Payload> {
        loop {
            let Some(bytes) = self.values.next()? else {
                tracing::debug!("skipping missing value in page");
                continue;
            };
            return Some(Payload(bytes));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.values.size_hint().1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_views() {
        let payload = Payload::from(b"hello".to_vec());
        assert_eq!(payload.as_bytes(), b"hello");
        assert_eq!(&*payload, b"hello");
        assert_eq!(payload.to_vec(), b"hello".to_vec());
        assert_eq!(format!("{payload:?}"), "Payload(b\"hello\")");
    }

    #[test]
    fn test_payload_shares_buffer() {
        let buffer = Bytes::from_static(b"abcdef");
        let payload = Payload::from(buffer.slice(2..4));
        assert_eq!(payload.as_bytes(), b"cd");
        assert_eq!(payload.into_bytes().as_ptr(), buffer[2..].as_ptr());
    }

    #[test]
    fn test_page_skips_missing_values() {
        let page = Page::new(
            3,
            vec![
                Some(Bytes::from_static(b"a")),
                None,
                Some(Bytes::from_static(b"c")),
            ],
        );
        assert_eq!(page.total(), 3);
        assert_eq!(page.len(), 3);

        let payloads = page.into_payloads();
        assert_eq!(payloads, vec![Payload::from("a"), Payload::from("c")]);
    }

    #[test]
    fn test_empty_page() {
        let page = Page::empty(7);
        assert_eq!(page.total(), 7);
        assert!(page.is_empty());
        assert_eq!(page.into_iter().next(), None);
    }
}
