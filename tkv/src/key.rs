//! Storage key composition.
//!
//! Keys are built as `namespace + delimiter + segments.join(delimiter)`.
//! Segments must not contain the delimiter themselves; two different
//! segment lists can otherwise compose to the same key. This is not checked.

use std::fmt;

/// Suffix of the ordering index key within a namespace.
const LAST_MODIFIED_INDEX_SUFFIX: &str = "lmIdx";

/// Separator placed between the namespace and each identifier segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Delimiter {
    /// ASCII unit separator (`0x1f`). Non-printable, the safest choice.
    #[default]
    Unit,
    /// ASCII pipe (`|`). Printable and easier to inspect, but collides with
    /// segments that contain a pipe.
    Pipe,
}

impl Delimiter {
    /// The separator string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unit => "\x1f",
            Self::Pipe => "|",
        }
    }

    /// Parse a preset name (`unit` or `pipe`, case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "unit" => Some(Self::Unit),
            "pipe" => Some(Self::Pipe),
            _ => None,
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("unit"),
            Self::Pipe => f.write_str("pipe"),
        }
    }
}

/// Join a namespace and identifier segments into one key.
///
/// Deterministic: the same inputs always yield the same key.
pub fn compose_key<I, T>(delimiter: Delimiter, namespace: &str, segments: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let delim = delimiter.as_str();
    let mut key = String::with_capacity(namespace.len() + delim.len());
    key.push_str(namespace);
    key.push_str(delim);

    for (i, segment) in segments.into_iter().enumerate() {
        if i > 0 {
            key.push_str(delim);
        }
        key.push_str(segment.as_ref());
    }

    key
}

/// Composes keys for one namespace.
///
/// The namespace keeps different entity types from colliding in the same
/// store. Every record key and the namespace's ordering index key come from
/// here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyComposer {
    namespace: String,
    delimiter: Delimiter,
}

impl KeyComposer {
    /// Create a composer for `namespace`.
    #[must_use]
    pub fn new(namespace: impl Into<String>, delimiter: Delimiter) -> Self {
        Self {
            namespace: namespace.into(),
            delimiter,
        }
    }

    /// The namespace prefix.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The delimiter in use.
    #[must_use]
    pub const fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    /// Compose the key of a record identified by `segments`.
    pub fn key<I, T>(&self, segments: I) -> String
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        compose_key(self.delimiter, &self.namespace, segments)
    }

    /// Key of the ordering index (sorted set) for this namespace.
    #[must_use]
    pub fn index_key(&self) -> String {
        self.key([LAST_MODIFIED_INDEX_SUFFIX])
    }
}
