//! Errors returned by `TimeKv` and the page combinator.

use std::fmt;

use crate::store::StoreError;

/// Errors from key/value operations.
///
/// Store failures are wrapped with the name of the step that failed and are
/// never retried internally. A missing record is not an error.
#[derive(Debug)]
pub enum TkvError {
    /// The store reported a failure during `op`.
    Store {
        op: &'static str,
        source: StoreError,
    },
    /// The range procedure's reply did not have the `{ total, values }` shape.
    UnexpectedScriptResult,
    /// A pipeline reply did not have the expected shape.
    UnexpectedReply { op: &'static str },
    /// A page fetch driven by the page combinator failed.
    Page {
        context: &'static str,
        source: Box<Self>,
    },
}

impl TkvError {
    /// Wrap a store error with the failing step's name.
    pub fn store(op: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { op, source }
    }

    /// Wrap a page fetch failure.
    #[must_use]
    pub fn page(context: &'static str, source: Self) -> Self {
        Self::Page {
            context,
            source: Box::new(source),
        }
    }

    /// The innermost store error, if any.
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Store { source, .. } => Some(source),
            Self::Page { source, .. } => source.store_error(),
            Self::UnexpectedScriptResult | Self::UnexpectedReply { .. } => None,
        }
    }

    /// Whether this error (or the error it wraps) is a reply shape mismatch
    /// from the range procedure.
    #[must_use]
    pub fn is_unexpected_script_result(&self) -> bool {
        match self {
            Self::UnexpectedScriptResult => true,
            Self::Page { source, .. } => source.is_unexpected_script_result(),
            Self::Store { .. } | Self::UnexpectedReply { .. } => false,
        }
    }
}

impl fmt::Display for TkvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store { op, source } => write!(f, "{op}: {source}"),
            Self::UnexpectedScriptResult => write!(f, "unexpected result from range script"),
            Self::UnexpectedReply { op } => write!(f, "{op}: unexpected reply from store"),
            Self::Page { context, source } => write!(f, "{context}: {source}"),
        }
    }
}

impl std::error::Error for TkvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store { source, .. } => Some(source),
            Self::Page { source, .. } => Some(source.as_ref()),
            Self::UnexpectedScriptResult | Self::UnexpectedReply { .. } => None,
        }
    }
}
