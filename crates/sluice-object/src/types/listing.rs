//! Paginated listing request and response.

use serde::{Deserialize, Serialize};

/// One call's worth of a paginated, prefix-filtered bucket listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    /// Bucket to list.
    pub bucket: String,
    /// Key prefix filter. Matched as a plain string prefix.
    pub prefix: String,
    /// Keys containing this delimiter after the prefix are rolled up into
    /// common prefixes instead of being returned. `None` lists recursively.
    pub delimiter: Option<String>,
    /// Token returned by the previous page, absent for the first page.
    pub continuation_token: Option<String>,
    /// Upper bound on entries per page; the backend default applies when unset.
    pub max_keys: Option<i32>,
}

impl ListRequest {
    /// Create a first-page request for `bucket`/`prefix`.
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            delimiter: None,
            continuation_token: None,
            max_keys: None,
        }
    }

    /// Set the key delimiter.
    pub fn with_delimiter(mut self, delimiter: Option<String>) -> Self {
        self.delimiter = delimiter.filter(|d| !d.is_empty());
        self
    }

    /// Continue from a token returned by a previous page.
    pub fn with_continuation_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }

    /// Bound the number of entries per page.
    pub fn with_max_keys(mut self, max_keys: i32) -> Self {
        self.max_keys = Some(max_keys);
        self
    }
}

/// A bounded batch of object keys plus an opaque continuation token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPage {
    /// Object keys, in listing order.
    pub keys: Vec<String>,
    /// Prefixes rolled up by the delimiter.
    pub common_prefixes: Vec<String>,
    /// Present while more pages remain.
    pub next_token: Option<String>,
}

impl ListingPage {
    /// Whether another page must be requested.
    pub fn has_more(&self) -> bool {
        self.next_token.is_some()
    }
}
