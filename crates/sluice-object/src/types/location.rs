//! Bucket plus key (or key prefix) addressing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Error;

const S3_SCHEME: &str = "s3://";

/// A bucket and a key or key prefix inside it.
///
/// Renders as `s3://bucket/key` and parses from the same form; the scheme is
/// optional when parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    /// Bucket name.
    pub bucket: String,
    /// Key or key prefix, without a leading slash.
    pub key: String,
}

impl ObjectLocation {
    /// Create a location from a bucket and a key.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into().trim_start_matches('/').to_string(),
        }
    }

    /// Location of the bucket root.
    pub fn bucket(bucket: impl Into<String>) -> Self {
        Self::new(bucket, "")
    }

    /// Append `name` to this location, inserting a `/` when the key does not
    /// already end with one.
    pub fn join(&self, name: &str) -> Self {
        let name = name.trim_start_matches('/');
        let key = if self.key.is_empty() || self.key.ends_with('/') {
            format!("{}{name}", self.key)
        } else {
            format!("{}/{name}", self.key)
        };
        Self {
            bucket: self.bucket.clone(),
            key,
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{S3_SCHEME}{}/{}", self.bucket, self.key)
    }
}

impl FromStr for ObjectLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix(S3_SCHEME).unwrap_or(s);
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(Error::InvalidLocation(s.to_string()));
        }
        Ok(Self::new(bucket, key))
    }
}
