//! Transfer request and its validation.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Delimiter used unless a request opts out of delimiter-bounded listing.
pub const DEFAULT_DELIMITER: &str = "/";

/// Operation applied to each listed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransferOp {
    /// Copy every object to the target bucket.
    Copy,
    /// Delete every object from the source bucket.
    Delete,
}

/// Why a request was refused before any remote call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// Copy requested without a (non-empty) target bucket.
    #[error("copy requires a target bucket")]
    MissingTargetBucket,
    /// Delete requested with an empty prefix, which would wipe the bucket.
    #[error("delete requires a non-empty prefix")]
    EmptyDeletePrefix,
    /// Same-bucket copy whose destination keys fall back under the listed
    /// prefix, so the walk would keep listing its own copies.
    #[error("copy target prefix lies inside the source prefix")]
    OverlappingTarget,
}

/// A bulk copy or delete over `source_bucket/prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Operation applied to every listed object.
    pub op: TransferOp,
    /// Bucket to list.
    pub source_bucket: String,
    /// Key prefix selecting the objects to transfer.
    pub prefix: String,
    /// Destination bucket; required for [`TransferOp::Copy`].
    pub target_bucket: Option<String>,
    /// Replaces the leading `prefix` of each key on copy.
    pub target_prefix: Option<String>,
    /// Listing delimiter; `None` walks every nested key.
    pub delimiter: Option<String>,
    /// Entries per listing page; the backend default applies when unset.
    pub page_size: Option<i32>,
}

impl TransferRequest {
    fn new(op: TransferOp, source_bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            op,
            source_bucket: source_bucket.into(),
            prefix: prefix.into(),
            target_bucket: None,
            target_prefix: None,
            delimiter: Some(DEFAULT_DELIMITER.to_string()),
            page_size: None,
        }
    }

    /// Copy `source_bucket/prefix` into `target_bucket`, keeping keys unless a
    /// target prefix is set.
    pub fn copy(
        source_bucket: impl Into<String>,
        target_bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self::new(TransferOp::Copy, source_bucket, prefix).with_target_bucket(target_bucket)
    }

    /// Delete every object under `bucket/prefix`.
    pub fn delete(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::new(TransferOp::Delete, bucket, prefix)
    }

    /// Set the destination bucket.
    pub fn with_target_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.target_bucket = Some(bucket.into());
        self
    }

    /// Rewrite the leading prefix of each copied key. Empty means unset.
    pub fn with_target_prefix(mut self, target_prefix: impl Into<String>) -> Self {
        self.target_prefix = Some(target_prefix.into()).filter(|p| !p.is_empty());
        self
    }

    /// Override the listing delimiter. Empty means recursive.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into()).filter(|d| !d.is_empty());
        self
    }

    /// List every nested key instead of stopping at the delimiter.
    pub fn recursive(mut self) -> Self {
        self.delimiter = None;
        self
    }

    /// Bound the number of entries per listing page.
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Checks the request before any remote call.
    pub fn validate(&self) -> Result<(), Rejection> {
        match self.op {
            TransferOp::Copy if self.target_bucket.as_deref().is_none_or(str::is_empty) => {
                Err(Rejection::MissingTargetBucket)
            }
            TransferOp::Copy if self.copies_into_listing() => Err(Rejection::OverlappingTarget),
            TransferOp::Delete if self.prefix.is_empty() => Err(Rejection::EmptyDeletePrefix),
            _ => Ok(()),
        }
    }

    /// Whether copied keys would be listed again by this request.
    ///
    /// Copying a key onto itself (no target prefix, or one equal to `prefix`)
    /// creates nothing new.
    fn copies_into_listing(&self) -> bool {
        let same_bucket = self.target_bucket.as_deref() == Some(self.source_bucket.as_str());
        match &self.target_prefix {
            Some(target_prefix) => {
                same_bucket
                    && *target_prefix != self.prefix
                    && target_prefix.starts_with(self.prefix.as_str())
            }
            None => false,
        }
    }

    /// Destination key of `key` on copy.
    ///
    /// With a target prefix, the leading `prefix` is replaced by it; keys that
    /// do not start with `prefix` get the target prefix prepended. Without one
    /// the key is kept.
    pub fn destination_key(&self, key: &str) -> String {
        match &self.target_prefix {
            Some(target_prefix) => {
                let rest = key.strip_prefix(self.prefix.as_str()).unwrap_or(key);
                format!("{target_prefix}{rest}")
            }
            None => key.to_string(),
        }
    }
}
