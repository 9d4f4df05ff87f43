//! Error type for bucket store operations.

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for all bucket store operations in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by bucket store backends and the transfer walker.
#[derive(Debug, thiserror::Error)]
#[must_use = "errors should be handled appropriately"]
pub enum Error {
    /// The backend rejected or failed a remote call.
    #[error("[{backend}] {operation} failed: {message}")]
    Backend {
        /// Backend identifier (e.g. "s3", "memory").
        backend: &'static str,
        /// Remote operation that failed (e.g. "list_objects_v2").
        operation: &'static str,
        /// Human-readable failure description.
        message: String,
        /// Whether the caller may retry this operation.
        retryable: bool,
        /// Underlying SDK error, if any.
        #[source]
        source: Option<BoxedError>,
    },

    /// The requested object does not exist.
    #[error("object '{key}' not found in bucket '{bucket}'")]
    NotFound { bucket: String, key: String },

    /// The bucket does not exist.
    #[error("bucket '{bucket}' not found")]
    BucketNotFound { bucket: String },

    /// A listing returned a continuation token that was already consumed.
    #[error("listing of '{bucket}/{prefix}' repeated continuation token '{token}'")]
    PaginationLoop {
        bucket: String,
        prefix: String,
        token: String,
    },

    /// A continuation token could not be decoded by the backend.
    #[error("invalid continuation token: {0}")]
    InvalidToken(String),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Malformed `s3://` location.
    #[error("invalid object location '{0}'")]
    InvalidLocation(String),
}

impl Error {
    /// Create a backend error for a failed remote `operation`.
    pub fn backend(
        backend: &'static str,
        operation: &'static str,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::Backend {
            backend,
            operation,
            message: message.into(),
            retryable,
            source: None,
        }
    }

    /// Create a not found error.
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Create a bucket not found error.
    pub fn bucket_not_found(bucket: impl Into<String>) -> Self {
        Self::BucketNotFound {
            bucket: bucket.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Attach a source error. Only backend errors carry a source.
    pub fn with_source(mut self, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        if let Self::Backend { source, .. } = &mut self {
            *source = Some(Box::new(err));
        }
        self
    }

    /// Whether the caller could retry this operation.
    ///
    /// Nothing in this crate retries on its own; the flag is informational.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend { retryable, .. } => *retryable,
            _ => false,
        }
    }
}
