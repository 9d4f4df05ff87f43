//! Error types for the query lifecycle.

use sluice_object::transfer::Rejection;

use crate::types::QueryExecutionId;

/// Boxed error type for dynamic error handling.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for query operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while submitting, polling, shaping, or cleaning up queries.
///
/// A query that simply does not finish in time is not an error; the manager
/// reports it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
#[must_use = "errors should be handled appropriately"]
pub enum Error {
    /// A table drop was requested but this session owns no table.
    #[error("no created table to drop")]
    NoTable,

    /// A table creation was requested while this session already owns one.
    #[error("table '{0}' already created; drop it first")]
    TableExists(String),

    /// The query service rejected or failed a call.
    #[error("[{service}] {operation} failed: {message}")]
    Service {
        /// Service identifier (e.g. "athena", "mock").
        service: &'static str,
        /// Remote operation that failed.
        operation: &'static str,
        /// Human-readable failure description.
        message: String,
        /// Underlying SDK error, if any.
        #[source]
        source: Option<BoxedError>,
    },

    /// A status batch did not mention a requested execution.
    #[error("query execution '{0}' is unknown to the service")]
    UnknownExecution(QueryExecutionId),

    /// The service accepted a query but returned no execution id.
    #[error("query submission returned no execution id")]
    MissingExecutionId,

    /// A result row could not be shaped into a report.
    #[error("malformed result row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    /// A staging transfer was refused before any remote call.
    #[error("staging transfer rejected: {0}")]
    Rejected(#[from] Rejection),

    /// Bucket store failure.
    #[error(transparent)]
    Object(#[from] sluice_object::Error),

    /// Result CSV could not be read.
    #[error("result csv: {0}")]
    Csv(#[from] csv::Error),

    /// Report could not be serialized.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create a service error for a failed remote `operation`.
    pub fn service(
        service: &'static str,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::Service {
            service,
            operation,
            message: message.into(),
            source: None,
        }
    }

    /// Create a malformed row error. `row` counts data rows from 1.
    pub fn malformed_row(row: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRow {
            row,
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Attach a source error. Only service errors carry a source.
    pub fn with_source(mut self, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        if let Self::Service { source, .. } = &mut self {
            *source = Some(Box::new(err));
        }
        self
    }
}
