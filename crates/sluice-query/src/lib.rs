#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for query service calls.
///
/// Use this target for logging submissions, status batches, and result pages.
pub const TRACING_TARGET_SERVICE: &str = "sluice_query::service";

/// Tracing target for the completion poller.
///
/// Use this target for logging poll iterations and timeouts.
pub const TRACING_TARGET_POLL: &str = "sluice_query::poll";

/// Tracing target for the query lifecycle manager.
///
/// Use this target for logging table creation, drops, result shaping, and
/// cleanup.
pub const TRACING_TARGET_MANAGER: &str = "sluice_query::manager";

/// Tracing target for log staging.
pub const TRACING_TARGET_STAGING: &str = "sluice_query::staging";

mod config;
mod error;
mod manager;
#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;
mod poll;
pub mod report;
pub mod service;
mod staging;
pub mod types;

#[doc(hidden)]
pub mod prelude;

pub use config::{AthenaConfig, QueryConfig};
pub use error::{BoxedError, Error, Result};
pub use manager::QueryManager;
pub use poll::Poller;
pub use report::{VersionReport, construct_report, parse_result_csv};
pub use service::{AthenaService, QueryService};
pub use staging::{LogStaging, StagedData};
