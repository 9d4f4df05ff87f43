//! Convenient re-exports for common use.

#[cfg(feature = "test-utils")]
pub use crate::mock::MockQueryService;
pub use crate::report::{VersionReport, construct_report, parse_result_csv};
pub use crate::service::{AthenaService, QueryService};
pub use crate::types::{
    QueryExecutionId, QueryJob, QueryRequest, QueryState, ResultSet, SessionState,
};
pub use crate::{
    AthenaConfig, Error, LogStaging, Poller, QueryConfig, QueryManager, Result, StagedData,
};
