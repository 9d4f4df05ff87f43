//! Query service seam.
//!
//! - [`QueryService`] - submit, batch status, and result retrieval
//! - [`AthenaService`] - Amazon Athena implementation

mod athena;

pub use athena::AthenaService;

use crate::Result;
use crate::types::{QueryExecutionId, QueryRequest, QueryState, ResultSet};

/// A managed SQL query service.
///
/// Every call is a single remote round trip (or a paged series for results);
/// nothing is retried.
#[async_trait::async_trait]
pub trait QueryService: Send + Sync + 'static {
    /// Short identifier used in errors and logs.
    fn id(&self) -> &'static str;

    /// Submit a statement and return its execution id without waiting.
    async fn start_query(&self, request: &QueryRequest) -> Result<QueryExecutionId>;

    /// Current state of every id, in the order the ids were given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownExecution`](crate::Error::UnknownExecution) if
    /// the service does not report on one of the ids.
    async fn batch_get_status(&self, ids: &[QueryExecutionId]) -> Result<Vec<QueryState>>;

    /// All result rows of a finished query.
    async fn get_query_results(&self, id: &QueryExecutionId) -> Result<ResultSet>;
}
