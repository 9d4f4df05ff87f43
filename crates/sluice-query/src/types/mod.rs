//! Query jobs, execution states, and result rows.

mod job;
mod result_set;
mod state;

pub use job::{QueryExecutionId, QueryJob, QueryRequest};
pub use result_set::ResultSet;
pub use state::{QueryState, SessionState};
