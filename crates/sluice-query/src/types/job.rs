use derive_more::{AsRef, Deref, Display, From, Into};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::QueryState;

/// Identifier the query service assigns to a submitted statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRef, Deref, Display, From, Into)]
#[serde(transparent)]
pub struct QueryExecutionId(String);

impl QueryExecutionId {
    /// Wrap a service-assigned id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QueryExecutionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A statement submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// SQL text, sent as-is.
    pub query: String,
    /// Database the statement runs against.
    pub database: String,
    /// Where the service writes raw results.
    pub output_location: String,
    /// Workgroup, when not the service default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workgroup: Option<String>,
}

/// A submitted statement and the last state observed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryJob {
    pub id: QueryExecutionId,
    pub query: String,
    pub state: QueryState,
    pub submitted_at: Timestamp,
}

impl QueryJob {
    /// A freshly submitted job. The service has not reported on it yet.
    pub fn submitted(id: QueryExecutionId, query: impl Into<String>) -> Self {
        Self {
            id,
            query: query.into(),
            state: QueryState::Queued,
            submitted_at: Timestamp::now(),
        }
    }

    /// Whether the job will not change state again.
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}
